use std::path::PathBuf;

/// Errors that may occur while loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid log level `{0}`")]
    InvalidLogLevel(String),
}

pub type Result<T> = std::result::Result<T, Error>;
