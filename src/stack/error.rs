use std::path::PathBuf;

/// Errors that may occur while loading the compose file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read compose file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse compose file `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("cannot derive a stack name from `{0}`")]
    NoStackName(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
