use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to socket `{path}`: {source}")]
    SocketConnect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP handshake with the engine failed: {0}")]
    Handshake(#[source] hyper::Error),
    #[error("failed to build engine request: {0}")]
    InvalidRequest(String),
    #[error("engine request failed: {0}")]
    Request(#[source] hyper::Error),
    #[error("failed to read engine response body: {0}")]
    Body(#[source] hyper::Error),
    #[error("engine returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("failed to decode engine response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("log stream ended inside a frame, {0} bytes left over")]
    TruncatedLogFrame(usize),
    #[error("failed to encode list filters: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    InvalidContainerID(#[from] crate::container::Error),
}

impl Error {
    /// Whether the engine reported the container as unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
