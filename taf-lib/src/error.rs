use thiserror::Error;

/// Errors that can occur in a TAF session
#[derive(Error, Debug)]
pub enum TafError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("PID file error: {0}")]
    PidFile(String),
}

pub type Result<T> = std::result::Result<T, TafError>;
