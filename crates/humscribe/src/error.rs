use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error(transparent)]
    Extract(#[from] melody_extract::Error),

    #[error(transparent)]
    Config(#[from] humconf::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
