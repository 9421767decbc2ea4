use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlchemistError {
    #[error("{0}")]
    MissingInput(String),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Model response error: {0}")]
    ModelResponse(String),
    /// Provider and network failures; the message is shown to the user as-is.
    #[error("{0}")]
    Transport(String),
    #[error("A style transfer is already in progress")]
    Busy,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Server error: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, AlchemistError>;
