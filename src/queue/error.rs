use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed message id: {0}")]
    MalformedMessageId(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
