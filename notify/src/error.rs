use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}
