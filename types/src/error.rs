//! Top-level error type shared across crates.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("unknown session status: {0}")]
    UnknownStatus(String),
}
