use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] kyc_store::StoreError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid webhook secret: {0}")]
    InvalidSecret(String),

    #[error("invalid verification base URL: {0}")]
    InvalidBaseUrl(String),
}
