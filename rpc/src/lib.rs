//! HTTP server for the KYC reconciliation service.
//!
//! Provides endpoints for:
//! - Provider webhook intake (signature check, parse, reconcile)
//! - Starting a verification session
//! - Session queries by id, user and status
//! - The webhook audit trail
//! - Health and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{router, AppState, RpcServer, SignaturePolicy};
