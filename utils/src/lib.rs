//! Shared utilities for the KYC reconciliation service.

pub mod logging;

pub use logging::{init_logging, LogFormat, LogFormatError};
