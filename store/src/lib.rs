//! Abstract storage traits for the reconciliation service.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod audit;
pub mod error;
pub mod session;

pub use audit::{WebhookAuditRecord, WebhookAuditStore};
pub use error::StoreError;
pub use session::SessionStore;
