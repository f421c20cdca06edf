//! LMDB storage backend for the reconciliation service.
//!
//! Implements the storage traits from `kyc-store` using the `heed` LMDB bindings.
//! Each logical store maps to one or more LMDB databases within a single environment.

pub mod audit;
pub mod environment;
pub mod error;
mod keys;
mod meta;
pub mod session;

pub use audit::LmdbAuditStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use session::LmdbSessionStore;
