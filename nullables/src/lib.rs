//! Nullable infrastructure for deterministic testing.
//!
//! All external dependencies (clock, storage, notification transport) are
//! abstracted behind traits. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (advance time, inject failures)
//! - Record what was asked of them
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests. The in-memory
//! store also backs the daemon's `memory` storage mode.

pub mod clock;
pub mod notifier;
pub mod store;

pub use clock::NullClock;
pub use notifier::NullNotifier;
pub use store::{FailOn, NullSessionStore};
