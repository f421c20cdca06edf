//! Time source abstraction.
//!
//! Stores and the engine stamp `created_at`/`updated_at`/`completed_at` through
//! a [`Clock`] so tests can substitute a deterministic one.

use crate::Timestamp;

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
