//! Fundamental types for KYC verification session reconciliation.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! timestamps and clocks, the verification session model with its status
//! lifecycle, and the inbound provider webhook event.

pub mod clock;
pub mod error;
pub mod event;
pub mod session;
pub mod time;

pub use clock::{Clock, SystemClock};
pub use error::TypesError;
pub use event::{WebhookData, WebhookEvent};
pub use session::{SessionStatus, VerificationSession};
pub use time::Timestamp;
