//! Webhook-driven verification session reconciliation.
//!
//! An inbound provider event flows through four steps:
//! 1. **Classification**: the raw event type maps to a closed [`Outcome`] set.
//! 2. **Attribution**: a user id is pulled out of the loosely shaped payload by
//!    an ordered list of extraction rules ([`resolve_user_id`]).
//! 3. **Targeting**: the user's most recent session is the one reconciled.
//! 4. **Transition**: the provider session id is attached, the user is
//!    notified (terminal outcomes only) and the status is written.
//!
//! Every failure is confined to the event being processed. Nothing here
//! retries; the provider's redelivery is the recovery path, and the
//! transition is safe to re-apply.

pub mod classifier;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod resolver;
pub mod signature;
pub mod start;

pub use classifier::{classify, Outcome};
pub use engine::{AttributionMiss, ReconcileEngine, ReconcileReport, Stage};
pub use error::ReconcileError;
pub use metrics::ReconcileMetrics;
pub use resolver::{resolve_user_id, ExtractionRule, FieldView, USER_ID_RULES};
pub use signature::HmacVerifier;
pub use start::{StartVerification, VerificationStarted, VerificationStarter, VerificationUrlBuilder};
