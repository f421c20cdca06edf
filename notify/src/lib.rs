//! Outcome notifications.
//!
//! Two layers:
//! - [`Notifier`]: the transport that actually delivers a message (blocking,
//!   one attempt).
//! - [`NotificationSink`]: the non-blocking hand-off the reconciliation engine
//!   talks to. [`NotificationDispatcher`] is the production sink: it queues
//!   notifications for a background worker and never reports delivery
//!   results back to the submitter.
//!
//! Delivery is best-effort and at-least-once across webhook redeliveries:
//! a duplicated provider event may notify the same user twice. A failed send
//! is logged and never retried.

pub mod dispatcher;
pub mod error;
pub mod log_notifier;
pub mod notifier;

pub use dispatcher::{DispatchCounters, NotificationDispatcher};
pub use error::NotifyError;
pub use log_notifier::LogNotifier;
pub use notifier::{Notification, NotificationKind, NotificationSink, Notifier, Recipient};
