//! Nullable notifier: records notifications instead of sending them.

use kyc_notify::{
    Notification, NotificationKind, NotificationSink, Notifier, NotifyError, Recipient,
};
use std::sync::Mutex;

/// Records every notification it is handed.
///
/// Implements both [`Notifier`] (the transport) and [`NotificationSink`]
/// (the engine-facing hand-off), so tests can observe dispatch synchronously.
#[derive(Default)]
pub struct NullNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: Mutex<bool>,
}

impl NullNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `Notifier` sends fail. Sink submissions are still recorded.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, kind: NotificationKind) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.kind == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().unwrap().is_empty()
    }

    fn record(&self, kind: NotificationKind, recipient: &Recipient) -> Result<(), NotifyError> {
        if *self.fail.lock().unwrap() {
            return Err(NotifyError::Send("null notifier set to fail".into()));
        }
        self.sent.lock().unwrap().push(Notification {
            kind,
            recipient: recipient.clone(),
        });
        Ok(())
    }
}

impl Notifier for NullNotifier {
    fn notify_approved(&self, recipient: &Recipient) -> Result<(), NotifyError> {
        self.record(NotificationKind::Approved, recipient)
    }

    fn notify_failed(&self, recipient: &Recipient) -> Result<(), NotifyError> {
        self.record(NotificationKind::Failed, recipient)
    }
}

impl NotificationSink for NullNotifier {
    fn submit(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}
