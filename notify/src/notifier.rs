//! Notifier contract.

use serde::{Deserialize, Serialize};

use crate::NotifyError;

/// Who receives an outcome notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

/// Which outcome the user is told about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Approved,
    Failed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Failed => "failed",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::Approved => "Identity verification approved",
            Self::Failed => "Identity verification was not approved",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: Recipient,
}

/// Delivers outcome messages. Implementations may block (SMTP, HTTP).
pub trait Notifier: Send + Sync {
    fn notify_approved(&self, recipient: &Recipient) -> Result<(), NotifyError>;

    fn notify_failed(&self, recipient: &Recipient) -> Result<(), NotifyError>;

    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification.kind {
            NotificationKind::Approved => self.notify_approved(&notification.recipient),
            NotificationKind::Failed => self.notify_failed(&notification.recipient),
        }
    }
}

/// Fire-and-forget hand-off. `submit` must return promptly and never surface
/// delivery errors to the caller.
pub trait NotificationSink: Send + Sync {
    fn submit(&self, notification: Notification);
}
