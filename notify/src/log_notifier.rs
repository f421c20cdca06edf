//! Notifier that writes outcome messages to the log instead of a mail server.

use tracing::info;

use crate::{NotificationKind, Notifier, NotifyError, Recipient};

/// Renders each message and emits it as a structured log event.
#[derive(Clone, Debug)]
pub struct LogNotifier {
    sender_name: String,
}

impl LogNotifier {
    pub fn new(sender_name: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
        }
    }

    fn deliver(&self, kind: NotificationKind, recipient: &Recipient) -> Result<(), NotifyError> {
        if !recipient.email.contains('@') {
            return Err(NotifyError::InvalidRecipient(recipient.email.clone()));
        }
        let body = render_body(kind, &recipient.name);
        info!(
            from = %self.sender_name,
            to = %recipient.email,
            subject = kind.subject(),
            body = %body,
            "outcome notification"
        );
        Ok(())
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new("KYC")
    }
}

impl Notifier for LogNotifier {
    fn notify_approved(&self, recipient: &Recipient) -> Result<(), NotifyError> {
        self.deliver(NotificationKind::Approved, recipient)
    }

    fn notify_failed(&self, recipient: &Recipient) -> Result<(), NotifyError> {
        self.deliver(NotificationKind::Failed, recipient)
    }
}

pub(crate) fn render_body(kind: NotificationKind, name: &str) -> String {
    match kind {
        NotificationKind::Approved => {
            format!("Hello {name}, your identity verification has been approved.")
        }
        NotificationKind::Failed => format!(
            "Hello {name}, we could not approve your identity verification. \
             You can start a new attempt at any time."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(email: &str) -> Recipient {
        Recipient {
            name: "Ann".into(),
            email: email.into(),
        }
    }

    #[test]
    fn rejects_address_without_at() {
        let notifier = LogNotifier::default();
        assert!(matches!(
            notifier.notify_approved(&recipient("nobody")),
            Err(NotifyError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn delivers_both_kinds() {
        let notifier = LogNotifier::new("Tests");
        assert!(notifier.notify_approved(&recipient("a@x.com")).is_ok());
        assert!(notifier.notify_failed(&recipient("a@x.com")).is_ok());
    }

    #[test]
    fn body_mentions_recipient() {
        assert!(render_body(NotificationKind::Failed, "Ann").contains("Ann"));
    }
}
