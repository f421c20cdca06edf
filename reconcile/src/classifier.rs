//! Event type classification.

use kyc_notify::NotificationKind;
use kyc_types::SessionStatus;

/// What a provider event means for the session it targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Approved,
    Failed,
    Review,
    /// Not in the known vocabulary: audited, never applied.
    Unknown,
}

impl Outcome {
    /// Status the session moves to, `None` for [`Outcome::Unknown`].
    pub fn target_status(&self) -> Option<SessionStatus> {
        match self {
            Self::Approved => Some(SessionStatus::Approved),
            Self::Failed => Some(SessionStatus::Failed),
            Self::Review => Some(SessionStatus::Review),
            Self::Unknown => None,
        }
    }

    /// Notification sent before the status write. Review is silent.
    pub fn notification(&self) -> Option<NotificationKind> {
        match self {
            Self::Approved => Some(NotificationKind::Approved),
            Self::Failed => Some(NotificationKind::Failed),
            Self::Review | Self::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Failed => "failed",
            Self::Review => "review",
            Self::Unknown => "unknown",
        }
    }
}

/// Map a raw event type onto an [`Outcome`]. Matching is exact.
pub fn classify(event_type: &str) -> Outcome {
    match event_type {
        "verification.completed" | "verification.approved" => Outcome::Approved,
        "verification.failed" | "verification.rejected" => Outcome::Failed,
        "verification.review" => Outcome::Review,
        _ => Outcome::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vocabulary() {
        assert_eq!(classify("verification.completed"), Outcome::Approved);
        assert_eq!(classify("verification.approved"), Outcome::Approved);
        assert_eq!(classify("verification.failed"), Outcome::Failed);
        assert_eq!(classify("verification.rejected"), Outcome::Failed);
        assert_eq!(classify("verification.review"), Outcome::Review);
    }

    #[test]
    fn anything_else_is_unknown() {
        for raw in [
            "",
            "verification.started",
            "Verification.Approved",
            "verification.approved ",
            "session.created",
        ] {
            assert_eq!(classify(raw), Outcome::Unknown, "{raw:?}");
        }
    }

    #[test]
    fn review_targets_status_without_notification() {
        assert_eq!(Outcome::Review.target_status(), Some(SessionStatus::Review));
        assert_eq!(Outcome::Review.notification(), None);
        assert_eq!(Outcome::Unknown.target_status(), None);
        assert_eq!(Outcome::Failed.notification(), Some(NotificationKind::Failed));
    }
}
