//! Verification session model and its status lifecycle.
//!
//! A session starts `pending` and moves to `approved`, `failed` or `review` as
//! provider events arrive. Transitions are not strictly terminal: a later event
//! may move a session out of `review`, and nothing prevents `approved` and
//! `failed` from being re-entered. What *is* fixed is `completed_at`: it is
//! stamped the first time the session becomes terminal and never touched again.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Timestamp, TypesError};

/// Status of a verification session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created locally; no provider outcome yet.
    Pending,
    /// Provider approved the subject.
    Approved,
    /// Provider rejected the subject or the check failed.
    Failed,
    /// Provider flagged the attempt for manual review.
    Review,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 4] = [
        SessionStatus::Pending,
        SessionStatus::Approved,
        SessionStatus::Failed,
        SessionStatus::Review,
    ];

    /// `approved` and `failed` are terminal; `pending` and `review` are not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Failed => "failed",
            Self::Review => "review",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TypesError::UnknownStatus(s.to_string()))
    }
}

/// One user's attempt to complete identity verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationSession {
    /// Process-generated identifier, immutable.
    pub id: Uuid,
    /// Subject user; a user may own several sessions.
    pub user_id: String,
    /// Internally generated external handle, unique and never reused.
    pub session_id: String,
    /// The provider's own session identifier, once echoed back by a webhook.
    pub provider_session_id: Option<String>,
    pub status: SessionStatus,
    /// Contact snapshot taken at creation, used for notifications.
    pub user_email: String,
    pub user_first_name: String,
    pub user_last_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Set on the first transition into a terminal status.
    pub completed_at: Option<Timestamp>,
}

impl VerificationSession {
    /// Build a fresh `pending` session with newly generated identifiers.
    pub fn new_pending(
        user_id: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            session_id: Uuid::new_v4().to_string(),
            provider_session_id: None,
            status: SessionStatus::Pending,
            user_email: email.into(),
            user_first_name: first_name.into(),
            user_last_name: last_name.into(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Move the session to `status`.
    ///
    /// Any status may follow any other. `completed_at` is set only when it is
    /// still empty and `status` is terminal.
    pub fn apply_status(&mut self, status: SessionStatus, now: Timestamp) {
        self.status = status;
        self.updated_at = now;
        if status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }

    /// Record the provider's session identifier. Returns `false` when the same
    /// value was already attached, in which case nothing changes.
    pub fn attach_provider_session_id(&mut self, provider_id: &str, now: Timestamp) -> bool {
        if self.provider_session_id.as_deref() == Some(provider_id) {
            return false;
        }
        self.provider_session_id = Some(provider_id.to_string());
        self.updated_at = now;
        true
    }

    /// Display name used in notifications.
    pub fn display_name(&self) -> String {
        match (self.user_first_name.is_empty(), self.user_last_name.is_empty()) {
            (false, false) => format!("{} {}", self.user_first_name, self.user_last_name),
            (false, true) => self.user_first_name.clone(),
            (true, false) => self.user_last_name.clone(),
            (true, true) => self.user_email.clone(),
        }
    }
}
