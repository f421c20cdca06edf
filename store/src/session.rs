//! Verification session storage trait.

use crate::StoreError;
use kyc_types::{SessionStatus, VerificationSession};

/// Persistence for verification sessions.
///
/// Sessions are addressed by their stable `session_id`. Every mutation is a
/// single-row update; backends stamp `updated_at` (and `completed_at`, via
/// [`VerificationSession::apply_status`]) from their own clock.
pub trait SessionStore: Send + Sync {
    /// Persist a new session. Fails with [`StoreError::Duplicate`] when its
    /// `session_id` (or provider session id) is already taken.
    fn create_session(&self, session: &VerificationSession)
        -> Result<VerificationSession, StoreError>;

    /// Look up a session by its internal handle. `Ok(None)` means not found.
    fn get_session_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<VerificationSession>, StoreError>;

    /// Look up the session a provider session id has been attached to.
    fn get_session_by_provider_session_id(
        &self,
        provider_session_id: &str,
    ) -> Result<Option<VerificationSession>, StoreError>;

    /// All sessions of a user, most recent first: `created_at` descending,
    /// ties broken by insertion order (later insert first).
    fn list_sessions_by_user_id(&self, user_id: &str)
        -> Result<Vec<VerificationSession>, StoreError>;

    /// All sessions currently in `status`, most recent first.
    fn list_sessions_by_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<VerificationSession>, StoreError>;

    /// Set a session's status. [`StoreError::NotFound`] if it does not exist.
    fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<VerificationSession, StoreError>;

    /// Attach the provider's session id. Re-attaching the same value is a
    /// no-op; a different value overwrites. Fails with
    /// [`StoreError::Duplicate`] when the id belongs to another session.
    fn attach_provider_session_id(
        &self,
        session_id: &str,
        provider_session_id: &str,
    ) -> Result<VerificationSession, StoreError>;

    /// The most recent session of a user, if any.
    fn latest_session_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<VerificationSession>, StoreError> {
        Ok(self.list_sessions_by_user_id(user_id)?.into_iter().next())
    }
}
