//! Session creation.
//!
//! A session row must exist before any webhook for its user can be
//! reconciled. Starting a verification creates that row in `pending` and hands
//! back the provider URL the user is sent to.

use std::sync::Arc;

use kyc_store::SessionStore;
use kyc_types::{Clock, VerificationSession};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ReconcileError;

/// Builds provider-facing verification links from a fixed base URL.
#[derive(Clone, Debug)]
pub struct VerificationUrlBuilder {
    base: Url,
}

impl VerificationUrlBuilder {
    pub fn new(base: &str) -> Result<Self, ReconcileError> {
        let base = Url::parse(base).map_err(|e| ReconcileError::InvalidBaseUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ReconcileError::InvalidBaseUrl(base.to_string()));
        }
        Ok(Self { base })
    }

    /// Base URL plus percent-encoded `user_id`, `email`, `first_name` and
    /// `last_name` query parameters. Existing query parameters are kept.
    pub fn build(&self, user_id: &str, email: &str, first_name: &str, last_name: &str) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("user_id", user_id)
            .append_pair("email", email)
            .append_pair("first_name", first_name)
            .append_pair("last_name", last_name);
        url.into()
    }
}

/// Body of `POST /verification/start`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct StartVerification {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationStarted {
    pub verification_url: String,
    pub user_id: String,
    /// Internal handle of the new session.
    pub session_id: String,
}

pub struct VerificationStarter {
    sessions: Arc<dyn SessionStore>,
    urls: VerificationUrlBuilder,
    clock: Arc<dyn Clock>,
}

impl VerificationStarter {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        urls: VerificationUrlBuilder,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            urls,
            clock,
        }
    }

    /// Persist a fresh `pending` session and return the link for the user.
    pub fn start(&self, request: &StartVerification) -> Result<VerificationStarted, ReconcileError> {
        if request.user_id.trim().is_empty() {
            return Err(ReconcileError::InvalidRequest("user_id is required".into()));
        }
        if request.email.trim().is_empty() {
            return Err(ReconcileError::InvalidRequest("email is required".into()));
        }

        let session = VerificationSession::new_pending(
            request.user_id.as_str(),
            request.email.as_str(),
            request.first_name.as_str(),
            request.last_name.as_str(),
            self.clock.now(),
        );
        let session = self.sessions.create_session(&session)?;

        tracing::info!(
            user_id = %session.user_id,
            session_id = %session.session_id,
            "verification session started"
        );

        Ok(VerificationStarted {
            verification_url: self.urls.build(
                &request.user_id,
                &request.email,
                &request.first_name,
                &request.last_name,
            ),
            user_id: session.user_id,
            session_id: session.session_id,
        })
    }
}
