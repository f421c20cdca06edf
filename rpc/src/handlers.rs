//! HTTP request handlers.
//!
//! Store traits are synchronous, so every store or engine call runs on the
//! blocking pool.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use kyc_reconcile::{StartVerification, VerificationStarted};
use kyc_store::{SessionStore, WebhookAuditRecord, WebhookAuditStore};
use kyc_types::{Clock, SessionStatus, Timestamp, VerificationSession, WebhookEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;
use crate::server::AppState;

type AppStateRef = State<Arc<AppState>>;

/// Default and maximum number of audit records returned per request.
pub const DEFAULT_AUDIT_LIMIT: usize = 50;
pub const MAX_AUDIT_LIMIT: usize = 500;

async fn blocking<T, F>(f: F) -> Result<T, RpcError>
where
    F: FnOnce() -> Result<T, RpcError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RpcError::Server(format!("blocking task failed: {e}")))?
}

// ── Service ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: u64,
    pub service: &'static str,
}

pub async fn health(State(state): AppStateRef) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: state.clock.now().as_secs(),
        service: "kyc-reconcile",
    })
}

pub async fn metrics(State(state): AppStateRef) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
}

// ── Webhooks ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct WebhookAccepted {
    pub status: &'static str,
}

/// Provider webhook intake.
///
/// Only a bad signature (when enforced) or a body that is not a JSON object
/// is refused. Everything past parsing answers 200 so the provider does not
/// redeliver on attribution misses or local store failures.
pub async fn provider_webhook(
    State(state): AppStateRef,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAccepted>, RpcError> {
    state.signature.check(&headers, &body)?;

    let event = WebhookEvent::parse(&body, state.clock.now())
        .map_err(|e| RpcError::MalformedPayload(e.to_string()))?;
    tracing::debug!(event_type = %event.event_type, "webhook received");

    let engine = state.engine.clone();
    match tokio::task::spawn_blocking(move || engine.ingest(&event)).await {
        Ok(report) => tracing::debug!(?report, "webhook reconciled"),
        Err(e) => tracing::error!(error = %e, "webhook reconciliation task failed"),
    }

    Ok(Json(WebhookAccepted {
        status: "processed",
    }))
}

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_AUDIT_LIMIT)
            .clamp(1, MAX_AUDIT_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub event_type: String,
    pub provider_session_id: String,
    pub processed: bool,
    pub received_at: Timestamp,
    /// The raw body as JSON, or as a string when it does not parse.
    pub payload: Value,
}

impl From<WebhookAuditRecord> for AuditEntry {
    fn from(record: WebhookAuditRecord) -> Self {
        let payload = serde_json::from_slice(&record.raw_payload).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&record.raw_payload).into_owned())
        });
        Self {
            id: record.id.to_string(),
            event_type: record.event_type,
            provider_session_id: record.provider_session_id,
            processed: record.processed,
            received_at: record.received_at,
            payload,
        }
    }
}

pub async fn recent_webhook_events(
    State(state): AppStateRef,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, RpcError> {
    let limit = query.effective_limit();
    let records = blocking(move || Ok(state.audits.list_recent_audits(limit)?)).await?;
    Ok(Json(records.into_iter().map(AuditEntry::from).collect()))
}

pub async fn webhook_events_for_session(
    State(state): AppStateRef,
    Path(provider_session_id): Path<String>,
) -> Result<Json<Vec<AuditEntry>>, RpcError> {
    let records = blocking(move || {
        Ok(state
            .audits
            .list_audits_by_provider_session_id(&provider_session_id)?)
    })
    .await?;
    Ok(Json(records.into_iter().map(AuditEntry::from).collect()))
}

// ── Verification sessions ────────────────────────────────────────────────

pub async fn start_verification(
    State(state): AppStateRef,
    body: Bytes,
) -> Result<Json<VerificationStarted>, RpcError> {
    let request: StartVerification = serde_json::from_slice(&body)
        .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
    let started = blocking(move || Ok(state.starter.start(&request)?)).await?;
    Ok(Json(started))
}

pub async fn verification_status(
    State(state): AppStateRef,
    Path(session_id): Path<String>,
) -> Result<Json<VerificationSession>, RpcError> {
    let session = blocking(move || {
        state
            .sessions
            .get_session_by_session_id(&session_id)?
            .ok_or_else(|| RpcError::NotFound(format!("session {session_id}")))
    })
    .await?;
    Ok(Json(session))
}

pub async fn user_sessions(
    State(state): AppStateRef,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<VerificationSession>>, RpcError> {
    let sessions = blocking(move || Ok(state.sessions.list_sessions_by_user_id(&user_id)?)).await?;
    Ok(Json(sessions))
}

pub async fn latest_user_session(
    State(state): AppStateRef,
    Path(user_id): Path<String>,
) -> Result<Json<VerificationSession>, RpcError> {
    let session = blocking(move || {
        state
            .sessions
            .latest_session_for_user(&user_id)?
            .ok_or_else(|| RpcError::NotFound(format!("no sessions for user {user_id}")))
    })
    .await?;
    Ok(Json(session))
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

pub async fn sessions_by_status(
    State(state): AppStateRef,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<VerificationSession>>, RpcError> {
    let raw = query
        .status
        .ok_or_else(|| RpcError::InvalidRequest("status query parameter is required".into()))?;
    let status: SessionStatus = raw
        .parse()
        .map_err(|e: kyc_types::TypesError| RpcError::InvalidRequest(e.to_string()))?;
    let sessions = blocking(move || Ok(state.sessions.list_sessions_by_status(status)?)).await?;
    Ok(Json(sessions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_limit_defaults_and_clamps() {
        assert_eq!(AuditQuery { limit: None }.effective_limit(), DEFAULT_AUDIT_LIMIT);
        assert_eq!(AuditQuery { limit: Some(0) }.effective_limit(), 1);
        assert_eq!(AuditQuery { limit: Some(10_000) }.effective_limit(), MAX_AUDIT_LIMIT);
    }

    #[test]
    fn audit_entry_keeps_unparseable_payload_as_text() {
        let record = WebhookAuditRecord {
            id: Default::default(),
            event_type: "verification.completed".into(),
            provider_session_id: String::new(),
            raw_payload: b"not json".to_vec(),
            processed: true,
            received_at: Timestamp::new(5),
        };
        let entry = AuditEntry::from(record);
        assert_eq!(entry.payload, Value::String("not json".into()));
    }
}
