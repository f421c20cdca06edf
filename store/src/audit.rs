//! Webhook audit trail storage trait.

use crate::StoreError;
use kyc_types::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of one received webhook.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAuditRecord {
    pub id: Uuid,
    pub event_type: String,
    /// Empty when the payload carried no provider session id.
    pub provider_session_id: String,
    pub raw_payload: Vec<u8>,
    /// Whether the event type maps to a status transition.
    pub processed: bool,
    pub received_at: Timestamp,
}

/// Append-only audit storage. Records are written once and never mutated.
pub trait WebhookAuditStore: Send + Sync {
    fn record_webhook_audit(&self, record: &WebhookAuditRecord) -> Result<(), StoreError>;

    /// Most recent records first, at most `limit`.
    fn list_recent_audits(&self, limit: usize) -> Result<Vec<WebhookAuditRecord>, StoreError>;

    /// Records for one provider session, most recent first.
    fn list_audits_by_provider_session_id(
        &self,
        provider_session_id: &str,
    ) -> Result<Vec<WebhookAuditRecord>, StoreError>;
}
