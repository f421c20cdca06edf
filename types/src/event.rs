//! Inbound provider webhook events.
//!
//! The provider does not commit to a payload shape across event types, so the
//! event keeps its `data` object as a generic JSON map and exposes type-checked
//! accessors instead of a fixed struct. The original bytes are retained for the
//! audit trail.

use serde_json::{Map, Value};

use crate::{Timestamp, TypesError};

/// Root-level keys copied into `data` when a payload carries no `data` object.
const ROOT_FALLBACK_KEYS: [&str; 3] = ["session_id", "status", "user_id"];

/// The loosely structured `data` section of a webhook.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WebhookData {
    fields: Map<String, Value>,
}

impl WebhookData {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The provider's own session identifier (`session_id`).
    pub fn provider_session_id(&self) -> Option<&str> {
        self.get_str(None, "session_id").filter(|s| !s.is_empty())
    }

    /// Provider-reported status string, if any.
    pub fn status(&self) -> Option<&str> {
        self.get_str(None, "status")
    }

    /// Type-checked string lookup.
    ///
    /// With `section = None` the key is read from `data` directly; otherwise
    /// from the nested object `data[section]`. A missing section, a missing key
    /// or a non-string value all read as `None`.
    pub fn get_str(&self, section: Option<&str>, key: &str) -> Option<&str> {
        let scope = match section {
            None => &self.fields,
            Some(name) => self.fields.get(name)?.as_object()?,
        };
        scope.get(key)?.as_str()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// One inbound notification from the provider.
#[derive(Clone, Debug)]
pub struct WebhookEvent {
    /// Provider-defined event vocabulary, e.g. `verification.completed`.
    pub event_type: String,
    pub data: WebhookData,
    /// Provider event time, or ingestion time when absent/unparseable.
    pub timestamp: Timestamp,
    pub raw_payload: Vec<u8>,
}

impl WebhookEvent {
    /// Parse a raw webhook body.
    ///
    /// Only bodies that are not a JSON object are rejected. `event_type` falls
    /// back to a root `type` key; a payload without a `data` object has its
    /// root-level `session_id`, `status` and `user_id` lifted into `data`.
    pub fn parse(raw: &[u8], received_at: Timestamp) -> Result<Self, TypesError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| TypesError::MalformedPayload(e.to_string()))?;
        let Value::Object(root) = value else {
            return Err(TypesError::MalformedPayload(
                "payload is not a JSON object".to_string(),
            ));
        };

        let event_type = ["event_type", "type"]
            .iter()
            .find_map(|key| root.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        let data = match root.get("data") {
            Some(Value::Object(map)) => map.clone(),
            _ => ROOT_FALLBACK_KEYS
                .iter()
                .filter_map(|key| root.get(*key).map(|v| (key.to_string(), v.clone())))
                .collect(),
        };

        let timestamp = match root.get("timestamp") {
            Some(Value::String(s)) => Timestamp::parse_rfc3339(s),
            Some(Value::Number(n)) => unix_seconds(n).map(Timestamp::new),
            _ => None,
        }
        .unwrap_or(received_at);

        Ok(Self {
            event_type,
            data: WebhookData::from_map(data),
            timestamp,
            raw_payload: raw.to_vec(),
        })
    }
}

/// Whole seconds from a JSON number; fractional values are truncated.
fn unix_seconds(n: &serde_json::Number) -> Option<u64> {
    if let Some(secs) = n.as_u64() {
        return Some(secs);
    }
    let secs = n.as_f64()?;
    (secs.is_finite() && secs >= 0.0 && secs < u64::MAX as f64).then(|| secs.trunc() as u64)
}
