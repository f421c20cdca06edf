//! Prometheus metrics for webhook reconciliation.
//!
//! Response codes to the provider are almost always 200, so these counters
//! (and the logs) are the only way to see attribution misses and store
//! failures. [`ReconcileMetrics`] owns a dedicated [`Registry`] that the HTTP
//! `/metrics` endpoint encodes into the text exposition format.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder,
    IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use kyc_notify::DispatchCounters;

pub struct ReconcileMetrics {
    pub registry: Registry,

    /// Webhooks that parsed and reached the engine.
    pub webhooks_received: IntCounter,
    /// Status transitions written, labelled by outcome.
    pub transitions: IntCounterVec,
    pub unknown_events: IntCounter,
    /// Events with no resolvable user or no session for that user.
    pub attribution_misses: IntCounter,
    pub store_errors: IntCounter,
    pub audit_failures: IntCounter,
    /// Notification worker counters.
    pub notifications: DispatchCounters,
}

impl ReconcileMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let webhooks_received = register_int_counter_with_registry!(
            Opts::new("kyc_webhooks_received_total", "Webhooks handed to the engine"),
            registry
        )
        .expect("failed to register webhooks_received counter");

        let transitions = register_int_counter_vec_with_registry!(
            Opts::new("kyc_transitions_total", "Session status transitions applied"),
            &["outcome"],
            registry
        )
        .expect("failed to register transitions counter");

        let unknown_events = register_int_counter_with_registry!(
            Opts::new("kyc_unknown_events_total", "Webhooks with an unrecognised event type"),
            registry
        )
        .expect("failed to register unknown_events counter");

        let attribution_misses = register_int_counter_with_registry!(
            Opts::new(
                "kyc_attribution_misses_total",
                "Webhooks that could not be mapped to a user session"
            ),
            registry
        )
        .expect("failed to register attribution_misses counter");

        let store_errors = register_int_counter_with_registry!(
            Opts::new("kyc_store_errors_total", "Reconciliations aborted by a store error"),
            registry
        )
        .expect("failed to register store_errors counter");

        let audit_failures = register_int_counter_with_registry!(
            Opts::new("kyc_audit_failures_total", "Webhook audit records that failed to persist"),
            registry
        )
        .expect("failed to register audit_failures counter");

        let notifications = DispatchCounters::unregistered();
        for counter in [
            &notifications.sent,
            &notifications.failed,
            &notifications.dropped,
        ] {
            registry
                .register(Box::new(counter.clone()))
                .expect("failed to register notification counter");
        }

        Self {
            registry,
            webhooks_received,
            transitions,
            unknown_events,
            attribution_misses,
            store_errors,
            audit_failures,
            notifications,
        }
    }

    /// Encode every metric in the Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_counters() {
        let metrics = ReconcileMetrics::new();
        metrics.webhooks_received.inc();
        metrics.transitions.with_label_values(&["approved"]).inc();
        metrics.notifications.sent.inc();

        let text = metrics.encode();
        assert!(text.contains("kyc_webhooks_received_total 1"));
        assert!(text.contains("kyc_transitions_total{outcome=\"approved\"} 1"));
        assert!(text.contains("kyc_notifications_sent_total 1"));
    }
}
