//! The reconciliation engine.
//!
//! [`ReconcileEngine::ingest`] is the entry point for one parsed webhook: it
//! writes the audit record, then runs [`ReconcileEngine::reconcile`]. Neither
//! step returns an error. The [`ReconcileReport`] says what happened so the
//! caller can log or test it, but the HTTP response never depends on it.

use std::sync::Arc;

use kyc_notify::{Notification, NotificationSink, Recipient};
use kyc_store::{SessionStore, StoreError, WebhookAuditRecord, WebhookAuditStore};
use kyc_types::{Clock, SessionStatus, VerificationSession, WebhookEvent};
use uuid::Uuid;

use crate::classifier::{classify, Outcome};
use crate::metrics::ReconcileMetrics;
use crate::resolver::resolve_user_id;

/// Why an event could not be mapped onto a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributionMiss {
    /// No extraction rule produced a user id.
    NoUserId,
    /// The user id resolved but the user has no sessions.
    NoSession { user_id: String },
}

/// Result of reconciling one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileReport {
    /// Event type outside the known vocabulary.
    Ignored { event_type: String },
    Unattributed(AttributionMiss),
    /// The target session was moved to `status`.
    Applied {
        session_id: String,
        status: SessionStatus,
        notified: bool,
    },
    /// A store call failed at `stage`. Earlier side effects stand.
    Aborted {
        stage: Stage,
        session_id: Option<String>,
        error: String,
    },
}

/// Store call that aborted a reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    ListSessions,
    AttachProvider,
    UpdateStatus,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListSessions => "list_sessions",
            Self::AttachProvider => "attach_provider_session_id",
            Self::UpdateStatus => "update_status",
        }
    }
}

impl ReconcileReport {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

pub struct ReconcileEngine {
    sessions: Arc<dyn SessionStore>,
    audits: Arc<dyn WebhookAuditStore>,
    notifications: Arc<dyn NotificationSink>,
    metrics: Arc<ReconcileMetrics>,
    clock: Arc<dyn Clock>,
}

impl ReconcileEngine {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        audits: Arc<dyn WebhookAuditStore>,
        notifications: Arc<dyn NotificationSink>,
        metrics: Arc<ReconcileMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            audits,
            notifications,
            metrics,
            clock,
        }
    }

    pub fn metrics(&self) -> &ReconcileMetrics {
        &self.metrics
    }

    /// Audit the raw event, then reconcile it.
    pub fn ingest(&self, event: &WebhookEvent) -> ReconcileReport {
        self.metrics.webhooks_received.inc();
        self.record_audit(event);
        self.reconcile(event)
    }

    /// Best effort: a failed audit write is logged and counted, nothing more.
    fn record_audit(&self, event: &WebhookEvent) {
        let record = WebhookAuditRecord {
            id: Uuid::new_v4(),
            event_type: event.event_type.clone(),
            provider_session_id: event
                .data
                .provider_session_id()
                .unwrap_or_default()
                .to_string(),
            raw_payload: event.raw_payload.clone(),
            processed: classify(&event.event_type) != Outcome::Unknown,
            received_at: self.clock.now(),
        };
        if let Err(e) = self.audits.record_webhook_audit(&record) {
            self.metrics.audit_failures.inc();
            tracing::warn!(
                event_type = %record.event_type,
                error = %e,
                "failed to record webhook audit"
            );
        }
    }

    /// Apply one event to the most recent session of the user it names.
    pub fn reconcile(&self, event: &WebhookEvent) -> ReconcileReport {
        let outcome = classify(&event.event_type);
        let Some(status) = outcome.target_status() else {
            self.metrics.unknown_events.inc();
            tracing::info!(event_type = %event.event_type, "ignoring unknown webhook event type");
            return ReconcileReport::Ignored {
                event_type: event.event_type.clone(),
            };
        };

        let Some(user_id) = resolve_user_id(&event.data) else {
            self.metrics.attribution_misses.inc();
            tracing::warn!(
                event_type = %event.event_type,
                provider_session_id = event.data.provider_session_id().unwrap_or_default(),
                "webhook carries no resolvable user id"
            );
            return ReconcileReport::Unattributed(AttributionMiss::NoUserId);
        };

        let session = match self.sessions.list_sessions_by_user_id(&user_id) {
            Ok(candidates) => match candidates.into_iter().next() {
                Some(session) => session,
                None => {
                    self.metrics.attribution_misses.inc();
                    tracing::warn!(user_id = %user_id, "no verification session for user");
                    return ReconcileReport::Unattributed(AttributionMiss::NoSession { user_id });
                }
            },
            Err(e) => return self.abort(Stage::ListSessions, None, e),
        };

        if let Some(provider_id) = event.data.provider_session_id() {
            if let Err(e) = self
                .sessions
                .attach_provider_session_id(&session.session_id, provider_id)
            {
                return self.abort(Stage::AttachProvider, Some(&session.session_id), e);
            }
        }

        let notified = match outcome.notification() {
            Some(kind) => {
                self.notifications.submit(Notification {
                    kind,
                    recipient: recipient_of(&session),
                });
                true
            }
            None => false,
        };

        if let Err(e) = self.sessions.update_status(&session.session_id, status) {
            return self.abort(Stage::UpdateStatus, Some(&session.session_id), e);
        }

        self.metrics
            .transitions
            .with_label_values(&[outcome.as_str()])
            .inc();
        tracing::info!(
            session_id = %session.session_id,
            user_id = %user_id,
            from = %session.status,
            to = %status,
            notified,
            "verification session reconciled"
        );

        ReconcileReport::Applied {
            session_id: session.session_id,
            status,
            notified,
        }
    }

    fn abort(&self, stage: Stage, session_id: Option<&str>, error: StoreError) -> ReconcileReport {
        self.metrics.store_errors.inc();
        tracing::error!(
            stage = stage.as_str(),
            session_id = session_id.unwrap_or_default(),
            error = %error,
            "reconciliation aborted by store error"
        );
        ReconcileReport::Aborted {
            stage,
            session_id: session_id.map(str::to_string),
            error: error.to_string(),
        }
    }
}

/// Contact snapshot taken at session creation.
fn recipient_of(session: &VerificationSession) -> Recipient {
    Recipient {
        name: session.display_name(),
        email: session.user_email.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyc_notify::NotificationKind;
    use kyc_nullables::{FailOn, NullClock, NullNotifier, NullSessionStore};
    use kyc_types::Timestamp;
    use serde_json::{json, Value};

    struct Harness {
        clock: Arc<NullClock>,
        store: Arc<NullSessionStore>,
        notifier: Arc<NullNotifier>,
        metrics: Arc<ReconcileMetrics>,
        engine: ReconcileEngine,
    }

    fn harness() -> Harness {
        let clock = Arc::new(NullClock::new(1_000));
        let store = Arc::new(NullSessionStore::with_clock(clock.clone()));
        let notifier = Arc::new(NullNotifier::new());
        let metrics = Arc::new(ReconcileMetrics::new());
        let engine = ReconcileEngine::new(
            store.clone(),
            store.clone(),
            notifier.clone(),
            metrics.clone(),
            clock.clone(),
        );
        Harness {
            clock,
            store,
            notifier,
            metrics,
            engine,
        }
    }

    impl Harness {
        fn session(&self, user: &str, email: &str) -> VerificationSession {
            let session =
                VerificationSession::new_pending(user, email, "Ann", "Lee", self.clock.now());
            self.store.create_session(&session).unwrap()
        }

        fn get(&self, session_id: &str) -> VerificationSession {
            self.store
                .get_session_by_session_id(session_id)
                .unwrap()
                .unwrap()
        }
    }

    fn event(value: Value) -> WebhookEvent {
        let raw = serde_json::to_vec(&value).unwrap();
        WebhookEvent::parse(&raw, Timestamp::new(1)).unwrap()
    }

    fn completed(user: &str, provider: &str) -> WebhookEvent {
        event(json!({
            "event_type": "verification.completed",
            "data": {"session_id": provider, "user_id": user}
        }))
    }

    #[test]
    fn approved_event_transitions_and_notifies_once() {
        let h = harness();
        let s = h.session("u1", "a@x.com");
        h.clock.advance(60);

        let report = h.engine.ingest(&completed("u1", "prov-1"));

        assert_eq!(
            report,
            ReconcileReport::Applied {
                session_id: s.session_id.clone(),
                status: SessionStatus::Approved,
                notified: true,
            }
        );
        let stored = h.get(&s.session_id);
        assert_eq!(stored.status, SessionStatus::Approved);
        assert_eq!(stored.provider_session_id.as_deref(), Some("prov-1"));
        assert_eq!(stored.completed_at, Some(Timestamp::new(1_060)));

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::Approved);
        assert_eq!(sent[0].recipient.email, "a@x.com");
        assert_eq!(sent[0].recipient.name, "Ann Lee");
    }

    #[test]
    fn failed_event_sends_failure_notice() {
        let h = harness();
        let s = h.session("u1", "a@x.com");

        h.engine.ingest(&event(json!({
            "event_type": "verification.rejected",
            "data": {"metadata": {"internal_user_id": "u1"}}
        })));

        assert_eq!(h.get(&s.session_id).status, SessionStatus::Failed);
        assert_eq!(h.notifier.count(NotificationKind::Failed), 1);
        assert_eq!(h.notifier.count(NotificationKind::Approved), 0);
    }

    #[test]
    fn review_updates_status_silently() {
        let h = harness();
        let s = h.session("u1", "a@x.com");

        let report = h.engine.ingest(&event(json!({
            "event_type": "verification.review",
            "data": {"user_data": {"id": "u1"}}
        })));

        assert!(matches!(report, ReconcileReport::Applied { notified: false, .. }));
        let stored = h.get(&s.session_id);
        assert_eq!(stored.status, SessionStatus::Review);
        assert_eq!(stored.completed_at, None);
        assert!(h.notifier.is_empty());
    }

    #[test]
    fn unknown_type_is_audited_but_never_applied() {
        let h = harness();
        h.session("u1", "a@x.com");
        let before = h.store.mutation_count();

        let report = h.engine.ingest(&event(json!({
            "event_type": "verification.started",
            "data": {"session_id": "prov-1", "user_id": "u1"}
        })));

        assert_eq!(
            report,
            ReconcileReport::Ignored {
                event_type: "verification.started".into()
            }
        );
        assert_eq!(h.store.mutation_count(), before);
        assert!(h.notifier.is_empty());

        let audits = h.store.audits();
        assert_eq!(audits.len(), 1);
        assert!(!audits[0].processed);
        assert_eq!(audits[0].provider_session_id, "prov-1");
        assert_eq!(h.metrics.unknown_events.get(), 1);
    }

    #[test]
    fn missing_user_id_is_an_attribution_miss() {
        let h = harness();
        let s = h.session("u1", "a@x.com");
        let before = h.store.mutation_count();

        let report = h.engine.ingest(&event(json!({
            "event_type": "verification.rejected",
            "data": {"session_id": "prov-1", "metadata": {"user_id": 42}}
        })));

        assert_eq!(report, ReconcileReport::Unattributed(AttributionMiss::NoUserId));
        assert_eq!(h.store.mutation_count(), before);
        assert_eq!(h.get(&s.session_id).status, SessionStatus::Pending);
        assert!(h.notifier.is_empty());

        let audits = h.store.audits();
        assert_eq!(audits.len(), 1);
        assert!(audits[0].processed);
        assert_eq!(audits[0].event_type, "verification.rejected");
        assert_eq!(h.metrics.attribution_misses.get(), 1);
    }

    #[test]
    fn user_without_sessions_is_an_attribution_miss() {
        let h = harness();
        let report = h.engine.ingest(&completed("ghost", "prov-1"));
        assert_eq!(
            report,
            ReconcileReport::Unattributed(AttributionMiss::NoSession {
                user_id: "ghost".into()
            })
        );
        assert!(h.notifier.is_empty());
    }

    #[test]
    fn targets_most_recent_session() {
        let h = harness();
        let older = h.session("u1", "old@x.com");
        h.clock.advance(10);
        let newer = h.session("u1", "new@x.com");

        h.engine.ingest(&completed("u1", "prov-1"));

        assert_eq!(h.get(&older.session_id).status, SessionStatus::Pending);
        assert_eq!(h.get(&newer.session_id).status, SessionStatus::Approved);
        assert_eq!(h.notifier.sent()[0].recipient.email, "new@x.com");
    }

    #[test]
    fn duplicate_delivery_is_harmless() {
        let h = harness();
        let s = h.session("u1", "a@x.com");
        let event = completed("u1", "prov-1");

        let first = h.engine.ingest(&event);
        h.clock.advance(5);
        let second = h.engine.ingest(&event);

        assert!(first.is_applied());
        assert!(second.is_applied());
        let stored = h.get(&s.session_id);
        assert_eq!(stored.status, SessionStatus::Approved);
        assert_eq!(stored.completed_at, Some(Timestamp::new(1_000)));
        // Re-notifying on redelivery is accepted.
        assert_eq!(h.notifier.count(NotificationKind::Approved), 2);
        assert_eq!(h.store.audits().len(), 2);
    }

    #[test]
    fn terminal_status_can_be_reentered_without_moving_completed_at() {
        let h = harness();
        let s = h.session("u1", "a@x.com");

        h.engine.ingest(&completed("u1", "prov-1"));
        h.clock.advance(30);
        h.engine.ingest(&event(json!({
            "event_type": "verification.failed",
            "data": {"session_id": "prov-1", "user_id": "u1"}
        })));

        let stored = h.get(&s.session_id);
        assert_eq!(stored.status, SessionStatus::Failed);
        assert_eq!(stored.completed_at, Some(Timestamp::new(1_000)));
        assert_eq!(stored.updated_at, Timestamp::new(1_030));
    }

    #[test]
    fn status_write_failure_after_notification() {
        let h = harness();
        let s = h.session("u1", "a@x.com");
        h.store.fail_on(FailOn::UpdateStatus);

        let report = h.engine.ingest(&completed("u1", "prov-1"));

        assert!(matches!(
            report,
            ReconcileReport::Aborted {
                stage: Stage::UpdateStatus,
                ..
            }
        ));
        // The notification has already gone out; the status stays put.
        assert_eq!(h.notifier.count(NotificationKind::Approved), 1);
        let stored = h.get(&s.session_id);
        assert_eq!(stored.status, SessionStatus::Pending);
        assert_eq!(stored.provider_session_id.as_deref(), Some("prov-1"));
        assert_eq!(h.metrics.store_errors.get(), 1);
    }

    #[test]
    fn attach_failure_aborts_before_notifying() {
        let h = harness();
        let s = h.session("u1", "a@x.com");
        h.store.fail_on(FailOn::AttachProvider);

        let report = h.engine.ingest(&completed("u1", "prov-1"));

        assert!(matches!(
            report,
            ReconcileReport::Aborted {
                stage: Stage::AttachProvider,
                ..
            }
        ));
        assert!(h.notifier.is_empty());
        assert_eq!(h.get(&s.session_id).status, SessionStatus::Pending);
    }

    #[test]
    fn provider_id_is_optional() {
        let h = harness();
        let s = h.session("u1", "a@x.com");

        let report = h.engine.ingest(&event(json!({
            "event_type": "verification.approved",
            "data": {"user_id": "u1"}
        })));

        assert!(report.is_applied());
        assert_eq!(h.get(&s.session_id).provider_session_id, None);
    }

    #[test]
    fn audit_failure_does_not_block_reconciliation() {
        let h = harness();
        let s = h.session("u1", "a@x.com");
        h.store.fail_on(FailOn::Audit);

        let report = h.engine.ingest(&completed("u1", "prov-1"));

        assert!(report.is_applied());
        assert_eq!(h.get(&s.session_id).status, SessionStatus::Approved);
        assert_eq!(h.metrics.audit_failures.get(), 1);
    }

    #[test]
    fn list_failure_aborts_without_side_effects() {
        let h = harness();
        h.session("u1", "a@x.com");
        h.store.fail_on(FailOn::List);

        let report = h.engine.ingest(&completed("u1", "prov-1"));

        assert!(matches!(
            report,
            ReconcileReport::Aborted {
                stage: Stage::ListSessions,
                session_id: None,
                ..
            }
        ));
        assert!(h.notifier.is_empty());
    }
}
