//! End-to-end flows through session creation and webhook reconciliation.

use std::sync::Arc;

use kyc_notify::NotificationKind;
use kyc_nullables::{NullClock, NullNotifier, NullSessionStore};
use kyc_reconcile::{
    ReconcileEngine, ReconcileMetrics, StartVerification, VerificationStarter,
    VerificationUrlBuilder,
};
use kyc_store::{SessionStore, WebhookAuditStore};
use kyc_types::{Clock, SessionStatus, Timestamp, WebhookEvent};

struct World {
    clock: Arc<NullClock>,
    store: Arc<NullSessionStore>,
    notifier: Arc<NullNotifier>,
    starter: VerificationStarter,
    engine: ReconcileEngine,
}

fn world() -> World {
    let clock = Arc::new(NullClock::new(1_700_000_000));
    let store = Arc::new(NullSessionStore::with_clock(clock.clone()));
    let notifier = Arc::new(NullNotifier::new());
    let starter = VerificationStarter::new(
        store.clone(),
        VerificationUrlBuilder::new("https://verify.example.com/flow").unwrap(),
        clock.clone(),
    );
    let engine = ReconcileEngine::new(
        store.clone(),
        store.clone(),
        notifier.clone(),
        Arc::new(ReconcileMetrics::new()),
        clock.clone(),
    );
    World {
        clock,
        store,
        notifier,
        starter,
        engine,
    }
}

fn start(world: &World, user_id: &str, email: &str) -> String {
    world
        .starter
        .start(&StartVerification {
            user_id: user_id.into(),
            email: email.into(),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
        })
        .unwrap()
        .session_id
}

fn deliver(world: &World, body: &str) {
    let event = WebhookEvent::parse(body.as_bytes(), world.clock.now()).unwrap();
    world.engine.ingest(&event);
}

#[test]
fn start_then_completed_webhook_approves_and_notifies() {
    let w = world();
    let session_id = start(&w, "u1", "a@x.com");
    w.clock.advance(120);

    deliver(
        &w,
        r#"{"event_type":"verification.completed","data":{"session_id":"prov-1","user_id":"u1"}}"#,
    );

    let session = w
        .store
        .get_session_by_session_id(&session_id)
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Approved);
    assert_eq!(session.provider_session_id.as_deref(), Some("prov-1"));
    assert_eq!(session.completed_at, Some(Timestamp::new(1_700_000_120)));

    let sent = w.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Approved);
    assert_eq!(sent[0].recipient.email, "a@x.com");

    let by_provider = w
        .store
        .get_session_by_provider_session_id("prov-1")
        .unwrap()
        .unwrap();
    assert_eq!(by_provider.session_id, session_id);
    assert_eq!(w.store.list_audits_by_provider_session_id("prov-1").unwrap().len(), 1);
}

#[test]
fn unattributable_rejection_changes_nothing() {
    let w = world();
    let session_id = start(&w, "u1", "a@x.com");

    deliver(
        &w,
        r#"{"event_type":"verification.rejected","data":{"session_id":"prov-2","metadata":{}}}"#,
    );

    let session = w
        .store
        .get_session_by_session_id(&session_id)
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Pending);
    assert_eq!(session.provider_session_id, None);
    assert!(w.notifier.is_empty());
    assert_eq!(w.store.list_recent_audits(10).unwrap().len(), 1);
}

#[test]
fn review_then_approval_of_latest_session() {
    let w = world();
    let first = start(&w, "u1", "a@x.com");
    w.clock.advance(1);
    let second = start(&w, "u1", "a@x.com");

    deliver(
        &w,
        r#"{"type":"verification.review","session_id":"prov-3","user_id":"u1"}"#,
    );
    w.clock.advance(1);
    deliver(
        &w,
        r#"{"event_type":"verification.approved","data":{"session_id":"prov-3","user_data":{"user_id":"u1"}}}"#,
    );

    let get = |id: &str| w.store.get_session_by_session_id(id).unwrap().unwrap();
    assert_eq!(get(&first).status, SessionStatus::Pending);
    assert_eq!(get(&second).status, SessionStatus::Approved);
    assert_eq!(w.notifier.count(NotificationKind::Approved), 1);
    assert_eq!(
        w.store
            .list_sessions_by_status(SessionStatus::Approved)
            .unwrap()
            .len(),
        1
    );
}
