//! LMDB backend tests: persistence, index ordering and uniqueness rules.

use std::sync::Arc;

use kyc_nullables::NullClock;
use kyc_store::{SessionStore, StoreError, WebhookAuditRecord, WebhookAuditStore};
use kyc_store_lmdb::LmdbEnvironment;
use kyc_types::{SessionStatus, Timestamp, VerificationSession};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const MAP_SIZE: usize = 16 * 1024 * 1024;

fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).expect("open env");
    (dir, env)
}

fn session(user: &str, at: u64) -> VerificationSession {
    VerificationSession::new_pending(user, "a@x.com", "Ann", "Lee", Timestamp::new(at))
}

fn audit(provider: &str, event_type: &str, at: u64) -> WebhookAuditRecord {
    WebhookAuditRecord {
        id: Uuid::new_v4(),
        event_type: event_type.to_string(),
        provider_session_id: provider.to_string(),
        raw_payload: format!("{{\"event_type\":\"{event_type}\"}}").into_bytes(),
        processed: true,
        received_at: Timestamp::new(at),
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[test]
fn create_and_get_round_trip() {
    let (_dir, env) = temp_env();
    let store = env.session_store(Arc::new(NullClock::new(1_000)));
    let created = store.create_session(&session("u1", 10)).unwrap();

    let loaded = store
        .get_session_by_session_id(&created.session_id)
        .unwrap()
        .expect("session present");
    assert_eq!(loaded, created);
    assert!(store.get_session_by_session_id("nope").unwrap().is_none());
}

#[test]
fn sessions_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let session_id = {
        let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
        let store = env.session_store(Arc::new(NullClock::new(0)));
        let s = store.create_session(&session("u1", 10)).unwrap();
        env.sync().unwrap();
        s.session_id
    };
    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
    let store = env.session_store(Arc::new(NullClock::new(0)));
    assert!(store.get_session_by_session_id(&session_id).unwrap().is_some());
}

#[test]
fn user_listing_is_newest_first_with_insertion_tie_break() {
    let (_dir, env) = temp_env();
    let store = env.session_store(Arc::new(NullClock::new(0)));
    let old = store.create_session(&session("u1", 10)).unwrap();
    let tie_a = store.create_session(&session("u1", 20)).unwrap();
    let tie_b = store.create_session(&session("u1", 20)).unwrap();
    store.create_session(&session("u11", 99)).unwrap();

    let listed: Vec<String> = store
        .list_sessions_by_user_id("u1")
        .unwrap()
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert_eq!(listed, vec![tie_b.session_id.clone(), tie_a.session_id, old.session_id]);

    let latest = store.latest_session_for_user("u1").unwrap().unwrap();
    assert_eq!(latest.session_id, tie_b.session_id);
    assert!(store.list_sessions_by_user_id("u").unwrap().is_empty());
}

#[test]
fn status_update_moves_status_index_and_completes_once() {
    let (_dir, env) = temp_env();
    let clock = Arc::new(NullClock::new(100));
    let store = env.session_store(clock.clone());
    let s = store.create_session(&session("u1", 10)).unwrap();

    let approved = store.update_status(&s.session_id, SessionStatus::Approved).unwrap();
    assert_eq!(approved.completed_at, Some(Timestamp::new(100)));
    assert!(store.list_sessions_by_status(SessionStatus::Pending).unwrap().is_empty());
    assert_eq!(store.list_sessions_by_status(SessionStatus::Approved).unwrap().len(), 1);

    clock.advance(50);
    let failed = store.update_status(&s.session_id, SessionStatus::Failed).unwrap();
    assert_eq!(failed.status, SessionStatus::Failed);
    assert_eq!(failed.completed_at, Some(Timestamp::new(100)));
    assert_eq!(failed.updated_at, Timestamp::new(150));
    assert!(store.list_sessions_by_status(SessionStatus::Approved).unwrap().is_empty());
}

#[test]
fn update_unknown_session_is_not_found() {
    let (_dir, env) = temp_env();
    let store = env.session_store(Arc::new(NullClock::new(0)));
    assert!(matches!(
        store.update_status("missing", SessionStatus::Review),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn provider_id_attach_is_idempotent_and_unique() {
    let (_dir, env) = temp_env();
    let store = env.session_store(Arc::new(NullClock::new(0)));
    let a = store.create_session(&session("u1", 10)).unwrap();
    let b = store.create_session(&session("u2", 10)).unwrap();

    store.attach_provider_session_id(&a.session_id, "prov-1").unwrap();
    let again = store.attach_provider_session_id(&a.session_id, "prov-1").unwrap();
    assert_eq!(again.provider_session_id.as_deref(), Some("prov-1"));

    assert!(matches!(
        store.attach_provider_session_id(&b.session_id, "prov-1"),
        Err(StoreError::Duplicate(_))
    ));

    // Overwrite on the owning session releases the old id.
    store.attach_provider_session_id(&a.session_id, "prov-2").unwrap();
    assert!(store.get_session_by_provider_session_id("prov-1").unwrap().is_none());
    let owner = store.get_session_by_provider_session_id("prov-2").unwrap().unwrap();
    assert_eq!(owner.session_id, a.session_id);
    store.attach_provider_session_id(&b.session_id, "prov-1").unwrap();
}

#[test]
fn duplicate_session_id_is_rejected() {
    let (_dir, env) = temp_env();
    let store = env.session_store(Arc::new(NullClock::new(0)));
    let s = session("u1", 10);
    store.create_session(&s).unwrap();
    assert!(matches!(store.create_session(&s), Err(StoreError::Duplicate(_))));
    assert_eq!(store.list_sessions_by_user_id("u1").unwrap().len(), 1);
}

#[test]
fn long_opaque_ids_are_stored_and_indexed() {
    let (_dir, env) = temp_env();
    let store = env.session_store(Arc::new(NullClock::new(0)));
    let user = "u".repeat(600);
    let provider = "p".repeat(600);

    let older = store.create_session(&session(&user, 10)).unwrap();
    let newer = store.create_session(&session(&user, 20)).unwrap();
    store.create_session(&session(&user[..599], 30)).unwrap();

    let listed: Vec<String> = store
        .list_sessions_by_user_id(&user)
        .unwrap()
        .into_iter()
        .map(|s| s.session_id)
        .collect();
    assert_eq!(listed, vec![newer.session_id.clone(), older.session_id]);

    store.attach_provider_session_id(&newer.session_id, &provider).unwrap();
    let owner = store.get_session_by_provider_session_id(&provider).unwrap().unwrap();
    assert_eq!(owner.session_id, newer.session_id);
    assert_eq!(owner.user_id, user);

    assert!(store.get_session_by_session_id(&"s".repeat(600)).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Audits
// ---------------------------------------------------------------------------

#[test]
fn audit_with_long_provider_id_is_indexed() {
    let (_dir, env) = temp_env();
    let audits = env.audit_store();
    let provider = "p".repeat(600);
    let record = audit(&provider, "verification.completed", 1);
    audits.record_webhook_audit(&record).unwrap();
    audits.record_webhook_audit(&audit("other", "ping", 2)).unwrap();

    assert_eq!(
        audits.list_audits_by_provider_session_id(&provider).unwrap(),
        vec![record]
    );
}

#[test]
fn audits_list_newest_first_and_by_provider() {
    let (_dir, env) = temp_env();
    let audits = env.audit_store();
    let first = audit("prov-1", "verification.review", 1);
    let second = audit("prov-2", "verification.completed", 2);
    let third = audit("prov-1", "verification.approved", 3);
    let anonymous = audit("", "ping", 4);
    for record in [&first, &second, &third, &anonymous] {
        audits.record_webhook_audit(record).unwrap();
    }

    let recent = audits.list_recent_audits(3).unwrap();
    assert_eq!(recent, vec![anonymous.clone(), third.clone(), second.clone()]);

    let for_prov = audits.list_audits_by_provider_session_id("prov-1").unwrap();
    assert_eq!(for_prov, vec![third, first]);
    assert!(audits.list_audits_by_provider_session_id("").unwrap().is_empty());
}
