//! Nullable store: thread-safe in-memory session and audit storage.

use kyc_store::{SessionStore, StoreError, WebhookAuditRecord, WebhookAuditStore};
use kyc_types::{Clock, SessionStatus, SystemClock, VerificationSession};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Operations that can be made to fail on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailOn {
    Create,
    Get,
    List,
    UpdateStatus,
    AttachProvider,
    Audit,
}

#[derive(Default)]
struct Inner {
    /// `(insertion sequence, session)` in insertion order.
    sessions: Vec<(u64, VerificationSession)>,
    audits: Vec<WebhookAuditRecord>,
    next_seq: u64,
}

/// An in-memory session + audit store.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullSessionStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    failing: Mutex<HashSet<FailOn>>,
    mutations: AtomicUsize,
}

impl NullSessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
            failing: Mutex::new(HashSet::new()),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent call of `op` fail with a backend error.
    pub fn fail_on(&self, op: FailOn) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Number of session mutations attempted (create, status, provider id).
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn audits(&self) -> Vec<WebhookAuditRecord> {
        self.inner.lock().unwrap().audits.clone()
    }

    pub fn session_count(&self) -> usize {
        self.inner.lock().unwrap().sessions.len()
    }

    fn check(&self, op: FailOn) -> Result<(), StoreError> {
        if self.failing.lock().unwrap().contains(&op) {
            return Err(StoreError::Backend(format!("injected failure on {op:?}")));
        }
        Ok(())
    }

    fn newest_first<F>(&self, predicate: F) -> Vec<VerificationSession>
    where
        F: Fn(&VerificationSession) -> bool,
    {
        let inner = self.inner.lock().unwrap();
        let mut matching: Vec<&(u64, VerificationSession)> =
            inner.sessions.iter().filter(|(_, s)| predicate(s)).collect();
        matching.sort_by(|a, b| {
            b.1.created_at
                .cmp(&a.1.created_at)
                .then_with(|| b.0.cmp(&a.0))
        });
        matching.into_iter().map(|(_, s)| s.clone()).collect()
    }

    /// Load, check and mutate one session under a single lock.
    fn modify<F>(&self, session_id: &str, f: F) -> Result<VerificationSession, StoreError>
    where
        F: FnOnce(&[(u64, VerificationSession)], usize) -> Result<VerificationSession, StoreError>,
    {
        let mut inner = self.inner.lock().unwrap();
        let index = inner
            .sessions
            .iter()
            .position(|(_, s)| s.session_id == session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        let updated = f(&inner.sessions, index)?;
        inner.sessions[index].1 = updated.clone();
        Ok(updated)
    }
}

impl Default for NullSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for NullSessionStore {
    fn create_session(
        &self,
        session: &VerificationSession,
    ) -> Result<VerificationSession, StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check(FailOn::Create)?;
        let mut inner = self.inner.lock().unwrap();
        if inner
            .sessions
            .iter()
            .any(|(_, s)| s.session_id == session.session_id)
        {
            return Err(StoreError::Duplicate(session.session_id.clone()));
        }
        if let Some(provider_id) = &session.provider_session_id {
            if inner
                .sessions
                .iter()
                .any(|(_, s)| s.provider_session_id.as_ref() == Some(provider_id))
            {
                return Err(StoreError::Duplicate(provider_id.clone()));
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.sessions.push((seq, session.clone()));
        Ok(session.clone())
    }

    fn get_session_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<VerificationSession>, StoreError> {
        self.check(FailOn::Get)?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|(_, s)| s.session_id == session_id)
            .map(|(_, s)| s.clone()))
    }

    fn get_session_by_provider_session_id(
        &self,
        provider_session_id: &str,
    ) -> Result<Option<VerificationSession>, StoreError> {
        self.check(FailOn::Get)?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|(_, s)| s.provider_session_id.as_deref() == Some(provider_session_id))
            .map(|(_, s)| s.clone()))
    }

    fn list_sessions_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Vec<VerificationSession>, StoreError> {
        self.check(FailOn::List)?;
        Ok(self.newest_first(|s| s.user_id == user_id))
    }

    fn list_sessions_by_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<VerificationSession>, StoreError> {
        self.check(FailOn::List)?;
        Ok(self.newest_first(|s| s.status == status))
    }

    fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<VerificationSession, StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check(FailOn::UpdateStatus)?;
        let now = self.clock.now();
        self.modify(session_id, |sessions, index| {
            let mut session = sessions[index].1.clone();
            session.apply_status(status, now);
            Ok(session)
        })
    }

    fn attach_provider_session_id(
        &self,
        session_id: &str,
        provider_session_id: &str,
    ) -> Result<VerificationSession, StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check(FailOn::AttachProvider)?;
        let now = self.clock.now();
        self.modify(session_id, |sessions, index| {
            let taken = sessions.iter().any(|(_, s)| {
                s.session_id != session_id
                    && s.provider_session_id.as_deref() == Some(provider_session_id)
            });
            if taken {
                return Err(StoreError::Duplicate(provider_session_id.to_string()));
            }
            let mut session = sessions[index].1.clone();
            session.attach_provider_session_id(provider_session_id, now);
            Ok(session)
        })
    }
}

impl WebhookAuditStore for NullSessionStore {
    fn record_webhook_audit(&self, record: &WebhookAuditRecord) -> Result<(), StoreError> {
        self.check(FailOn::Audit)?;
        self.inner.lock().unwrap().audits.push(record.clone());
        Ok(())
    }

    fn list_recent_audits(&self, limit: usize) -> Result<Vec<WebhookAuditRecord>, StoreError> {
        self.check(FailOn::Audit)?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .audits
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    fn list_audits_by_provider_session_id(
        &self,
        provider_session_id: &str,
    ) -> Result<Vec<WebhookAuditRecord>, StoreError> {
        self.check(FailOn::Audit)?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .audits
            .iter()
            .rev()
            .filter(|r| r.provider_session_id == provider_session_id)
            .cloned()
            .collect())
    }
}
