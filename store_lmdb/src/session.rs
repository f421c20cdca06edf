//! LMDB implementation of SessionStore.
//!
//! Primary records live in `sessions` keyed by `session_id`. Three secondary
//! indexes map back to that key:
//! - `sessions_by_user`: newest-first per user (see [`crate::keys`])
//! - `sessions_by_status`: newest-first per status, rewritten on status change
//! - `provider_index`: digest of provider session id → session id, enforcing
//!   uniqueness
//!
//! Every mutation runs in a single write transaction, so the record and its
//! index entries never diverge.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use kyc_store::{SessionStore, StoreError};
use kyc_types::{Clock, SessionStatus, VerificationSession};

use crate::keys;
use crate::meta::{next_seq, SESSION_SEQ_KEY};
use crate::LmdbError;

/// On-disk record: the session plus its insertion sequence number.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    seq: u64,
    session: VerificationSession,
}

pub struct LmdbSessionStore {
    pub(crate) env: Arc<Env>,
    pub(crate) sessions_db: Database<Bytes, Bytes>,
    pub(crate) sessions_by_user_db: Database<Bytes, Bytes>,
    pub(crate) sessions_by_status_db: Database<Bytes, Bytes>,
    pub(crate) provider_index_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl LmdbSessionStore {
    fn load(&self, txn: &RoTxn<'_>, session_id: &str) -> Result<Option<StoredSession>, LmdbError> {
        // Session ids are primary keys, so an oversized one was never stored.
        if session_id.len() > keys::MAX_KEY_SIZE {
            return Ok(None);
        }
        match self.sessions_db.get(txn, session_id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, wtxn: &mut RwTxn<'_>, stored: &StoredSession) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(stored)?;
        self.sessions_db
            .put(wtxn, stored.session.session_id.as_bytes(), &bytes)?;
        Ok(())
    }

    /// Resolve every session id found under `prefix` in `index`, in key order.
    fn scan_index(
        &self,
        index: &Database<Bytes, Bytes>,
        prefix: &[u8],
    ) -> Result<Vec<VerificationSession>, LmdbError> {
        let rtxn = self.env.read_txn()?;
        let mut session_ids = Vec::new();
        for entry in index.prefix_iter(&rtxn, prefix)? {
            let (_key, session_id) = entry?;
            session_ids.push(String::from_utf8_lossy(session_id).into_owned());
        }
        let mut sessions = Vec::with_capacity(session_ids.len());
        for session_id in session_ids {
            let stored = self
                .load(&rtxn, &session_id)?
                .ok_or_else(|| LmdbError::NotFound(format!("indexed session {session_id}")))?;
            sessions.push(stored.session);
        }
        Ok(sessions)
    }

    /// Load, mutate and write back one session inside a single transaction.
    fn modify<F>(&self, session_id: &str, f: F) -> Result<VerificationSession, StoreError>
    where
        F: FnOnce(&Self, &mut RwTxn<'_>, &mut StoredSession) -> Result<(), StoreError>,
    {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut stored = self
            .load(&wtxn, session_id)?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        f(self, &mut wtxn, &mut stored)?;
        self.save(&mut wtxn, &stored)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(stored.session)
    }
}

impl SessionStore for LmdbSessionStore {
    fn create_session(
        &self,
        session: &VerificationSession,
    ) -> Result<VerificationSession, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self.load(&wtxn, &session.session_id)?.is_some() {
            return Err(StoreError::Duplicate(session.session_id.clone()));
        }
        if let Some(provider_id) = &session.provider_session_id {
            let taken = self
                .provider_index_db
                .get(&wtxn, &keys::provider_key(provider_id))
                .map_err(LmdbError::from)?
                .is_some();
            if taken {
                return Err(StoreError::Duplicate(provider_id.clone()));
            }
            self.provider_index_db
                .put(
                    &mut wtxn,
                    &keys::provider_key(provider_id),
                    session.session_id.as_bytes(),
                )
                .map_err(LmdbError::from)?;
        }

        let seq = next_seq(&self.meta_db, &mut wtxn, SESSION_SEQ_KEY)?;
        let session_key = session.session_id.as_bytes();
        self.sessions_by_user_db
            .put(
                &mut wtxn,
                &keys::user_index_key(&session.user_id, session.created_at, seq),
                session_key,
            )
            .map_err(LmdbError::from)?;
        self.sessions_by_status_db
            .put(
                &mut wtxn,
                &keys::status_index_key(session.status, session.created_at, seq),
                session_key,
            )
            .map_err(LmdbError::from)?;

        let stored = StoredSession {
            seq,
            session: session.clone(),
        };
        self.save(&mut wtxn, &stored)?;
        wtxn.commit().map_err(LmdbError::from)?;
        debug!(session_id = %session.session_id, user_id = %session.user_id, seq, "session created");
        Ok(stored.session)
    }

    fn get_session_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<VerificationSession>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.load(&rtxn, session_id)?.map(|stored| stored.session))
    }

    fn get_session_by_provider_session_id(
        &self,
        provider_session_id: &str,
    ) -> Result<Option<VerificationSession>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let Some(session_id) = self
            .provider_index_db
            .get(&rtxn, &keys::provider_key(provider_session_id))
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        let session_id = String::from_utf8_lossy(session_id).into_owned();
        Ok(self.load(&rtxn, &session_id)?.map(|stored| stored.session))
    }

    fn list_sessions_by_user_id(
        &self,
        user_id: &str,
    ) -> Result<Vec<VerificationSession>, StoreError> {
        Ok(self.scan_index(&self.sessions_by_user_db, &keys::user_prefix(user_id))?)
    }

    fn list_sessions_by_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<VerificationSession>, StoreError> {
        Ok(self.scan_index(&self.sessions_by_status_db, &keys::status_prefix(status))?)
    }

    fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<VerificationSession, StoreError> {
        let now = self.clock.now();
        self.modify(session_id, |store, wtxn, stored| {
            let previous = stored.session.status;
            stored.session.apply_status(status, now);
            if previous != status {
                let created_at = stored.session.created_at;
                store
                    .sessions_by_status_db
                    .delete(wtxn, &keys::status_index_key(previous, created_at, stored.seq))
                    .map_err(LmdbError::from)?;
                store
                    .sessions_by_status_db
                    .put(
                        wtxn,
                        &keys::status_index_key(status, created_at, stored.seq),
                        stored.session.session_id.as_bytes(),
                    )
                    .map_err(LmdbError::from)?;
            }
            Ok(())
        })
    }

    fn attach_provider_session_id(
        &self,
        session_id: &str,
        provider_session_id: &str,
    ) -> Result<VerificationSession, StoreError> {
        let now = self.clock.now();
        self.modify(session_id, |store, wtxn, stored| {
            if let Some(owner) = store
                .provider_index_db
                .get(wtxn, &keys::provider_key(provider_session_id))
                .map_err(LmdbError::from)?
            {
                if owner != session_id.as_bytes() {
                    return Err(StoreError::Duplicate(provider_session_id.to_string()));
                }
            }
            let previous = stored.session.provider_session_id.clone();
            if stored
                .session
                .attach_provider_session_id(provider_session_id, now)
            {
                if let Some(old) = previous {
                    store
                        .provider_index_db
                        .delete(wtxn, &keys::provider_key(&old))
                        .map_err(LmdbError::from)?;
                }
                store
                    .provider_index_db
                    .put(
                        wtxn,
                        &keys::provider_key(provider_session_id),
                        session_id.as_bytes(),
                    )
                    .map_err(LmdbError::from)?;
            }
            Ok(())
        })
    }
}
