//! LMDB implementation of WebhookAuditStore.
//!
//! Records are appended under an inverted sequence key so a forward scan of
//! `audits` returns newest first. `audits_by_provider` points back to those
//! keys for per-provider-session lookups. Nothing is ever overwritten.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use kyc_store::{StoreError, WebhookAuditRecord, WebhookAuditStore};

use crate::keys;
use crate::meta::{next_seq, AUDIT_SEQ_KEY};
use crate::LmdbError;

pub struct LmdbAuditStore {
    pub(crate) env: Arc<Env>,
    pub(crate) audits_db: Database<Bytes, Bytes>,
    pub(crate) audits_by_provider_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl WebhookAuditStore for LmdbAuditStore {
    fn record_webhook_audit(&self, record: &WebhookAuditRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let seq = next_seq(&self.meta_db, &mut wtxn, AUDIT_SEQ_KEY)?;
        let key = keys::audit_key(seq);
        self.audits_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        if !record.provider_session_id.is_empty() {
            self.audits_by_provider_db
                .put(
                    &mut wtxn,
                    &keys::audit_provider_key(&record.provider_session_id, seq),
                    &key,
                )
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn list_recent_audits(&self, limit: usize) -> Result<Vec<WebhookAuditRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for entry in self.audits_db.iter(&rtxn).map_err(LmdbError::from)?.take(limit) {
            let (_key, bytes) = entry.map_err(LmdbError::from)?;
            records.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(records)
    }

    fn list_audits_by_provider_session_id(
        &self,
        provider_session_id: &str,
    ) -> Result<Vec<WebhookAuditRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let prefix = keys::provider_key(provider_session_id);
        let mut records = Vec::new();
        for entry in self
            .audits_by_provider_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (_key, audit_key) = entry.map_err(LmdbError::from)?;
            let bytes = self
                .audits_db
                .get(&rtxn, audit_key)
                .map_err(LmdbError::from)?
                .ok_or_else(|| LmdbError::NotFound("indexed audit record".to_string()))?;
            records.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(records)
    }
}
