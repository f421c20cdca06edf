//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tracing::info;

use kyc_types::Clock;

use crate::{LmdbAuditStore, LmdbError, LmdbSessionStore};

/// Number of named databases opened by [`LmdbEnvironment::open`].
pub const DATABASE_COUNT: u32 = 7;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    sessions_db: Database<Bytes, Bytes>,
    sessions_by_user_db: Database<Bytes, Bytes>,
    sessions_by_status_db: Database<Bytes, Bytes>,
    provider_index_db: Database<Bytes, Bytes>,
    audits_db: Database<Bytes, Bytes>,
    audits_by_provider_db: Database<Bytes, Bytes>,
    meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment in the directory `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment directory is owned by this process; nothing
        // else opens it with incompatible flags while we hold it.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(DATABASE_COUNT)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let sessions_db = env.create_database(&mut wtxn, Some("sessions"))?;
        let sessions_by_user_db = env.create_database(&mut wtxn, Some("sessions_by_user"))?;
        let sessions_by_status_db = env.create_database(&mut wtxn, Some("sessions_by_status"))?;
        let provider_index_db = env.create_database(&mut wtxn, Some("provider_index"))?;
        let audits_db = env.create_database(&mut wtxn, Some("audits"))?;
        let audits_by_provider_db = env.create_database(&mut wtxn, Some("audits_by_provider"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        info!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            sessions_db,
            sessions_by_user_db,
            sessions_by_status_db,
            provider_index_db,
            audits_db,
            audits_by_provider_db,
            meta_db,
        })
    }

    /// Session store over this environment, stamping updates from `clock`.
    pub fn session_store(&self, clock: Arc<dyn Clock>) -> LmdbSessionStore {
        LmdbSessionStore {
            env: Arc::clone(&self.env),
            sessions_db: self.sessions_db,
            sessions_by_user_db: self.sessions_by_user_db,
            sessions_by_status_db: self.sessions_by_status_db,
            provider_index_db: self.provider_index_db,
            meta_db: self.meta_db,
            clock,
        }
    }

    pub fn audit_store(&self) -> LmdbAuditStore {
        LmdbAuditStore {
            env: Arc::clone(&self.env),
            audits_db: self.audits_db,
            audits_by_provider_db: self.audits_by_provider_db,
            meta_db: self.meta_db,
        }
    }

    /// Flush the environment to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}
