//! Wires storage, the notification worker, the engine and the HTTP state.

use std::sync::Arc;

use anyhow::Context;
use kyc_notify::{LogNotifier, NotificationDispatcher};
use kyc_nullables::NullSessionStore;
use kyc_reconcile::{
    HmacVerifier, ReconcileEngine, ReconcileMetrics, VerificationStarter, VerificationUrlBuilder,
};
use kyc_rpc::{AppState, SignaturePolicy};
use kyc_store::{SessionStore, WebhookAuditStore};
use kyc_store_lmdb::LmdbEnvironment;
use kyc_types::{Clock, SystemClock};
use tokio::task::JoinHandle;

use crate::config::{ServiceConfig, StorageKind};

/// Open backends, held for the lifetime of the process.
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub audits: Arc<dyn WebhookAuditStore>,
    /// Present for LMDB storage; synced on shutdown.
    pub lmdb: Option<LmdbEnvironment>,
}

pub fn open_stores(config: &ServiceConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Stores> {
    match config.storage {
        StorageKind::Lmdb => {
            let env = LmdbEnvironment::open(&config.data_dir, config.lmdb_map_size)
                .with_context(|| format!("opening LMDB at {}", config.data_dir.display()))?;
            Ok(Stores {
                sessions: Arc::new(env.session_store(clock)),
                audits: Arc::new(env.audit_store()),
                lmdb: Some(env),
            })
        }
        StorageKind::Memory => {
            tracing::warn!("using in-memory storage; sessions are lost on exit");
            let store = Arc::new(NullSessionStore::with_clock(clock));
            Ok(Stores {
                sessions: store.clone(),
                audits: store,
                lmdb: None,
            })
        }
    }
}

pub fn signature_policy(config: &ServiceConfig) -> anyhow::Result<SignaturePolicy> {
    let secret = config.webhook_secret.as_deref().filter(|s| !s.is_empty());
    let Some(secret) = secret else {
        if config.require_signature {
            anyhow::bail!("require_signature is set but no webhook secret is configured");
        }
        tracing::warn!("no webhook secret configured; signatures are not checked");
        return Ok(SignaturePolicy::Disabled);
    };
    let verifier = HmacVerifier::new(secret)?;
    Ok(if config.require_signature {
        SignaturePolicy::Enforce(verifier)
    } else {
        SignaturePolicy::Warn(verifier)
    })
}

/// Everything the HTTP server needs, plus the notification worker handle.
pub struct Service {
    pub state: Arc<AppState>,
    pub notification_worker: JoinHandle<()>,
}

/// Build the service on the current runtime. Spawns the notification worker.
pub fn build(config: &ServiceConfig, stores: &Stores) -> anyhow::Result<Service> {
    let urls = VerificationUrlBuilder::new(&config.verification_base_url)?;
    let signature = signature_policy(config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let metrics = Arc::new(ReconcileMetrics::new());

    let (dispatcher, notification_worker) = NotificationDispatcher::spawn(
        Arc::new(LogNotifier::default()),
        config.notification_channel_capacity,
        metrics.notifications.clone(),
    );

    let engine = ReconcileEngine::new(
        stores.sessions.clone(),
        stores.audits.clone(),
        Arc::new(dispatcher),
        metrics.clone(),
        clock.clone(),
    );
    let starter = VerificationStarter::new(stores.sessions.clone(), urls, clock.clone());

    let state = AppState {
        engine: Arc::new(engine),
        starter: Arc::new(starter),
        sessions: stores.sessions.clone(),
        audits: stores.audits.clone(),
        metrics,
        signature,
        clock,
    };

    Ok(Service {
        state: Arc::new(state),
        notification_worker,
    })
}
