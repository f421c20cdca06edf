//! Axum-based HTTP server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use kyc_reconcile::{
    signature::SIGNATURE_HEADER, HmacVerifier, ReconcileEngine, ReconcileMetrics,
    VerificationStarter,
};
use kyc_store::{SessionStore, WebhookAuditStore};
use kyc_types::Clock;
use tower_http::trace::TraceLayer;

use crate::error::RpcError;
use crate::handlers;

/// How webhook signatures are treated.
#[derive(Clone, Debug)]
pub enum SignaturePolicy {
    /// No secret configured; nothing is checked.
    Disabled,
    /// Bad or missing signatures are logged, the webhook is still processed.
    Warn(HmacVerifier),
    /// Bad or missing signatures are rejected with 401.
    Enforce(HmacVerifier),
}

impl SignaturePolicy {
    pub fn check(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), RpcError> {
        let (verifier, enforce) = match self {
            Self::Disabled => return Ok(()),
            Self::Warn(v) => (v, false),
            Self::Enforce(v) => (v, true),
        };
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if verifier.verify(body, signature) {
            return Ok(());
        }
        if enforce {
            tracing::warn!(present = !signature.is_empty(), "rejecting webhook with bad signature");
            return Err(RpcError::InvalidSignature);
        }
        tracing::warn!(
            present = !signature.is_empty(),
            "webhook signature did not verify, processing anyway"
        );
        Ok(())
    }
}

/// Shared state handed to every handler.
pub struct AppState {
    pub engine: Arc<ReconcileEngine>,
    pub starter: Arc<VerificationStarter>,
    pub sessions: Arc<dyn SessionStore>,
    pub audits: Arc<dyn WebhookAuditStore>,
    pub metrics: Arc<ReconcileMetrics>,
    pub signature: SignaturePolicy,
    pub clock: Arc<dyn Clock>,
}

/// All routes, with request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/webhooks/provider", post(handlers::provider_webhook))
        .route("/webhooks/events", get(handlers::recent_webhook_events))
        .route(
            "/webhooks/events/:provider_session_id",
            get(handlers::webhook_events_for_session),
        )
        .route("/verification/start", post(handlers::start_verification))
        .route(
            "/verification/status/:session_id",
            get(handlers::verification_status),
        )
        .route("/verification/sessions", get(handlers::sessions_by_status))
        .route("/verification/user/:user_id", get(handlers::user_sessions))
        .route(
            "/verification/user/:user_id/latest",
            get(handlers::latest_user_session),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct RpcServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
}

impl RpcServer {
    pub fn new(addr: SocketAddr, state: Arc<AppState>) -> Self {
        Self { addr, state }
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(self.state.clone());
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| RpcError::Server(format!("failed to bind {}: {e}", self.addr)))?;
        tracing::info!(addr = %self.addr, "HTTP server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
