//! Daemon shutdown sequence.
//!
//! A SIGINT/SIGTERM (or a failed HTTP server) stops the HTTP server from
//! accepting new requests. Once in-flight requests finish, the notification
//! worker gets a bounded window to flush queued messages via
//! [`drain_notifications`] before the store is synced.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Why the daemon is stopping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    /// The HTTP server stopped on its own with an error.
    ServerError,
}

impl ShutdownReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::ServerError => "server error",
        }
    }
}

/// Latches the first shutdown reason. Waiters created after the latch
/// resolve immediately.
pub struct ShutdownController {
    tx: watch::Sender<Option<ShutdownReason>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    /// Record `reason` unless shutdown is already under way.
    pub fn trigger(&self, reason: ShutdownReason) {
        let latched = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if latched {
            tracing::info!(reason = reason.as_str(), "shutting down");
        }
    }

    /// Resolves once shutdown has been triggered; suitable for
    /// `axum::serve(..).with_graceful_shutdown`.
    pub fn signalled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.wait_for(Option::is_some).await;
        }
    }

    /// Wait for SIGINT or SIGTERM and latch it.
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable, SIGINT only");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let reason = tokio::select! {
            _ = signal::ctrl_c() => ShutdownReason::Interrupt,
            _ = terminate => ShutdownReason::Terminate,
        };
        self.trigger(reason);
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// How the notification worker finished.
#[derive(Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    Drained,
    Panicked,
    TimedOut,
}

/// Await the notification worker for at most `timeout`.
///
/// The worker only exits after every dispatcher handle is dropped, so call
/// this after the HTTP server and its state are gone.
pub async fn drain_notifications(worker: JoinHandle<()>, timeout: Duration) -> DrainOutcome {
    match tokio::time::timeout(timeout, worker).await {
        Ok(Ok(())) => {
            tracing::info!("notification queue drained");
            DrainOutcome::Drained
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "notification worker panicked");
            DrainOutcome::Panicked
        }
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "gave up draining notification queue");
            DrainOutcome::TimedOut
        }
    }
}
