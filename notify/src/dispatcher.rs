//! Background notification dispatch.
//!
//! [`NotificationDispatcher::spawn`] starts one worker task draining a bounded
//! queue. Each notification gets a single send attempt on the blocking pool;
//! the outcome is logged and counted, never returned. When the queue is full
//! or the worker is gone, the notification is dropped with a warning.
//!
//! The worker exits once every dispatcher handle is dropped and the queue is
//! drained, so awaiting its `JoinHandle` at shutdown flushes pending sends.

use std::sync::Arc;

use prometheus::IntCounter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::{Notification, NotificationSink, Notifier};

/// Delivery counters, usually registered with the service's metrics registry.
#[derive(Clone)]
pub struct DispatchCounters {
    pub sent: IntCounter,
    pub failed: IntCounter,
    pub dropped: IntCounter,
}

impl DispatchCounters {
    /// Fresh counters that are not registered anywhere.
    pub fn unregistered() -> Self {
        Self {
            sent: IntCounter::new("kyc_notifications_sent_total", "Notifications delivered")
                .expect("valid counter opts"),
            failed: IntCounter::new("kyc_notifications_failed_total", "Notification sends that failed")
                .expect("valid counter opts"),
            dropped: IntCounter::new(
                "kyc_notifications_dropped_total",
                "Notifications dropped before reaching the worker",
            )
            .expect("valid counter opts"),
        }
    }
}

/// Production [`NotificationSink`]: queues work for a background worker.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Notification>,
    counters: DispatchCounters,
}

impl NotificationDispatcher {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        capacity: usize,
        counters: DispatchCounters,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(rx, notifier, counters.clone()));
        (Self { tx, counters }, handle)
    }
}

impl NotificationSink for NotificationDispatcher {
    fn submit(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                self.counters.dropped.inc();
                warn!(to = %n.recipient.email, kind = n.kind.as_str(), "notification queue full, dropping");
            }
            Err(TrySendError::Closed(n)) => {
                self.counters.dropped.inc();
                warn!(to = %n.recipient.email, kind = n.kind.as_str(), "notification worker stopped, dropping");
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Notification>,
    notifier: Arc<dyn Notifier>,
    counters: DispatchCounters,
) {
    while let Some(notification) = rx.recv().await {
        let to = notification.recipient.email.clone();
        let kind = notification.kind;
        debug!(to = %to, kind = kind.as_str(), "sending notification");

        let notifier = Arc::clone(&notifier);
        match tokio::task::spawn_blocking(move || notifier.send(&notification)).await {
            Ok(Ok(())) => {
                counters.sent.inc();
                debug!(to = %to, kind = kind.as_str(), "notification sent");
            }
            Ok(Err(e)) => {
                counters.failed.inc();
                warn!(to = %to, kind = kind.as_str(), error = %e, "notification send failed");
            }
            Err(e) => {
                counters.failed.inc();
                error!(to = %to, kind = kind.as_str(), error = %e, "notification task aborted");
            }
        }
    }
    debug!("notification worker stopped");
}
