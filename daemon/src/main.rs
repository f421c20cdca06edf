//! KYC daemon: entry point for the webhook reconciliation service.

mod config;
mod service;
mod shutdown;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use kyc_rpc::RpcServer;
use kyc_types::{Clock, SystemClock};
use kyc_utils::{init_logging, LogFormat};

use crate::config::{ServiceConfig, StorageKind};
use crate::shutdown::{drain_notifications, ShutdownController, ShutdownReason};

/// How long queued notifications may take to drain on shutdown.
const NOTIFICATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "kyc-daemon", about = "KYC verification webhook reconciliation service")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "KYC_CONFIG")]
    config: Option<PathBuf>,

    /// Address the HTTP server binds to.
    #[arg(long, env = "KYC_LISTEN_ADDR")]
    listen_addr: Option<SocketAddr>,

    /// Directory for LMDB storage.
    #[arg(long, env = "KYC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Storage backend.
    #[arg(long, value_enum, env = "KYC_STORAGE")]
    storage: Option<StorageKind>,

    /// Provider workflow URL users are sent to.
    #[arg(long, env = "KYC_VERIFICATION_BASE_URL")]
    verification_base_url: Option<String>,

    /// Shared secret for webhook HMAC signatures.
    #[arg(long, env = "KYC_WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: Option<String>,

    /// Reject webhooks whose signature does not verify.
    #[arg(long, env = "KYC_REQUIRE_SIGNATURE")]
    require_signature: Option<bool>,

    /// Log level filter, e.g. "info" or "debug,kyc_reconcile=trace".
    #[arg(long, env = "KYC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format: "human" or "json".
    #[arg(long, env = "KYC_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Overlay CLI flags and env vars onto `base`.
    fn apply(self, mut base: ServiceConfig) -> ServiceConfig {
        if let Some(addr) = self.listen_addr {
            base.listen_addr = addr;
        }
        if let Some(dir) = self.data_dir {
            base.data_dir = dir;
        }
        if let Some(storage) = self.storage {
            base.storage = storage;
        }
        if let Some(url) = self.verification_base_url {
            base.verification_base_url = url;
        }
        if let Some(secret) = self.webhook_secret {
            base.webhook_secret = Some(secret);
        }
        if let Some(require) = self.require_signature {
            base.require_signature = require;
        }
        if let Some(level) = self.log_level {
            base.log_level = level;
        }
        if let Some(format) = self.log_format {
            base.log_format = format;
        }
        base
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => ServiceConfig::from_toml_file(path)?,
        None => ServiceConfig::default(),
    };
    let config = cli.apply(file_config);
    config.validate()?;

    init_logging(config.log_format, &config.log_level);
    tracing::info!(
        listen_addr = %config.listen_addr,
        storage = ?config.storage,
        require_signature = config.require_signature,
        "starting kyc-daemon"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stores = service::open_stores(&config, clock)?;
    let service::Service {
        state,
        notification_worker,
    } = service::build(&config, &stores)?;

    let shutdown = Arc::new(ShutdownController::new());
    let signals = {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move { shutdown.wait_for_signal().await })
    };

    let server = RpcServer::new(config.listen_addr, state);
    let served = server.start(shutdown.signalled()).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "HTTP server failed");
        shutdown.trigger(ShutdownReason::ServerError);
    }
    signals.abort();

    // Dropping the last state reference closes the notification queue.
    drop(server);
    drain_notifications(notification_worker, NOTIFICATION_DRAIN_TIMEOUT).await;

    if let Some(env) = &stores.lmdb {
        if let Err(e) = env.sync() {
            tracing::error!(error = %e, "failed to sync LMDB on shutdown");
        }
    }

    served.context("HTTP server failed")?;
    tracing::info!(
        reason = shutdown.reason().map(ShutdownReason::as_str).unwrap_or("unknown"),
        "kyc-daemon stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let cli = Cli::parse_from([
            "kyc-daemon",
            "--listen-addr",
            "127.0.0.1:9100",
            "--storage",
            "memory",
            "--require-signature",
            "true",
            "--log-format",
            "json",
        ]);
        let base = ServiceConfig {
            log_level: "debug".into(),
            ..ServiceConfig::default()
        };
        let config = cli.apply(base);
        assert_eq!(config.listen_addr.port(), 9100);
        assert_eq!(config.storage, StorageKind::Memory);
        assert!(config.require_signature);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, "debug");
    }
}
