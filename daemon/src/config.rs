//! Service configuration with TOML file support.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use kyc_utils::LogFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(String),
}

/// Where sessions and audit records live.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Lmdb,
    /// Process-local; everything is lost on exit.
    Memory,
}

/// Configuration for the reconciliation service.
///
/// Loaded from a TOML file via [`ServiceConfig::from_toml_file`]; every field
/// has a default so an empty file is valid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub storage: StorageKind,

    /// LMDB map size in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Provider workflow URL users are sent to.
    #[serde(default = "default_verification_base_url")]
    pub verification_base_url: String,

    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Reject webhooks whose signature does not verify.
    #[serde(default)]
    pub require_signature: bool,

    #[serde(default = "default_notification_channel_capacity")]
    pub notification_channel_capacity: usize,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./kyc_data")
}

fn default_lmdb_map_size() -> usize {
    1 << 30
}

fn default_verification_base_url() -> String {
    "https://verify.example.com/verify".to_string()
}

fn default_notification_channel_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ServiceConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Cross-field checks. Run after CLI overrides are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.require_signature && self.webhook_secret.as_deref().unwrap_or("").is_empty() {
            return Err(ConfigError::Parse(
                "require_signature is set but webhook_secret is empty".into(),
            ));
        }
        if self.notification_channel_capacity == 0 {
            return Err(ConfigError::Parse(
                "notification_channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            data_dir: default_data_dir(),
            storage: StorageKind::default(),
            lmdb_map_size: default_lmdb_map_size(),
            verification_base_url: default_verification_base_url(),
            webhook_secret: None,
            require_signature: false,
            notification_channel_capacity: default_notification_channel_capacity(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}
