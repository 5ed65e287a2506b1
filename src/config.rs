//! Configuration management for the cluster detector
//!
//! Layered: built-in defaults, optional TOML file, then `CLUSTERS__*`
//! environment variables. The hosted-runtime variables `SUPABASE_URL` and
//! `SUPABASE_SERVICE_ROLE_KEY` win over everything for the store.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub use crate::cluster::DetectionConfig;
pub use crate::server::ServerConfig;
pub use crate::store::{StoreBackend, StoreConfig};
pub use crate::wallet::AnalyzerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            .set_default("server.bind_addr", "0.0.0.0")?
            .set_default("store.backend", "memory")?
            // Load from config file if it exists
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("CLUSTERS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_supabase_env(
            std::env::var("SUPABASE_URL").ok(),
            std::env::var("SUPABASE_SERVICE_ROLE_KEY").ok(),
        );
        config.validate()?;

        Ok(config)
    }

    /// Runtime-provided credentials replace whatever the file says
    fn apply_supabase_env(&mut self, url: Option<String>, key: Option<String>) {
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            self.store.url = url;
        }
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            self.store.service_role_key = key;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.detection.time_window_ms <= 0 {
            anyhow::bail!(
                "detection.time_window_ms must be positive, got {}",
                self.detection.time_window_ms
            );
        }

        if self.detection.new_wallet_threshold_days == 0
            || self.detection.new_wallet_threshold_tx == 0
        {
            anyhow::bail!("New-wallet thresholds must be non-zero");
        }

        if self.store.backend == StoreBackend::Supabase
            && (self.store.url.is_empty() || self.store.service_role_key.is_empty())
        {
            anyhow::bail!(
                "Supabase backend requires store.url and store.service_role_key \
                 (or SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY)"
            );
        }

        if self.analyzer.rpc_urls.is_empty() {
            anyhow::bail!("analyzer.rpc_urls must list at least one endpoint");
        }

        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }

        Ok(())
    }

    /// Get a display-safe version of the config (masks secrets)
    pub fn masked_display(&self) -> String {
        let rpc_urls = self
            .analyzer
            .rpc_urls
            .iter()
            .map(|u| mask_url(u))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"Configuration:
  Server:
    Bind: {}:{}
  Store:
    Backend: {:?}
    URL: {}
    Service Role Key: {}
    Tables: {} / {} / {}
    Replace RPC: {}
    Fixture: {}
  Detection:
    Time Window: {}ms
    New Wallet: age < {} days or < {} txs
    Sliding Cutoff: {}
    Large Token Warning: {} buys
  Analyzer:
    RPC URLs: {}
    Signature Limit: {}
    Timeout: {}ms"#,
            self.server.bind_addr,
            self.server.port,
            self.store.backend,
            if self.store.url.is_empty() {
                "(not set)".to_string()
            } else {
                mask_url(&self.store.url)
            },
            mask_secret(&self.store.service_role_key),
            self.store.transactions_table,
            self.store.analytics_table,
            self.store.clusters_table,
            self.store.replace_rpc.as_deref().unwrap_or("(none)"),
            self.store.fixture_path.as_deref().unwrap_or("(none)"),
            self.detection.time_window_ms,
            self.detection.new_wallet_threshold_days,
            self.detection.new_wallet_threshold_tx,
            self.detection.sliding_window_cutoff,
            self.detection.large_token_warning,
            rpc_urls,
            self.analyzer.signature_limit,
            self.analyzer.timeout_ms,
        )
    }
}

/// Mask sensitive parts of URLs
pub(crate) fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

fn mask_secret(secret: &str) -> String {
    match secret.len() {
        0 => "(not set)".to_string(),
        n if n <= 8 => "***".to_string(),
        _ => format!("{}***", secret.chars().take(4).collect::<String>()),
    }
}
