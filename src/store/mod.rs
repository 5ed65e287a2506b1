//! Storage collaborators for cluster detection
//!
//! The detector reads buy transactions and wallet analytics, and owns the
//! cluster table for each token it analyzes. Two backends implement the
//! same traits:
//! - `MemoryStore`: process-local, seedable from a JSON fixture
//! - `PostgrestStore`: the hosted database's REST interface

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::cluster::types::{Cluster, Transaction, WalletAnalytics};
use crate::error::{Error, Result};

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

/// Read access to trades
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// All buy transactions for a token, oldest first
    async fn buy_transactions(&self, token_id: &str) -> Result<Vec<Transaction>>;

    /// Cheap reachability check
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Read/write access to wallet age and activity snapshots
#[async_trait]
pub trait WalletAnalyticsStore: Send + Sync {
    /// Analytics for the given wallets; unknown wallets are simply absent
    async fn analytics_for(&self, wallets: &[String]) -> Result<Vec<WalletAnalytics>>;

    /// Insert or overwrite analytics keyed by wallet address
    async fn upsert_analytics(&self, records: &[WalletAnalytics]) -> Result<()>;
}

/// The per-token cluster table
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Supersede every cluster stored for `token_id` with `clusters`
    async fn replace_clusters(&self, token_id: &str, clusters: &[Cluster]) -> Result<()>;

    async fn clusters_for(&self, token_id: &str) -> Result<Vec<Cluster>>;
}

/// Everything the detector needs from one backend
pub trait ClusterDataStore: TransactionStore + WalletAnalyticsStore + ClusterStore {}

impl<T> ClusterDataStore for T where T: TransactionStore + WalletAnalyticsStore + ClusterStore {}

/// Which backend to use
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Supabase,
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// Project URL, e.g. https://xyz.supabase.co
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub service_role_key: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_transactions_table")]
    pub transactions_table: String,
    #[serde(default = "default_analytics_table")]
    pub analytics_table: String,
    #[serde(default = "default_clusters_table")]
    pub clusters_table: String,
    /// Rows requested per page when reading transactions
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Database function that replaces a token's clusters in one transaction
    #[serde(default)]
    pub replace_rpc: Option<String>,
    /// JSON fixture to seed the memory backend
    #[serde(default)]
    pub fixture_path: Option<String>,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_page_size() -> usize {
    1000
}
fn default_transactions_table() -> String {
    "transactions".to_string()
}
fn default_analytics_table() -> String {
    "wallet_analytics".to_string()
}
fn default_clusters_table() -> String {
    "wallet_clusters".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: String::new(),
            service_role_key: String::new(),
            timeout_ms: default_timeout_ms(),
            transactions_table: default_transactions_table(),
            analytics_table: default_analytics_table(),
            clusters_table: default_clusters_table(),
            page_size: default_page_size(),
            replace_rpc: None,
            fixture_path: None,
        }
    }
}

/// Build the configured backend
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn ClusterDataStore>> {
    match config.backend {
        StoreBackend::Memory => {
            let store = match &config.fixture_path {
                Some(path) => {
                    info!(path = %path, "Seeding memory store from fixture");
                    MemoryStore::from_fixture(path).await?
                }
                None => MemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
        StoreBackend::Supabase => {
            if config.url.is_empty() || config.service_role_key.is_empty() {
                return Err(Error::Config(
                    "supabase backend requires store.url and store.service_role_key".to_string(),
                ));
            }
            info!(url = %config.url, "Using PostgREST store");
            Ok(Arc::new(PostgrestStore::new(config.clone())?))
        }
    }
}
