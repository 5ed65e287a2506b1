//! In-memory store
//!
//! Backs the CLI's offline mode and the test suite. Cluster replacement
//! happens under a single write lock, so readers never observe a token
//! with half its clusters replaced.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::cluster::types::{Cluster, Transaction, WalletAnalytics};
use crate::error::{Error, Result};
use crate::store::{ClusterStore, TransactionStore, WalletAnalyticsStore};

/// Fixture file layout
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub wallet_analytics: Vec<WalletAnalytics>,
    #[serde(default)]
    pub wallet_clusters: Vec<Cluster>,
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    transactions: RwLock<Vec<Transaction>>,
    analytics: DashMap<String, WalletAnalytics>,
    /// token_id -> clusters
    clusters: RwLock<HashMap<String, Vec<Cluster>>>,
    /// Number of cluster-table writes, for observing side effects
    cluster_writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-parsed fixture data
    pub fn from_parts(fixture: Fixture) -> Self {
        let mut by_token: HashMap<String, Vec<Cluster>> = HashMap::new();
        for cluster in fixture.wallet_clusters {
            by_token.entry(cluster.token_id.clone()).or_default().push(cluster);
        }

        let store = Self {
            transactions: RwLock::new(fixture.transactions),
            clusters: RwLock::new(by_token),
            ..Self::default()
        };
        store.insert_analytics(fixture.wallet_analytics);
        store
    }

    /// Load a JSON fixture file
    pub async fn from_fixture<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Io(format!("Cannot read fixture {}: {}", path.display(), e)))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .map_err(|e| Error::Deserialization(format!("Invalid fixture {}: {}", path.display(), e)))?;

        debug!(
            transactions = %fixture.transactions.len(),
            analytics = %fixture.wallet_analytics.len(),
            "Fixture loaded"
        );

        Ok(Self::from_parts(fixture))
    }

    pub async fn insert_transactions(&self, txs: impl IntoIterator<Item = Transaction>) {
        self.transactions.write().await.extend(txs);
    }

    pub fn insert_analytics(&self, records: impl IntoIterator<Item = WalletAnalytics>) {
        for record in records {
            self.analytics.insert(record.wallet_address.clone(), record);
        }
    }

    pub fn cluster_writes(&self) -> u64 {
        self.cluster_writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn buy_transactions(&self, token_id: &str) -> Result<Vec<Transaction>> {
        let mut buys: Vec<Transaction> = self
            .transactions
            .read()
            .await
            .iter()
            .filter(|t| t.token_id == token_id && t.is_buy())
            .cloned()
            .collect();
        buys.sort_by_key(|t| t.created_at);
        Ok(buys)
    }
}

#[async_trait]
impl WalletAnalyticsStore for MemoryStore {
    async fn analytics_for(&self, wallets: &[String]) -> Result<Vec<WalletAnalytics>> {
        Ok(wallets
            .iter()
            .filter_map(|w| self.analytics.get(w).map(|a| a.clone()))
            .collect())
    }

    async fn upsert_analytics(&self, records: &[WalletAnalytics]) -> Result<()> {
        self.insert_analytics(records.iter().cloned());
        Ok(())
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    async fn replace_clusters(&self, token_id: &str, clusters: &[Cluster]) -> Result<()> {
        let mut table = self.clusters.write().await;
        if clusters.is_empty() {
            table.remove(token_id);
        } else {
            table.insert(token_id.to_string(), clusters.to_vec());
        }
        self.cluster_writes.fetch_add(1, Ordering::Relaxed);

        debug!(token = %token_id, clusters = %clusters.len(), "Clusters replaced");
        Ok(())
    }

    async fn clusters_for(&self, token_id: &str) -> Result<Vec<Cluster>> {
        Ok(self
            .clusters
            .read()
            .await
            .get(token_id)
            .cloned()
            .unwrap_or_default())
    }
}
