//! Cluster detection runs
//!
//! One run per token: fetch buys, fetch analytics for the wallets involved,
//! cluster, then replace the token's stored clusters. Runs for the same
//! token are serialized inside this process; runs for different tokens are
//! independent.

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cluster::clustering::{DetectionConfig, WalletClusterer};
use crate::cluster::types::{DetectionOutcome, WalletAnalytics};
use crate::error::{Error, Result};
use crate::store::ClusterDataStore;

/// Batch cluster detector bound to one store
pub struct ClusterDetector {
    store: Arc<dyn ClusterDataStore>,
    clusterer: WalletClusterer,
    /// Per-token run locks
    token_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ClusterDetector {
    pub fn new(store: Arc<dyn ClusterDataStore>, config: DetectionConfig) -> Self {
        Self {
            store,
            clusterer: WalletClusterer::new(config),
            token_locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ClusterDataStore> {
        &self.store
    }

    /// Detect and persist clusters for one token
    pub async fn detect(&self, token_id: &str) -> Result<DetectionOutcome> {
        if token_id.trim().is_empty() {
            return Err(Error::InvalidRequest("token_id is required".to_string()));
        }

        // Declared first so it drops after the lock handle, even if this
        // future is cancelled mid-run
        let _cleanup = LockEntryCleanup {
            locks: &self.token_locks,
            token_id,
        };
        let lock = self
            .token_locks
            .entry(token_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;
        self.run(token_id).await
    }

    async fn run(&self, token_id: &str) -> Result<DetectionOutcome> {
        let started = Instant::now();

        let transactions = self.store.buy_transactions(token_id).await?;
        if transactions.is_empty() {
            info!(token = %token_id, "No transactions found");
            return Ok(DetectionOutcome::NoTransactions);
        }

        let mut seen = HashSet::new();
        let wallets: Vec<String> = transactions
            .iter()
            .filter(|t| seen.insert(t.wallet_address.as_str()))
            .map(|t| t.wallet_address.clone())
            .collect();

        let analytics: HashMap<String, WalletAnalytics> = self
            .store
            .analytics_for(&wallets)
            .await?
            .into_iter()
            .map(|a| (a.wallet_address.clone(), a))
            .collect();

        debug!(
            token = %token_id,
            buys = %transactions.len(),
            wallets = %wallets.len(),
            with_analytics = %analytics.len(),
            "Inputs loaded"
        );

        let report = self.clusterer.cluster(token_id, &transactions, &analytics);

        self.store
            .replace_clusters(token_id, &report.clusters)
            .await?;

        info!(
            token = %token_id,
            clusters = %report.stats.total_clusters,
            largest = %report.stats.largest_cluster,
            new_wallets = %report.stats.new_wallets,
            links = %report.stats.links,
            elapsed_ms = %started.elapsed().as_millis(),
            "Wallet clusters detected"
        );

        Ok(DetectionOutcome::Detected(report.clusters))
    }
}

/// Removes a token's lock entry once nobody else holds or waits on it
struct LockEntryCleanup<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    token_id: &'a str,
}

impl Drop for LockEntryCleanup<'_> {
    fn drop(&mut self) {
        self.locks
            .remove_if(self.token_id, |_, l| Arc::strong_count(l) == 1);
    }
}
