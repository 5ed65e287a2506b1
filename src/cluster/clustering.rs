//! Wallet Clustering - Group new wallets by shared buy timing
//!
//! Two wallets are linked when both are "new" (young or barely used) and
//! each bought the token within the configured window of the other.
//! Links are transitive: clusters are the connected components of the
//! co-activity graph, found with petgraph's union-find.

use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::cluster::scoring::{ClusterMetrics, RiskRubric};
use crate::cluster::types::{Cluster, Transaction, WalletAnalytics, DETECTION_METHOD};

/// Configuration for time-window clustering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Maximum gap between two buys for their wallets to be linked
    #[serde(default = "default_time_window_ms")]
    pub time_window_ms: i64,

    /// Wallets younger than this are new
    #[serde(default = "default_new_wallet_threshold_days")]
    pub new_wallet_threshold_days: u32,

    /// Wallets with fewer prior transactions than this are new
    #[serde(default = "default_new_wallet_threshold_tx")]
    pub new_wallet_threshold_tx: u32,

    /// Stop scanning later buys once the gap exceeds the window
    #[serde(default = "default_sliding_window_cutoff")]
    pub sliding_window_cutoff: bool,

    /// Warn when a token has more qualifying buys than this
    #[serde(default = "default_large_token_warning")]
    pub large_token_warning: usize,
}

fn default_time_window_ms() -> i64 {
    5 * 60 * 1000
}
fn default_new_wallet_threshold_days() -> u32 {
    30
}
fn default_new_wallet_threshold_tx() -> u32 {
    30
}
fn default_sliding_window_cutoff() -> bool {
    true
}
fn default_large_token_warning() -> usize {
    5000
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            time_window_ms: default_time_window_ms(),
            new_wallet_threshold_days: default_new_wallet_threshold_days(),
            new_wallet_threshold_tx: default_new_wallet_threshold_tx(),
            sliding_window_cutoff: default_sliding_window_cutoff(),
            large_token_warning: default_large_token_warning(),
        }
    }
}

impl DetectionConfig {
    /// A wallet is new if it is young OR has little history
    pub fn is_new_wallet(&self, analytics: &WalletAnalytics) -> bool {
        analytics.age_days < self.new_wallet_threshold_days
            || analytics.transaction_count < self.new_wallet_threshold_tx
    }
}

/// Counters from one clustering pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusteringStats {
    pub buy_count: usize,
    pub qualifying_buys: usize,
    pub new_wallets: usize,
    pub links: usize,
    pub pairs_compared: usize,
    pub total_clusters: usize,
    pub largest_cluster: usize,
}

/// Clusters plus the counters that produced them
#[derive(Debug, Clone)]
pub struct ClusteringReport {
    pub clusters: Vec<Cluster>,
    pub stats: ClusteringStats,
}

/// Time-window wallet clusterer
pub struct WalletClusterer {
    config: DetectionConfig,
    rubric: RiskRubric,
}

impl WalletClusterer {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            config,
            rubric: RiskRubric::default(),
        }
    }

    /// Cluster one token's transactions.
    ///
    /// `analytics` must be keyed by wallet address. Wallets missing from it
    /// never join a cluster.
    pub fn cluster(
        &self,
        token_id: &str,
        transactions: &[Transaction],
        analytics: &HashMap<String, WalletAnalytics>,
    ) -> ClusteringReport {
        let mut stats = ClusteringStats::default();

        let mut buys: Vec<&Transaction> = transactions.iter().filter(|t| t.is_buy()).collect();
        // Stable, so equal timestamps keep store order
        buys.sort_by_key(|t| t.created_at);
        stats.buy_count = buys.len();

        // Dense index per new wallet, in order of first buy
        let mut wallet_index: HashMap<&str, usize> = HashMap::new();
        let mut wallets: Vec<&str> = Vec::new();
        let mut nodes: Vec<(i64, usize)> = Vec::new();

        for &tx in &buys {
            let Some(a) = analytics.get(&tx.wallet_address) else {
                continue;
            };
            if !self.config.is_new_wallet(a) {
                continue;
            }
            let idx = *wallet_index.entry(tx.wallet_address.as_str()).or_insert_with(|| {
                wallets.push(tx.wallet_address.as_str());
                wallets.len() - 1
            });
            nodes.push((tx.timestamp_ms(), idx));
        }

        stats.qualifying_buys = nodes.len();
        stats.new_wallets = wallets.len();

        if nodes.len() > self.config.large_token_warning {
            warn!(
                token = %token_id,
                buys = %nodes.len(),
                threshold = %self.config.large_token_warning,
                "Qualifying buy count is large; pair scan is quadratic"
            );
        }

        let mut forest = UnionFind::<usize>::new(wallets.len());
        for i in 0..nodes.len() {
            let (t1, w1) = nodes[i];
            for &(t2, w2) in &nodes[i + 1..] {
                if self.config.sliding_window_cutoff && t2 - t1 > self.config.time_window_ms {
                    break;
                }
                stats.pairs_compared += 1;
                if w1 == w2 {
                    continue;
                }
                if (t1 - t2).abs() <= self.config.time_window_ms && forest.union(w1, w2) {
                    stats.links += 1;
                }
            }
        }

        // Components in order of their earliest member
        let labels = forest.into_labeling();
        let mut component_slot: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<Vec<&str>> = Vec::new();
        for (&wallet, &root) in wallets.iter().zip(&labels) {
            let slot = *component_slot.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(wallet);
        }

        let clusters: Vec<Cluster> = components
            .into_iter()
            .filter(|members| members.len() >= 2)
            .enumerate()
            .map(|(n, members)| {
                self.build_cluster(format!("cluster_{}", n), token_id, members, transactions, analytics)
            })
            .collect();

        stats.total_clusters = clusters.len();
        stats.largest_cluster = clusters.iter().map(|c| c.size()).max().unwrap_or(0);

        ClusteringReport { clusters, stats }
    }

    fn build_cluster(
        &self,
        cluster_id: String,
        token_id: &str,
        members: Vec<&str>,
        transactions: &[Transaction],
        analytics: &HashMap<String, WalletAnalytics>,
    ) -> Cluster {
        let member_set: HashSet<&str> = members.iter().copied().collect();
        let member_txs: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| member_set.contains(t.wallet_address.as_str()))
            .collect();

        let total_holdings: f64 = member_txs.iter().map(|t| t.signed_amount()).sum();

        let (first, last) = member_txs
            .iter()
            .filter(|t| t.is_buy())
            .map(|t| t.timestamp_ms())
            .fold((i64::MAX, i64::MIN), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));
        let time_spread_ms = if first <= last { last - first } else { 0 };

        let size = members.len();
        let (age_sum, tx_sum) = members.iter().fold((0u64, 0u64), |(age, tx), w| {
            analytics
                .get(*w)
                .map(|a| (age + a.age_days as u64, tx + a.transaction_count as u64))
                .unwrap_or((age, tx))
        });

        let metrics = ClusterMetrics {
            size,
            avg_age_days: age_sum as f64 / size as f64,
            avg_tx_count: tx_sum as f64 / size as f64,
            time_spread_ms,
        };
        let breakdown = self.rubric.score(&metrics);

        debug!(
            token = %token_id,
            cluster = %cluster_id,
            size = %size,
            avg_age = %format!("{:.1}", metrics.avg_age_days),
            avg_tx = %format!("{:.1}", metrics.avg_tx_count),
            spread_ms = %time_spread_ms,
            risk = %breakdown.total,
            "Cluster scored"
        );

        Cluster {
            cluster_id,
            wallet_addresses: members.into_iter().map(str::to_string).collect(),
            token_id: token_id.to_string(),
            total_holdings: total_holdings.round() as i64,
            risk_score: breakdown.total,
            detection_method: DETECTION_METHOD.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::types::TransactionType;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn buy(wallet: &str, secs: i64, amount: f64) -> Transaction {
        Transaction {
            wallet_address: wallet.to_string(),
            token_id: "token1".to_string(),
            created_at: t0() + Duration::seconds(secs),
            token_amount: amount,
            transaction_type: TransactionType::Buy,
        }
    }

    fn analytics(entries: &[(&str, u32, u32)]) -> HashMap<String, WalletAnalytics> {
        entries
            .iter()
            .map(|(w, age, tx)| (w.to_string(), WalletAnalytics::new(*w, *age, *tx)))
            .collect()
    }

    fn clusterer() -> WalletClusterer {
        WalletClusterer::new(DetectionConfig::default())
    }

    #[test]
    fn test_new_wallet_classification() {
        let config = DetectionConfig::default();
        assert!(config.is_new_wallet(&WalletAnalytics::new("w", 2, 500)));
        assert!(config.is_new_wallet(&WalletAnalytics::new("w", 500, 2)));
        assert!(config.is_new_wallet(&WalletAnalytics::new("w", 29, 29)));
        assert!(!config.is_new_wallet(&WalletAnalytics::new("w", 30, 30)));
    }

    #[test]
    fn test_simple_pair() {
        let txs = vec![buy("a", 0, 100.0), buy("b", 10, 250.0)];
        let report = clusterer().cluster("token1", &txs, &analytics(&[("a", 2, 1), ("b", 2, 1)]));

        assert_eq!(report.clusters.len(), 1);
        let cluster = &report.clusters[0];
        assert_eq!(cluster.cluster_id, "cluster_0");
        assert_eq!(cluster.wallet_addresses, vec!["a", "b"]);
        assert_eq!(cluster.total_holdings, 350);
        assert_eq!(cluster.risk_score, 0.8);
        assert_eq!(cluster.detection_method, DETECTION_METHOD);
    }

    #[test]
    fn test_transitive_merge() {
        // a-b 4 min apart, b-c 4 min apart, a-c 8 min apart
        let txs = vec![buy("a", 0, 1.0), buy("b", 240, 1.0), buy("c", 480, 1.0)];
        let report = clusterer().cluster(
            "token1",
            &txs,
            &analytics(&[("a", 1, 1), ("b", 1, 1), ("c", 1, 1)]),
        );

        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].size(), 3);
        // 0.15 size + 0.30 age + 0.20 activity, spread 480s adds nothing
        assert_eq!(report.clusters[0].risk_score, 0.65);
    }

    #[test]
    fn test_bridge_merges_existing_clusters() {
        // Two separate pairs, then a wallet that links both
        let txs = vec![
            buy("a", 0, 1.0),
            buy("b", 30, 1.0),
            buy("bridge", 290, 1.0),
            buy("c", 580, 1.0),
            buy("d", 590, 1.0),
        ];
        let report = clusterer().cluster(
            "token1",
            &txs,
            &analytics(&[("a", 1, 1), ("b", 1, 1), ("bridge", 1, 1), ("c", 1, 1), ("d", 1, 1)]),
        );

        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].size(), 5);
    }

    #[test]
    fn test_components_grouped_by_first_buy_not_index_order() {
        // a links to b only through its second buy; p-q form their own pair in between
        let txs = vec![
            buy("a", 0, 1.0),
            buy("p", 500, 1.0),
            buy("q", 510, 1.0),
            buy("a", 990, 1.0),
            buy("b", 1000, 1.0),
        ];
        let report = clusterer().cluster(
            "token1",
            &txs,
            &analytics(&[("a", 1, 1), ("p", 1, 1), ("q", 1, 1), ("b", 1, 1)]),
        );

        assert_eq!(report.stats.links, 2);
        assert_eq!(report.clusters.len(), 2);
        assert_eq!(report.clusters[0].cluster_id, "cluster_0");
        assert_eq!(report.clusters[0].wallet_addresses, vec!["a", "b"]);
        assert_eq!(report.clusters[1].wallet_addresses, vec!["p", "q"]);
    }

    #[test]
    fn test_old_wallet_excluded() {
        let txs = vec![buy("old", 0, 1.0), buy("fresh", 0, 1.0)];
        let report = clusterer().cluster(
            "token1",
            &txs,
            &analytics(&[("old", 500, 500), ("fresh", 1, 1)]),
        );
        assert!(report.clusters.is_empty());
        assert_eq!(report.stats.new_wallets, 1);
    }

    #[test]
    fn test_wallet_without_analytics_skipped() {
        let txs = vec![buy("a", 0, 1.0), buy("unknown", 1, 1.0)];
        let report = clusterer().cluster("token1", &txs, &analytics(&[("a", 1, 1)]));
        assert!(report.clusters.is_empty());
    }

    #[test]
    fn test_repeat_buys_by_one_wallet_are_not_a_cluster() {
        let txs = vec![buy("a", 0, 1.0), buy("a", 5, 1.0), buy("a", 10, 1.0)];
        let report = clusterer().cluster("token1", &txs, &analytics(&[("a", 1, 1)]));
        assert!(report.clusters.is_empty());
        assert_eq!(report.stats.links, 0);
    }

    #[test]
    fn test_window_is_inclusive() {
        let txs = vec![buy("a", 0, 1.0), buy("b", 300, 1.0)];
        let report = clusterer().cluster("token1", &txs, &analytics(&[("a", 1, 1), ("b", 1, 1)]));
        assert_eq!(report.clusters.len(), 1);

        let txs = vec![buy("a", 0, 1.0), buy("b", 301, 1.0)];
        let report = clusterer().cluster("token1", &txs, &analytics(&[("a", 1, 1), ("b", 1, 1)]));
        assert!(report.clusters.is_empty());
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let txs = vec![buy("c", 900, 1.0), buy("b", 10, 1.0), buy("a", 0, 1.0)];
        let report = clusterer().cluster(
            "token1",
            &txs,
            &analytics(&[("a", 1, 1), ("b", 1, 1), ("c", 1, 1)]),
        );
        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].wallet_addresses, vec!["a", "b"]);
    }

    #[test]
    fn test_spread_uses_every_member_buy() {
        // a-b linked at 0/10s, but a buys again at 200s
        let txs = vec![buy("a", 0, 1.0), buy("b", 10, 1.0), buy("a", 200, 1.0)];
        let report = clusterer().cluster("token1", &txs, &analytics(&[("a", 2, 1), ("b", 2, 1)]));
        // 0.30 + 0.20 + 0.15 (spread 200s)
        assert_eq!(report.clusters[0].risk_score, 0.65);
        assert_eq!(report.clusters[0].total_holdings, 3);
    }

    #[test]
    fn test_sells_subtract_from_holdings() {
        let mut sell = buy("b", 20, 40.0);
        sell.transaction_type = TransactionType::Sell;
        let txs = vec![buy("a", 0, 100.0), buy("b", 10, 100.0), sell];
        let report = clusterer().cluster("token1", &txs, &analytics(&[("a", 2, 1), ("b", 2, 1)]));
        assert_eq!(report.clusters[0].total_holdings, 160);
    }

    #[test]
    fn test_cutoff_does_not_change_result() {
        let txs: Vec<Transaction> = (0..40)
            .map(|i| buy(&format!("w{}", i % 13), i * 97, 1.0))
            .collect();
        let entries: Vec<(String, u32, u32)> =
            (0..13).map(|i| (format!("w{}", i), i as u32 * 3, 5)).collect();
        let map: HashMap<String, WalletAnalytics> = entries
            .iter()
            .map(|(w, a, t)| (w.clone(), WalletAnalytics::new(w.clone(), *a, *t)))
            .collect();

        let fast = clusterer().cluster("token1", &txs, &map);
        let full = WalletClusterer::new(DetectionConfig {
            sliding_window_cutoff: false,
            ..DetectionConfig::default()
        })
        .cluster("token1", &txs, &map);

        assert_eq!(fast.clusters, full.clusters);
        assert!(fast.stats.pairs_compared < full.stats.pairs_compared);
    }

    #[test]
    fn test_separate_groups_get_sequential_ids() {
        let txs = vec![
            buy("a", 0, 1.0),
            buy("b", 5, 1.0),
            buy("c", 3600, 1.0),
            buy("d", 3605, 1.0),
            buy("e", 3610, 1.0),
        ];
        let report = clusterer().cluster(
            "token1",
            &txs,
            &analytics(&[("a", 1, 1), ("b", 1, 1), ("c", 1, 1), ("d", 1, 1), ("e", 1, 1)]),
        );

        assert_eq!(report.clusters.len(), 2);
        assert_eq!(report.clusters[0].cluster_id, "cluster_0");
        assert_eq!(report.clusters[0].wallet_addresses, vec!["a", "b"]);
        assert_eq!(report.clusters[1].cluster_id, "cluster_1");
        assert_eq!(report.clusters[1].size(), 3);
        assert_eq!(report.stats.largest_cluster, 3);
    }

    #[test]
    fn test_scores_always_in_range() {
        let txs: Vec<Transaction> = (0..60).map(|i| buy(&format!("w{}", i), i, 1.0)).collect();
        let entries: Vec<(String, u32, u32)> =
            (0..60).map(|i| (format!("w{}", i), 0, 0)).collect();
        let map: HashMap<String, WalletAnalytics> = entries
            .iter()
            .map(|(w, a, t)| (w.clone(), WalletAnalytics::new(w.clone(), *a, *t)))
            .collect();

        let report = clusterer().cluster("token1", &txs, &map);
        for cluster in &report.clusters {
            assert!(cluster.size() >= 2);
            assert!((0.0..=1.0).contains(&cluster.risk_score));
            assert_eq!((cluster.risk_score * 100.0).round() / 100.0, cluster.risk_score);
        }
        assert_eq!(report.clusters[0].risk_score, 1.0);
    }
}
