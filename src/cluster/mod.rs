//! Wallet Cluster Detection Module
//!
//! This module finds coordinated buying on a single token:
//! - New-wallet classification from age/activity snapshots
//! - Time-window co-activity graph with transitive merging
//! - Additive risk rubric per cluster
//! - Replace-all persistence per token

pub mod clustering;
pub mod detector;
pub mod scoring;
pub mod types;

pub use clustering::{ClusteringReport, ClusteringStats, DetectionConfig, WalletClusterer};
pub use detector::ClusterDetector;
pub use scoring::{ClusterMetrics, RiskBreakdown, RiskRubric};
pub use types::{Cluster, DetectionOutcome, Transaction, TransactionType, WalletAnalytics};
