//! Input and output records for cluster detection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label written to every cluster produced by the time-window detector
pub const DETECTION_METHOD: &str = "Time-based transaction clustering of new wallets";

/// Trade direction as stored in the transactions table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "buy",
            TransactionType::Sell => "sell",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single trade on a launchpad token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub wallet_address: String,
    pub token_id: String,
    pub created_at: DateTime<Utc>,
    pub token_amount: f64,
    pub transaction_type: TransactionType,
}

impl Transaction {
    /// Token amount signed by direction (buys add, sells subtract)
    pub fn signed_amount(&self) -> f64 {
        match self.transaction_type {
            TransactionType::Buy => self.token_amount,
            TransactionType::Sell => -self.token_amount,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.transaction_type == TransactionType::Buy
    }

    /// Creation time in unix milliseconds
    pub fn timestamp_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }
}

/// Age and activity snapshot for one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletAnalytics {
    pub wallet_address: String,
    pub age_days: u32,
    pub transaction_count: u32,
    /// Tier index as last computed by the analyzer; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<u8>,
}

impl WalletAnalytics {
    pub fn new(wallet_address: impl Into<String>, age_days: u32, transaction_count: u32) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            age_days,
            transaction_count,
            tier: None,
        }
    }
}

/// A group of new wallets linked by shared-window buying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: String,
    /// Members ordered by their first buy
    pub wallet_addresses: Vec<String>,
    pub token_id: String,
    pub total_holdings: i64,
    /// Manipulation risk in [0, 1], two decimals
    pub risk_score: f64,
    pub detection_method: String,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.wallet_addresses.len()
    }
}

/// Result of one detection run
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// The token has no buy transactions; the cluster store was not touched
    NoTransactions,
    /// Clusters computed and persisted (possibly none)
    Detected(Vec<Cluster>),
}

impl DetectionOutcome {
    pub fn clusters(&self) -> &[Cluster] {
        match self {
            DetectionOutcome::NoTransactions => &[],
            DetectionOutcome::Detected(clusters) => clusters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_deserialize_postgrest_row() {
        let json = r#"{
            "id": "5b0c9a1e",
            "wallet_address": "wallet1",
            "token_id": "token1",
            "created_at": "2025-03-01T12:00:05.250+00:00",
            "token_amount": 1500.5,
            "transaction_type": "buy"
        }"#;

        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert!(tx.is_buy());
        assert_eq!(tx.token_amount, 1500.5);
        assert_eq!(tx.timestamp_ms() % 1000, 250);
    }

    #[test]
    fn test_signed_amount() {
        let mut tx = Transaction {
            wallet_address: "w".into(),
            token_id: "t".into(),
            created_at: Utc::now(),
            token_amount: 10.0,
            transaction_type: TransactionType::Buy,
        };
        assert_eq!(tx.signed_amount(), 10.0);

        tx.transaction_type = TransactionType::Sell;
        assert_eq!(tx.signed_amount(), -10.0);
    }

    #[test]
    fn test_analytics_tier_optional() {
        let a: WalletAnalytics =
            serde_json::from_str(r#"{"wallet_address":"w","age_days":3,"transaction_count":7}"#)
                .unwrap();
        assert_eq!(a.tier, None);

        let out = serde_json::to_value(&a).unwrap();
        assert!(out.get("tier").is_none());
    }
}
