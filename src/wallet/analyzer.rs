//! On-chain wallet analyzer
//!
//! Derives the age/activity snapshot the cluster detector consumes from a
//! wallet's signature history. Endpoints are tried in order until one
//! answers.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cluster::types::WalletAnalytics;
use crate::config::mask_url;
use crate::error::{Error, Result};
use crate::wallet::tiers::tier_for;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Configuration for the wallet analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// JSON-RPC endpoints, tried in order
    #[serde(default = "default_rpc_urls")]
    pub rpc_urls: Vec<String>,

    /// Max signatures fetched per wallet
    #[serde(default = "default_signature_limit")]
    pub signature_limit: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_rpc_urls() -> Vec<String> {
    vec![
        "https://api.mainnet-beta.solana.com".to_string(),
        "https://rpc.ankr.com/solana".to_string(),
    ]
}
fn default_signature_limit() -> u32 {
    1000
}
fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            rpc_urls: default_rpc_urls(),
            signature_limit: default_signature_limit(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// One entry of `getSignaturesForAddress`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub block_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Wallet analyzer over Solana JSON-RPC
pub struct WalletAnalyzer {
    client: Client,
    config: AnalyzerConfig,
}

impl WalletAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Compute analytics for a wallet as of now
    pub async fn analyze(&self, wallet: &str) -> Result<WalletAnalytics> {
        validate_address(wallet)?;

        let signatures = self.fetch_signatures(wallet).await?;
        let analytics = analytics_from_signatures(wallet, &signatures, Utc::now());

        info!(
            wallet = %wallet,
            age_days = %analytics.age_days,
            tx_count = %analytics.transaction_count,
            tier = ?analytics.tier,
            "Wallet analyzed"
        );

        Ok(analytics)
    }

    /// Signature history, newest first
    pub async fn fetch_signatures(&self, wallet: &str) -> Result<Vec<SignatureInfo>> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getSignaturesForAddress",
            "params": [wallet, { "limit": self.config.signature_limit }]
        });

        let mut last_error = String::from("no RPC endpoints configured");

        for (i, url) in self.config.rpc_urls.iter().enumerate() {
            debug!(
                endpoint = %(i + 1),
                total = %self.config.rpc_urls.len(),
                "Fetching signatures"
            );

            match self.call(url, &request).await {
                Ok(signatures) => return Ok(signatures),
                Err(e) => {
                    warn!(endpoint = %mask_url(url), error = %e, "RPC endpoint failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(Error::Rpc(format!("All RPC endpoints failed: {}", last_error)))
    }

    async fn call(&self, url: &str, request: &serde_json::Value) -> Result<Vec<SignatureInfo>> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::HttpTimeout(self.config.timeout_ms)
                } else {
                    Error::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rpc(format!("HTTP {}: {}", status, body)));
        }

        let rpc: RpcResponse<Vec<SignatureInfo>> = response.json().await?;
        if let Some(error) = rpc.error {
            return Err(Error::Rpc(format!("{} ({})", error.message, error.code)));
        }

        Ok(rpc.result.unwrap_or_default())
    }
}

/// Build analytics from a newest-first signature list
pub fn analytics_from_signatures(
    wallet: &str,
    signatures: &[SignatureInfo],
    now: DateTime<Utc>,
) -> WalletAnalytics {
    let transaction_count = signatures.len() as u32;
    let age_days = signatures
        .last()
        .and_then(|s| s.block_time)
        .map(|block_time| ((now.timestamp() - block_time) / SECONDS_PER_DAY).max(0) as u32)
        .unwrap_or(0);

    WalletAnalytics {
        wallet_address: wallet.to_string(),
        age_days,
        transaction_count,
        tier: Some(tier_for(age_days, transaction_count).tier),
    }
}

/// Reject anything that is not a base58 32-byte public key
pub fn validate_address(wallet: &str) -> Result<()> {
    let bytes = bs58::decode(wallet)
        .into_vec()
        .map_err(|e| Error::InvalidWallet(format!("{}: {}", wallet, e)))?;
    if bytes.len() != 32 {
        return Err(Error::InvalidWallet(format!(
            "{}: expected 32 bytes, got {}",
            wallet,
            bytes.len()
        )));
    }
    Ok(())
}
