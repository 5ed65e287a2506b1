//! CLI command implementations

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::cluster::types::{Cluster, DetectionOutcome, WalletAnalytics};
use crate::cluster::ClusterDetector;
use crate::config::Config;
use crate::server;
use crate::store::{open_store, ClusterDataStore};
use crate::wallet::tiers::{tier_by_index, tier_for};
use crate::wallet::WalletAnalyzer;

async fn detector(config: &Config) -> Result<ClusterDetector> {
    let store = open_store(&config.store)
        .await
        .context("Failed to open store")?;
    Ok(ClusterDetector::new(store, config.detection.clone()))
}

/// Run the HTTP service
pub async fn serve(config: &Config, port: Option<u16>) -> Result<()> {
    let mut server_config = config.server.clone();
    if let Some(port) = port {
        server_config.port = port;
    }

    info!(
        backend = ?config.store.backend,
        window_ms = config.detection.time_window_ms,
        "Starting cluster detection service"
    );

    let detector = Arc::new(detector(config).await?);
    server::serve(&server_config, detector).await?;
    Ok(())
}

/// Run detection once and print the result
pub async fn detect(config: &Config, token_id: &str, json: bool) -> Result<()> {
    let detector = detector(config).await?;
    let started = Instant::now();
    let outcome = detector.detect(token_id).await?;
    let elapsed_ms = started.elapsed().as_millis();

    match outcome {
        DetectionOutcome::NoTransactions => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "clusters": [], "message": "No transactions found" })
                );
            } else {
                println!("No transactions found for {}", token_id);
            }
        }
        DetectionOutcome::Detected(clusters) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&clusters)?);
            } else {
                let analytics = member_analytics(detector.store(), &clusters).await?;
                print!("{}", format_report(token_id, &clusters, &analytics));
                println!("\nCompleted in {}ms", elapsed_ms);
            }
        }
    }

    Ok(())
}

/// Print persisted clusters for a token
pub async fn show(config: &Config, token_id: &str) -> Result<()> {
    let store = open_store(&config.store).await?;
    let clusters = store.clusters_for(token_id).await?;
    let analytics = member_analytics(&store, &clusters).await?;
    print!("{}", format_report(token_id, &clusters, &analytics));
    Ok(())
}

/// Compute wallet analytics on-chain, optionally saving them
pub async fn analyze_wallet(
    config: &Config,
    address: &str,
    total_supply: f64,
    save: bool,
) -> Result<()> {
    let analyzer = WalletAnalyzer::new(config.analyzer.clone())?;
    let analytics = analyzer.analyze(address).await?;
    print!(
        "{}",
        format_wallet_analysis(
            &analytics,
            config.detection.is_new_wallet(&analytics),
            total_supply
        )
    );

    if save {
        let store = open_store(&config.store).await?;
        store
            .upsert_analytics(std::slice::from_ref(&analytics))
            .await
            .context("Failed to save wallet analytics")?;
        println!("\nSaved to {}", config.store.analytics_table);
    }

    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check store reachability
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    print!("Store ({:?})... ", config.store.backend);
    let result = async {
        let store = open_store(&config.store).await?;
        let start = Instant::now();
        store.ping().await?;
        Ok::<u128, crate::Error>(start.elapsed().as_millis())
    }
    .await;

    match result {
        Ok(latency) => {
            println!("OK ({}ms)", latency);
            println!("\nAll systems healthy!");
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            anyhow::bail!("Store is unreachable")
        }
    }
}

async fn member_analytics(
    store: &Arc<dyn ClusterDataStore>,
    clusters: &[Cluster],
) -> Result<HashMap<String, WalletAnalytics>> {
    let wallets: Vec<String> = clusters
        .iter()
        .flat_map(|c| c.wallet_addresses.iter().cloned())
        .collect();
    if wallets.is_empty() {
        return Ok(HashMap::new());
    }

    match store.analytics_for(&wallets).await {
        Ok(records) => Ok(records
            .into_iter()
            .map(|a| (a.wallet_address.clone(), a))
            .collect()),
        Err(e) => {
            warn!(error = %e, "Could not load member analytics for report");
            Ok(HashMap::new())
        }
    }
}

fn tier_label(analytics: Option<&WalletAnalytics>) -> String {
    match analytics {
        Some(a) => a
            .tier
            .and_then(tier_by_index)
            .unwrap_or_else(|| tier_for(a.age_days, a.transaction_count))
            .name
            .to_string(),
        None => "?".to_string(),
    }
}

fn format_wallet_analysis(analytics: &WalletAnalytics, is_new: bool, total_supply: f64) -> String {
    let tier = tier_for(analytics.age_days, analytics.transaction_count);
    let mut out = String::new();
    let _ = writeln!(out, "\n=== WALLET ANALYSIS ===\n");
    let _ = writeln!(out, "Address:      {}", analytics.wallet_address);
    let _ = writeln!(out, "Age:          {} days", analytics.age_days);
    let _ = writeln!(out, "Transactions: {}", analytics.transaction_count);
    let _ = writeln!(out, "Tier:         {}", tier);
    let _ = writeln!(
        out,
        "Max Buy:      {}% of supply ({:.0} of {:.0} tokens)",
        tier.max_buy_percent,
        tier.max_buy_amount(total_supply),
        total_supply
    );
    let _ = writeln!(out, "New Wallet:   {}", if is_new { "yes" } else { "no" });
    out
}

/// Render clusters as a plain-text report
fn format_report(
    token_id: &str,
    clusters: &[Cluster],
    analytics: &HashMap<String, WalletAnalytics>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== WALLET CLUSTERS: {} ===\n", token_id);

    if clusters.is_empty() {
        let _ = writeln!(out, "No clusters detected.");
        return out;
    }

    for cluster in clusters {
        let _ = writeln!(
            out,
            "{}  wallets={}  holdings={}  risk={:.2}",
            cluster.cluster_id,
            cluster.size(),
            cluster.total_holdings,
            cluster.risk_score
        );
        for wallet in &cluster.wallet_addresses {
            let record = analytics.get(wallet);
            let detail = record
                .map(|a| format!("{}d, {} txs", a.age_days, a.transaction_count))
                .unwrap_or_else(|| "no analytics".to_string());
            let _ = writeln!(out, "    {:<44}  {:<8}  {}", wallet, tier_label(record), detail);
        }
    }

    let _ = writeln!(out, "\n{} cluster(s)", clusters.len());
    out
}
