//! Wallet cluster detector
//!
//! Flags groups of new wallets that bought the same token within a short
//! window of each other.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use wallet_cluster_detector::cli::commands;
use wallet_cluster_detector::config::Config;

/// Wallet cluster detector
#[derive(Parser)]
#[command(name = "clusters")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "clusters.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP detection service
    Serve {
        /// Override the configured port
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Detect clusters for a token once
    Detect {
        /// Token identifier
        token_id: String,

        /// Print clusters as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show persisted clusters for a token
    Show {
        /// Token identifier
        token_id: String,
    },

    /// Compute age/activity analytics for a wallet from chain history
    AnalyzeWallet {
        /// Wallet address (base58)
        address: String,

        /// Token total supply used to size the tier's max buy
        #[arg(long, default_value_t = 1_000_000_000.0)]
        supply: f64,

        /// Upsert the result into the analytics store
        #[arg(long)]
        save: bool,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Check store reachability
    Health,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wallet_cluster_detector=info"));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { port } => commands::serve(&config, port).await,
        Commands::Detect { token_id, json } => commands::detect(&config, &token_id, json).await,
        Commands::Show { token_id } => commands::show(&config, &token_id).await,
        Commands::AnalyzeWallet {
            address,
            supply,
            save,
        } => commands::analyze_wallet(&config, &address, supply, save).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
