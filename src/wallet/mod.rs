//! Wallet analytics: tier lookup and on-chain age/activity analysis

pub mod analyzer;
pub mod tiers;

pub use analyzer::{AnalyzerConfig, WalletAnalyzer};
pub use tiers::{tier_for, WalletTier, WALLET_TIERS};
