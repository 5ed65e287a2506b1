//! Wallet tiers
//!
//! Launch rules cap how much of a token's supply a wallet may buy based on
//! its age and activity. A wallet gets the highest tier whose minimums it
//! meets on both counts.

use serde::Serialize;
use std::fmt;

/// One row of the tier table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WalletTier {
    pub tier: u8,
    pub name: &'static str,
    pub min_age_days: u32,
    pub min_tx_count: u32,
    /// Percent of total supply a single wallet may buy
    pub max_buy_percent: f64,
}

pub const WALLET_TIERS: [WalletTier; 4] = [
    WalletTier {
        tier: 0,
        name: "New",
        min_age_days: 0,
        min_tx_count: 0,
        max_buy_percent: 0.5,
    },
    WalletTier {
        tier: 1,
        name: "Active",
        min_age_days: 30,
        min_tx_count: 30,
        max_buy_percent: 1.0,
    },
    WalletTier {
        tier: 2,
        name: "Veteran",
        min_age_days: 100,
        min_tx_count: 100,
        max_buy_percent: 2.0,
    },
    WalletTier {
        tier: 3,
        name: "Elite",
        min_age_days: 300,
        min_tx_count: 300,
        max_buy_percent: 3.0,
    },
];

impl WalletTier {
    /// Largest buy allowed for this tier, in token units
    pub fn max_buy_amount(&self, total_supply: f64) -> f64 {
        total_supply * self.max_buy_percent / 100.0
    }
}

impl fmt::Display for WalletTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (tier {})", self.name, self.tier)
    }
}

/// Highest tier the wallet qualifies for
pub fn tier_for(age_days: u32, transaction_count: u32) -> &'static WalletTier {
    WALLET_TIERS
        .iter()
        .rev()
        .find(|t| age_days >= t.min_age_days && transaction_count >= t.min_tx_count)
        .unwrap_or(&WALLET_TIERS[0])
}

/// Look up a tier by index
pub fn tier_by_index(tier: u8) -> Option<&'static WalletTier> {
    WALLET_TIERS.iter().find(|t| t.tier == tier)
}
