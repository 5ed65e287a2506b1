//! Cluster risk scoring
//!
//! Each factor is an ordered table of `(predicate, weight)` rows. The first
//! row whose predicate holds contributes its weight; a factor with no
//! matching row contributes nothing. Factor weights are summed, capped at
//! 1.0 and rounded to two decimals.

use serde::Serialize;

/// Comparison against a factor's measured value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Predicate {
    AtLeast(f64),
    Below(f64),
}

impl Predicate {
    pub fn holds(&self, value: f64) -> bool {
        match *self {
            Predicate::AtLeast(bound) => value >= bound,
            Predicate::Below(bound) => value < bound,
        }
    }
}

/// One scored dimension of a cluster
#[derive(Debug, Clone, Copy)]
pub struct RiskFactor {
    pub name: &'static str,
    pub rows: &'static [(Predicate, f64)],
}

impl RiskFactor {
    /// Weight of the first matching row, or 0.0
    pub fn weight_for(&self, value: f64) -> f64 {
        self.rows
            .iter()
            .find(|(predicate, _)| predicate.holds(value))
            .map(|(_, weight)| *weight)
            .unwrap_or(0.0)
    }
}

/// Member count
pub const CLUSTER_SIZE: RiskFactor = RiskFactor {
    name: "cluster_size",
    rows: &[
        (Predicate::AtLeast(10.0), 0.40),
        (Predicate::AtLeast(5.0), 0.25),
        (Predicate::AtLeast(3.0), 0.15),
    ],
};

/// Average wallet age in days
pub const WALLET_AGE: RiskFactor = RiskFactor {
    name: "avg_age_days",
    rows: &[(Predicate::Below(7.0), 0.30), (Predicate::Below(30.0), 0.15)],
};

/// Average prior transaction count
pub const WALLET_ACTIVITY: RiskFactor = RiskFactor {
    name: "avg_tx_count",
    rows: &[(Predicate::Below(10.0), 0.20), (Predicate::Below(30.0), 0.10)],
};

/// Spread between the first and last member buy, in milliseconds
pub const TIME_SPREAD: RiskFactor = RiskFactor {
    name: "time_spread_ms",
    rows: &[
        (Predicate::Below(60_000.0), 0.30),
        (Predicate::Below(300_000.0), 0.15),
    ],
};

/// Maximum total score
pub const MAX_RISK: f64 = 1.0;

/// Measured inputs to the rubric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterMetrics {
    pub size: usize,
    pub avg_age_days: f64,
    pub avg_tx_count: f64,
    pub time_spread_ms: i64,
}

/// Per-factor contributions and the final score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskBreakdown {
    pub size: f64,
    pub age: f64,
    pub activity: f64,
    pub timing: f64,
    pub total: f64,
}

/// The fixed additive rubric
#[derive(Debug, Clone, Copy)]
pub struct RiskRubric {
    pub size: RiskFactor,
    pub age: RiskFactor,
    pub activity: RiskFactor,
    pub timing: RiskFactor,
}

impl Default for RiskRubric {
    fn default() -> Self {
        Self {
            size: CLUSTER_SIZE,
            age: WALLET_AGE,
            activity: WALLET_ACTIVITY,
            timing: TIME_SPREAD,
        }
    }
}

impl RiskRubric {
    pub fn score(&self, metrics: &ClusterMetrics) -> RiskBreakdown {
        let size = self.size.weight_for(metrics.size as f64);
        let age = self.age.weight_for(metrics.avg_age_days);
        let activity = self.activity.weight_for(metrics.avg_tx_count);
        let timing = self.timing.weight_for(metrics.time_spread_ms as f64);

        let total = round2((size + age + activity + timing).min(MAX_RISK));

        RiskBreakdown {
            size,
            age,
            activity,
            timing,
            total,
        }
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(size: usize, age: f64, tx: f64, spread_ms: i64) -> ClusterMetrics {
        ClusterMetrics {
            size,
            avg_age_days: age,
            avg_tx_count: tx,
            time_spread_ms: spread_ms,
        }
    }

    #[test]
    fn test_simple_pair_scores_080() {
        let breakdown = RiskRubric::default().score(&metrics(2, 2.0, 1.0, 10_000));
        assert_eq!(breakdown.size, 0.0);
        assert_eq!(breakdown.age, 0.30);
        assert_eq!(breakdown.activity, 0.20);
        assert_eq!(breakdown.timing, 0.30);
        assert_eq!(breakdown.total, 0.8);
    }

    #[test]
    fn test_size_tiers() {
        let rubric = RiskRubric::default();
        assert_eq!(rubric.size.weight_for(2.0), 0.0);
        assert_eq!(rubric.size.weight_for(3.0), 0.15);
        assert_eq!(rubric.size.weight_for(4.0), 0.15);
        assert_eq!(rubric.size.weight_for(5.0), 0.25);
        assert_eq!(rubric.size.weight_for(9.0), 0.25);
        assert_eq!(rubric.size.weight_for(10.0), 0.40);
        assert_eq!(rubric.size.weight_for(250.0), 0.40);
    }

    #[test]
    fn test_boundaries_are_exclusive_below() {
        let rubric = RiskRubric::default();
        assert_eq!(rubric.age.weight_for(7.0), 0.15);
        assert_eq!(rubric.age.weight_for(30.0), 0.0);
        assert_eq!(rubric.activity.weight_for(10.0), 0.10);
        assert_eq!(rubric.activity.weight_for(30.0), 0.0);
        assert_eq!(rubric.timing.weight_for(60_000.0), 0.15);
        assert_eq!(rubric.timing.weight_for(300_000.0), 0.0);
    }

    #[test]
    fn test_score_is_capped() {
        // 0.40 + 0.30 + 0.20 + 0.30 = 1.20
        let breakdown = RiskRubric::default().score(&metrics(12, 1.0, 1.0, 0));
        assert_eq!(breakdown.total, 1.0);
    }

    #[test]
    fn test_score_rounded_to_two_decimals() {
        // 0.15 + 0.15 + 0.10 + 0.15 = 0.55 with float noise
        let breakdown = RiskRubric::default().score(&metrics(3, 10.0, 15.0, 120_000));
        assert_eq!(breakdown.total, 0.55);
        assert_eq!(round2(breakdown.total), breakdown.total);
    }

    #[test]
    fn test_only_activity_contributes() {
        // Old on average and slow, but still low activity
        let breakdown = RiskRubric::default().score(&metrics(2, 45.0, 12.0, 600_000));
        assert_eq!(breakdown.total, 0.10);
    }
}
