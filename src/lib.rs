//! Wallet Cluster Detector Library
//!
//! Detects coordinated buying by new wallets on a token and persists the
//! resulting clusters with a risk score.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod wallet;

// Re-export commonly used types
pub use cluster::{Cluster, ClusterDetector, DetectionOutcome};
pub use config::Config;
pub use error::{Error, Result};
