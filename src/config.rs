//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (advisor and exchange API keys) are referenced by env-var name
//! in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

use crate::error::AuctionError;
use crate::types::AdPosition;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub predictor: PredictorConfig,
    #[serde(default)]
    pub auction: AuctionConfig,
    #[serde(default)]
    pub revenue_targets: RevenueTargets,
    #[serde(default)]
    pub creative: CreativeConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sources: Vec<SourceSettings>,
    #[serde(default)]
    pub exchanges: Vec<ExchangeSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub name: String,
    /// Slot timeout used when the advisor gives none.
    pub default_timeout_ms: u64,
    /// Upper bound on sources invited to a single slot.
    pub max_sources_per_slot: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "ADPOD-001".to_string(),
            default_timeout_ms: 1000,
            max_sources_per_slot: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdvisorConfig {
    /// Strategy service URL. No endpoint means every pod uses the fallback.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub timeout_ms: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: None,
            model: None,
            timeout_ms: 1500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PredictorConfig {
    /// Ring-buffer capacity for training records.
    pub capacity: usize,
    pub learning_rate: f64,
    /// Re-derive weights every N appended records.
    pub retrain_every: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            learning_rate: 0.1,
            retrain_every: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuctionConfig {
    pub price_weight: f64,
    pub fill_weight: f64,
    pub latency_weight: f64,
    /// Latency at which the latency score reaches zero.
    pub latency_ceiling_ms: u64,
    /// Added to the runner-up price under the second-price rule.
    pub bid_increment: Decimal,
    /// Fraction of its own price a lone bid pays.
    pub single_bid_haircut: Decimal,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            price_weight: 0.70,
            fill_weight: 0.20,
            latency_weight: 0.10,
            latency_ceiling_ms: 2000,
            bid_increment: dec!(0.01),
            single_bid_haircut: dec!(0.95),
        }
    }
}

/// Per-position revenue target used as the fallback floor.
#[derive(Debug, Deserialize, Clone)]
pub struct RevenueTargets {
    pub preroll: Decimal,
    pub midroll: Decimal,
    pub postroll: Decimal,
    /// Floor multiplier applied on CTV / TV devices.
    pub tv_multiplier: Decimal,
}

impl Default for RevenueTargets {
    fn default() -> Self {
        Self {
            preroll: dec!(6.00),
            midroll: dec!(10.00),
            postroll: dec!(4.00),
            tv_multiplier: dec!(1.25),
        }
    }
}

impl RevenueTargets {
    pub fn for_position(&self, position: AdPosition) -> Decimal {
        match position {
            AdPosition::Preroll => self.preroll,
            AdPosition::Midroll => self.midroll,
            AdPosition::Postroll => self.postroll,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CreativeConfig {
    pub fetch_timeout_ms: u64,
}

impl Default for CreativeConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 800,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

/// Static configuration for one demand source.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceSettings {
    pub name: String,
    pub endpoint: String,
    #[serde(default = "default_durations")]
    pub durations: Vec<u32>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seed values for the rolling metrics.
    #[serde(default = "default_avg_price")]
    pub avg_price: f64,
    #[serde(default = "default_fill_rate")]
    pub fill_rate: f64,
    #[serde(default = "default_latency")]
    pub avg_latency_ms: f64,
}

/// A credentialed exchange for the federated auction.
#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeSettings {
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_exchange_timeout")]
    pub timeout_ms: u64,
}

fn default_durations() -> Vec<u32> {
    vec![15, 30]
}
fn default_true() -> bool {
    true
}
fn default_avg_price() -> f64 {
    5.0
}
fn default_fill_rate() -> f64 {
    0.5
}
fn default_latency() -> f64 {
    300.0
}
fn default_exchange_timeout() -> u64 {
    1200
}

fn invalid(message: String) -> anyhow::Error {
    AuctionError::Config(message).into()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to load config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(invalid(format!("Duplicate demand source name: {}", source.name)));
            }
            if source.timeout_ms == 0 {
                return Err(invalid(format!("Demand source {} has a zero timeout", source.name)));
            }
            if source.durations.is_empty() {
                return Err(invalid(format!("Demand source {} accepts no durations", source.name)));
            }
            if !(0.0..=1.0).contains(&source.fill_rate) {
                return Err(invalid(format!("Demand source {} fill_rate must be within [0, 1]", source.name)));
            }
        }
        if self.predictor.capacity == 0 {
            return Err(invalid("predictor.capacity must be positive".to_string()));
        }
        if self.predictor.retrain_every == 0 {
            return Err(invalid("predictor.retrain_every must be positive".to_string()));
        }
        Ok(())
    }

    /// Resolve an optional env-var reference into a secret, if present.
    pub fn resolve_secret(env_name: Option<&str>) -> Option<SecretString> {
        env_name
            .and_then(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty())
            .map(SecretString::new)
    }
}
