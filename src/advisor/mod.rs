//! Strategy advisor integration.
//!
//! Defines the `StrategyAdvisor` contract the planner consults for a pod
//! shape. How the advisor reasons (prompting, model choice) lives on the
//! other side of this trait. The planner treats any error as a signal to
//! use its deterministic fallback.

pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{AdPosition, DeviceType, PositionHistory, Recommendation};

/// Per-source view handed to the advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub name: String,
    pub avg_price: f64,
    pub fill_rate: f64,
    pub avg_latency_ms: f64,
    pub accepted_durations: Vec<u32>,
    pub predicted_fill: f64,
    pub predicted_price: f64,
    pub recommendation: Recommendation,
}

/// Everything the advisor gets to see about an opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorContext {
    pub opportunity_id: String,
    pub position: AdPosition,
    pub available_secs: u32,
    pub content_category: String,
    pub device: DeviceType,
    pub user_value: f64,
    pub history: BTreeMap<AdPosition, PositionHistory>,
    pub sources: Vec<SourceSnapshot>,
}

/// Raw advisor answer, before sanitisation. Every field is lenient: the
/// planner clamps, pads and repairs whatever comes back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisorStrategy {
    #[serde(alias = "slotCount")]
    pub slot_count: i64,
    #[serde(default)]
    pub durations: Vec<u32>,
    #[serde(default, alias = "floorPrices", alias = "floor_prices")]
    pub floors: Vec<f64>,
    #[serde(default, alias = "timeouts", alias = "timeoutsMs")]
    pub timeouts_ms: Vec<i64>,
    /// Candidate source names per slot.
    #[serde(default)]
    pub sources: Vec<Vec<String>>,
    #[serde(default, alias = "expectedRevenue")]
    pub expected_revenue: Option<f64>,
    #[serde(default, alias = "expectedCompletion")]
    pub expected_completion: Option<f64>,
    #[serde(default, alias = "reasoning")]
    pub rationale: Option<String>,
}

/// Abstraction over external pod-strategy advisors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StrategyAdvisor: Send + Sync {
    /// Propose a pod shape for the given context.
    async fn advise(&self, context: &AdvisorContext) -> Result<AdvisorStrategy>;

    /// Advisor identifier for logging.
    fn name(&self) -> &str;
}

/// Advisor used when none is configured. Always declines, which routes
/// every pod through the deterministic fallback.
pub struct NullAdvisor;

#[async_trait]
impl StrategyAdvisor for NullAdvisor {
    async fn advise(&self, _context: &AdvisorContext) -> Result<AdvisorStrategy> {
        anyhow::bail!("no strategy advisor configured")
    }

    fn name(&self) -> &str {
        "none"
    }
}
