//! Strategy planner: turns an opportunity into a `PodStrategy`.
//!
//! Consults the external advisor under a bounded timeout and sanitises
//! whatever it returns. Any advisor failure (error, timeout, unparsable
//! output) is absorbed here and replaced by the deterministic fallback in
//! [`fallback`]. Both paths then pass through the predictor, which prunes
//! sources unlikely to fill and shortens timeouts for slow ones.

pub mod fallback;

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::advisor::{AdvisorContext, AdvisorStrategy, SourceSnapshot, StrategyAdvisor};
use crate::config::RevenueTargets;
use crate::error::AuctionError;
use crate::predictor::FillRatePredictor;
use crate::registry::{DemandRegistry, DemandSource};
use crate::types::{
    d, f, AdPosition, Opportunity, PodStatus, PodStrategy, PredictionContext, Recommendation,
    Slot, SlotCandidate, StrategyOrigin,
};

// ---------------------------------------------------------------------------
// Sanitisation bounds
// ---------------------------------------------------------------------------

const MIN_SLOTS: i64 = 1;
const MAX_SLOTS: i64 = 3;
const DEFAULT_SLOT_SECS: u32 = 15;
const MIN_FLOOR: Decimal = dec!(0.50);
const MAX_FLOOR: Decimal = dec!(50.00);
const MIN_TIMEOUT_MS: u64 = 400;
const MAX_TIMEOUT_MS: u64 = 3000;
/// Sources used when a slot ends up with none.
const DEFAULT_SOURCE_COUNT: usize = 3;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub advisor_timeout: Duration,
    pub default_timeout_ms: u64,
    pub max_sources_per_slot: usize,
    pub revenue_targets: RevenueTargets,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            advisor_timeout: Duration::from_millis(1500),
            default_timeout_ms: 1000,
            max_sources_per_slot: 8,
            revenue_targets: RevenueTargets::default(),
        }
    }
}

/// Pre-candidate slot shape.
#[derive(Debug, Clone)]
struct SlotPlan {
    duration_secs: u32,
    floor: Decimal,
    timeout_ms: u64,
    sources: Vec<String>,
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

pub struct StrategyPlanner {
    advisor: Arc<dyn StrategyAdvisor>,
    registry: Arc<dyn DemandRegistry>,
    predictor: Arc<FillRatePredictor>,
    config: PlannerConfig,
}

impl StrategyPlanner {
    pub fn new(
        advisor: Arc<dyn StrategyAdvisor>,
        registry: Arc<dyn DemandRegistry>,
        predictor: Arc<FillRatePredictor>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            advisor,
            registry,
            predictor,
            config,
        }
    }

    /// Plan a pod for `opportunity`.
    ///
    /// Only fails when no demand source is enabled at all.
    pub async fn build_strategy(&self, opportunity: &Opportunity) -> Result<PodStrategy, AuctionError> {
        let enabled = self.registry.enabled();
        if enabled.is_empty() {
            error!(opportunity_id = %opportunity.id, "No enabled demand sources");
            return Err(AuctionError::NoEnabledSources);
        }

        let context = self.advisor_context(opportunity, &enabled);

        let advised =
            match tokio::time::timeout(self.config.advisor_timeout, self.advisor.advise(&context)).await {
                Ok(Ok(raw)) => Ok(raw),
                Ok(Err(e)) => Err(AuctionError::AdvisorFailure(e.to_string())),
                Err(_) => Err(AuctionError::AdvisorFailure(format!(
                    "timed out after {}ms",
                    self.config.advisor_timeout.as_millis()
                ))),
            };

        let (plans, origin, rationale, advised_revenue, advised_completion) = match advised {
            Ok(raw) => {
                let plans = self.sanitize(&raw, opportunity);
                let rationale = raw
                    .rationale
                    .clone()
                    .unwrap_or_else(|| format!("advisor {}", self.advisor.name()));
                (
                    plans,
                    StrategyOrigin::Advisor,
                    rationale,
                    raw.expected_revenue.filter(|v| v.is_finite() && *v >= 0.0),
                    raw.expected_completion.filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 1.0)),
                )
            }
            Err(e) => {
                warn!(
                    opportunity_id = %opportunity.id,
                    advisor = self.advisor.name(),
                    error = %e,
                    "Advisor unavailable, using fallback strategy"
                );
                (
                    self.fallback(opportunity),
                    StrategyOrigin::Fallback,
                    format!("fallback: {e}"),
                    None,
                    None,
                )
            }
        };

        let mut slots = Vec::with_capacity(plans.len());
        let mut est_revenue = 0.0;
        let mut est_fill_sum = 0.0;
        for (index, plan) in plans.into_iter().enumerate() {
            let (slot, fill_prob, revenue) = self.materialize(index, plan, opportunity);
            est_fill_sum += fill_prob;
            est_revenue += revenue;
            slots.push(slot);
        }

        let slot_count = slots.len().max(1) as f64;
        let strategy = PodStrategy {
            pod_id: uuid::Uuid::new_v4().to_string(),
            opportunity_id: opportunity.id.clone(),
            slots,
            expected_revenue: d(advised_revenue.unwrap_or(est_revenue)).round_dp(2),
            expected_completion: advised_completion.unwrap_or(est_fill_sum / slot_count),
            rationale,
            origin,
            status: PodStatus::Building,
        };

        info!(
            opportunity_id = %opportunity.id,
            pod_id = %strategy.pod_id,
            origin = ?strategy.origin,
            slots = strategy.slots.len(),
            seconds = strategy.total_duration_secs(),
            expected_revenue = format!("${:.2}", strategy.expected_revenue),
            "Pod strategy built"
        );

        Ok(strategy)
    }

    // -- Context ---------------------------------------------------------

    fn advisor_context(&self, opportunity: &Opportunity, enabled: &[DemandSource]) -> AdvisorContext {
        let floor = self.fallback_floor(opportunity);
        let sources = enabled
            .iter()
            .map(|s| {
                let ctx = PredictionContext::for_source(opportunity, &s.name, floor);
                let pred = self.predictor.predict(s, &ctx);
                SourceSnapshot {
                    name: s.name.clone(),
                    avg_price: s.avg_price,
                    fill_rate: s.fill_rate,
                    avg_latency_ms: s.avg_latency_ms,
                    accepted_durations: s.accepted_durations.clone(),
                    predicted_fill: pred.probability,
                    predicted_price: pred.expected_price,
                    recommendation: pred.recommendation,
                }
            })
            .collect();

        let history: BTreeMap<_, _> = AdPosition::ALL
            .iter()
            .map(|p| (*p, self.registry.position_history(*p)))
            .collect();

        AdvisorContext {
            opportunity_id: opportunity.id.clone(),
            position: opportunity.position,
            available_secs: opportunity.available_secs,
            content_category: opportunity.content_category.clone(),
            device: opportunity.device,
            user_value: opportunity.user_value,
            history,
            sources,
        }
    }

    // -- Sanitisation ----------------------------------------------------

    fn sanitize(&self, raw: &AdvisorStrategy, opportunity: &Opportunity) -> Vec<SlotPlan> {
        let count = raw.slot_count.clamp(MIN_SLOTS, MAX_SLOTS) as usize;

        let durations: Vec<u32> = if raw.durations.len() == count {
            raw.durations
                .iter()
                .map(|&secs| if secs == 0 { DEFAULT_SLOT_SECS } else { secs })
                .collect()
        } else {
            debug!(
                slot_count = count,
                durations = raw.durations.len(),
                "Advisor durations mismatched, defaulting to 15s"
            );
            vec![DEFAULT_SLOT_SECS; count]
        };

        let fallback_floor = self.fallback_floor(opportunity);

        durations
            .into_iter()
            .enumerate()
            .map(|(i, duration_secs)| {
                let floor = raw
                    .floors
                    .get(i)
                    .copied()
                    .filter(|v| v.is_finite())
                    .map(d)
                    .unwrap_or(fallback_floor);

                let timeout_ms = raw
                    .timeouts_ms
                    .get(i)
                    .map(|&t| t.max(0) as u64)
                    .unwrap_or(self.config.default_timeout_ms);

                let sources = raw
                    .sources
                    .get(i)
                    .map(|names| self.known_sources(names))
                    .unwrap_or_default();

                SlotPlan {
                    duration_secs,
                    floor: clamp_floor(floor),
                    timeout_ms: clamp_timeout(timeout_ms),
                    sources,
                }
            })
            .collect()
    }

    /// Drop names the registry does not know (or has disabled), dedupe.
    fn known_sources(&self, names: &[String]) -> Vec<String> {
        let mut kept: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if kept.contains(name) {
                continue;
            }
            match self.registry.get(name) {
                Some(source) if source.enabled => kept.push(name.clone()),
                _ => debug!(source = %name, "Dropping unknown advisor source"),
            }
        }
        kept
    }

    // -- Fallback --------------------------------------------------------

    fn fallback(&self, opportunity: &Opportunity) -> Vec<SlotPlan> {
        let floor = clamp_floor(self.fallback_floor(opportunity));
        let timeout_ms = clamp_timeout(self.config.default_timeout_ms);

        fallback::fallback_durations(opportunity.position, opportunity.available_secs)
            .into_iter()
            .map(|duration_secs| SlotPlan {
                duration_secs,
                floor,
                timeout_ms,
                sources: Vec::new(),
            })
            .collect()
    }

    fn fallback_floor(&self, opportunity: &Opportunity) -> Decimal {
        fallback::fallback_floor(
            &self.config.revenue_targets,
            opportunity.position,
            opportunity.device,
        )
    }

    // -- Candidates ------------------------------------------------------

    /// Turn a plan into a slot: fill empty source lists, apply predictor
    /// recommendations, and bound each source's timeout by the slot's.
    /// Returns the slot plus its estimated fill probability and revenue.
    fn materialize(&self, index: usize, plan: SlotPlan, opportunity: &Opportunity) -> (Slot, f64, f64) {
        let mut names = plan.sources;
        if names.is_empty() {
            names = self
                .registry
                .top_by_price(DEFAULT_SOURCE_COUNT)
                .into_iter()
                .map(|s| s.name)
                .collect();
        }
        names.truncate(self.config.max_sources_per_slot.max(1));

        let mut scored = Vec::with_capacity(names.len());
        for name in names {
            let Some(source) = self.registry.get(&name) else {
                continue;
            };
            let ctx = PredictionContext::for_source(opportunity, &name, plan.floor);
            let pred = self.predictor.predict(&source, &ctx);
            scored.push((source, pred));
        }

        // Skip advice only applies while something else remains to call.
        let callable = scored
            .iter()
            .filter(|(_, p)| p.recommendation != Recommendation::Skip)
            .count();
        if callable > 0 {
            scored.retain(|(s, p)| {
                let keep = p.recommendation != Recommendation::Skip;
                if !keep {
                    debug!(
                        slot = index,
                        source = %s.name,
                        p_fill = format!("{:.2}", p.probability),
                        "Skipping low-fill source"
                    );
                }
                keep
            });
        }

        let mut slot = Slot::new(index, plan.duration_secs, plan.floor, plan.timeout_ms);
        let mut no_fill = 1.0;
        let mut best_price: f64 = 0.0;
        for (source, pred) in &scored {
            let mut timeout_ms = source.timeout_ms.min(plan.timeout_ms);
            if pred.recommendation == Recommendation::ReduceTimeout {
                timeout_ms = (timeout_ms / 2).max(MIN_TIMEOUT_MS).min(plan.timeout_ms);
            }
            slot.candidates.push(SlotCandidate {
                source: source.name.clone(),
                timeout_ms,
            });
            no_fill *= 1.0 - pred.probability;
            best_price = best_price.max(pred.expected_price);
        }

        let fill_prob = if scored.is_empty() { 0.0 } else { 1.0 - no_fill };
        let revenue = fill_prob * best_price.max(f(plan.floor));
        (slot, fill_prob, revenue)
    }
}

fn clamp_floor(floor: Decimal) -> Decimal {
    floor.clamp(MIN_FLOOR, MAX_FLOOR)
}

fn clamp_timeout(timeout_ms: u64) -> u64 {
    timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
