//! Pod executor.
//!
//! Runs a strategy's slots one after another. Each slot is fanned out to
//! its candidates, auctioned against the exclusions accumulated from
//! earlier winners, and handed to the learning loop. Sources whose every
//! declared category was already sold in this pod are not called. A failed
//! slot never stops the pod.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::creative::{resolve_creative, CreativeFetcher};
use crate::auction::{Auctioneer, ExclusionSet, Ranking};
use crate::dispatch::wire::BidRequest;
use crate::dispatch::BidDispatcher;
use crate::learning::LearningLoop;
use crate::registry::DemandRegistry;
use crate::types::{Opportunity, PodResult, PodStatus, PodStrategy, Slot, SlotResolution};

pub struct PodExecutor {
    dispatcher: Arc<BidDispatcher>,
    auctioneer: Auctioneer,
    registry: Arc<dyn DemandRegistry>,
    learning: LearningLoop,
    creative: Arc<dyn CreativeFetcher>,
}

impl PodExecutor {
    pub fn new(
        dispatcher: Arc<BidDispatcher>,
        auctioneer: Auctioneer,
        registry: Arc<dyn DemandRegistry>,
        learning: LearningLoop,
        creative: Arc<dyn CreativeFetcher>,
    ) -> Self {
        Self {
            dispatcher,
            auctioneer,
            registry,
            learning,
            creative,
        }
    }

    /// Execute every slot of `strategy` in order and summarise the pod.
    pub async fn execute(&self, opportunity: &Opportunity, strategy: &mut PodStrategy) -> PodResult {
        strategy.status = PodStatus::Executing;
        let started = Instant::now();
        let budget_ms = strategy.latency_budget_ms();
        let mut exclusions = ExclusionSet::new();

        for slot in strategy.slots.iter_mut() {
            self.run_slot(opportunity, slot, &mut exclusions).await;
        }

        strategy.status = PodStatus::Completed;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if elapsed_ms > budget_ms {
            warn!(
                pod_id = %strategy.pod_id,
                elapsed_ms,
                budget_ms,
                "Pod exceeded its latency budget"
            );
        }

        let result = PodResult::from_strategy(strategy);
        info!(
            pod_id = %result.pod_id,
            filled = result.slots_filled,
            attempted = result.slots_attempted,
            revenue = format!("${:.2}", result.total_revenue),
            elapsed_ms,
            "Pod executed"
        );
        result
    }

    async fn run_slot(&self, opportunity: &Opportunity, slot: &mut Slot, exclusions: &mut ExclusionSet) {
        if !exclusions.is_empty() {
            self.drop_excluded_candidates(slot, exclusions);
        }

        let request = BidRequest {
            id: format!("{}-{}", opportunity.id, slot.index),
            floor: slot.floor,
            duration: slot.duration_secs,
            position: opportunity.position,
            category: opportunity.content_category.clone(),
            device: opportunity.device,
            excluded_advertisers: exclusions.advertisers(),
            excluded_categories: exclusions.categories(),
            privacy: opportunity.privacy.clone(),
        };

        debug!(slot = slot.index, candidates = ?slot.source_names(), "Dispatching slot");
        slot.mark_dispatched();
        let report = self.dispatcher.dispatch(slot, &request).await;

        let fill_rates: HashMap<String, f64> = self
            .registry
            .snapshot()
            .into_iter()
            .map(|s| (s.name, s.fill_rate))
            .collect();
        let fill_rate = |name: &str| fill_rates.get(name).copied().unwrap_or(0.0);

        let mut resolution = self.auctioneer.evaluate(
            slot,
            &report.bids(),
            exclusions,
            Ranking::Weighted,
            &fill_rate,
        );

        if let SlotResolution::Filled(winner) = &mut resolution {
            resolve_creative(self.creative.as_ref(), winner).await;
            exclusions.add_winner(&winner.bid);
        }

        slot.resolve(resolution);
        self.learning.on_slot_resolved(opportunity, slot, &report);
    }

    /// Remove candidates that could only serve categories already taken.
    fn drop_excluded_candidates(&self, slot: &mut Slot, exclusions: &ExclusionSet) {
        let index = slot.index;
        slot.candidates.retain(|c| {
            let covered = self
                .registry
                .get(&c.source)
                .is_some_and(|source| exclusions.covers_categories(&source.categories));
            if covered {
                debug!(slot = index, source = %c.source, "Skipping source, categories already sold");
            }
            !covered
        });
    }
}
