//! Learning loop.
//!
//! The only writer into the registry and predictor. Every resolved slot
//! produces one training record per candidate source, `filled` meaning the
//! source answered with a usable bid (win or lose), plus rolling-metric
//! updates:
//! - winner: price/fill/latency EMAs move toward the observation;
//! - sources that returned nothing usable: fill rate decays;
//! - sources that bid and lost: left alone;
//! - the position aggregate is updated either way.

use std::sync::Arc;
use tracing::debug;

use crate::dispatch::DispatchReport;
use crate::predictor::FillRatePredictor;
use crate::registry::DemandRegistry;
use crate::types::{f, Opportunity, PredictionContext, Slot};

pub struct LearningLoop {
    registry: Arc<dyn DemandRegistry>,
    predictor: Arc<FillRatePredictor>,
}

impl LearningLoop {
    pub fn new(registry: Arc<dyn DemandRegistry>, predictor: Arc<FillRatePredictor>) -> Self {
        Self {
            registry,
            predictor,
        }
    }

    pub fn on_slot_resolved(&self, opportunity: &Opportunity, slot: &Slot, report: &DispatchReport) {
        let winner = slot.winner();
        let winning_source = winner.map(|w| w.bid.source.as_str());
        let bids = report.bids();

        for result in &report.results {
            // Federated exchanges are not registry sources.
            if !self.registry.contains(&result.source) {
                continue;
            }

            let won = winning_source == Some(result.source.as_str());
            let answered = result.has_bid();
            let latency = result.outcome.latency_ms();
            let best_bid = bids
                .iter()
                .filter(|b| b.source == result.source)
                .map(|b| b.price)
                .max();

            let ctx = PredictionContext::for_source(opportunity, &result.source, slot.floor);
            self.predictor
                .record_outcome(ctx, answered, best_bid.map(f), latency);

            match (won, best_bid) {
                (true, Some(price)) => self.registry.record_fill(&result.source, f(price), latency),
                (false, None) => self.registry.record_no_fill(&result.source, latency),
                _ => {}
            }
        }

        let revenue = f(slot.revenue());
        self.registry
            .record_position(opportunity.position, revenue, winner.is_some());

        debug!(
            slot = slot.index,
            position = %opportunity.position,
            filled = winner.is_some(),
            revenue = format!("{:.2}", revenue),
            "Slot outcome learned"
        );
    }
}
