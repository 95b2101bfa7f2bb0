//! Core engine: opportunity → strategy → sequential slot auctions → result.

pub mod creative;
pub mod federated;
pub mod pod;
pub mod sink;

use std::sync::Arc;
use tracing::{error, info};

use crate::config::RevenueTargets;
use crate::error::AuctionError;
use crate::learning::LearningLoop;
use crate::planner::{fallback, StrategyPlanner};
use crate::predictor::FillRatePredictor;
use crate::registry::DemandRegistry;
use crate::types::{Opportunity, PodResult, PodStatus, PodStrategy, StrategyOrigin};

use self::federated::FederatedAuction;
use self::pod::PodExecutor;
use self::sink::OutcomeSink;

pub struct PodEngine {
    planner: StrategyPlanner,
    executor: PodExecutor,
    federated: Option<FederatedAuction>,
    learning: LearningLoop,
    registry: Arc<dyn DemandRegistry>,
    predictor: Arc<FillRatePredictor>,
    revenue_targets: RevenueTargets,
    sinks: Vec<Arc<dyn OutcomeSink>>,
}

impl PodEngine {
    pub fn new(
        planner: StrategyPlanner,
        executor: PodExecutor,
        registry: Arc<dyn DemandRegistry>,
        predictor: Arc<FillRatePredictor>,
        revenue_targets: RevenueTargets,
    ) -> Self {
        let learning = LearningLoop::new(registry.clone(), predictor.clone());
        Self {
            planner,
            executor,
            federated: None,
            learning,
            registry,
            predictor,
            revenue_targets,
            sinks: Vec::new(),
        }
    }

    pub fn with_federation(mut self, federated: FederatedAuction) -> Self {
        self.federated = Some(federated);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn registry(&self) -> &Arc<dyn DemandRegistry> {
        &self.registry
    }

    pub fn predictor(&self) -> &Arc<FillRatePredictor> {
        &self.predictor
    }

    pub fn has_federation(&self) -> bool {
        self.federated.as_ref().is_some_and(|f| f.exchange_count() > 0)
    }

    /// Plan and run a pod. Only `NoEnabledSources` escapes.
    pub async fn handle_opportunity(&self, opportunity: &Opportunity) -> Result<PodResult, AuctionError> {
        info!(opportunity = %opportunity, "Handling opportunity");

        let mut strategy = self.planner.build_strategy(opportunity).await?;
        let result = self.executor.execute(opportunity, &mut strategy).await;
        self.emit(&result);
        Ok(result)
    }

    /// Sell a single slot through the exchange federation.
    pub async fn run_federated(&self, opportunity: &Opportunity) -> Result<PodResult, AuctionError> {
        let federated = match &self.federated {
            Some(f) if f.exchange_count() > 0 => f,
            _ => {
                error!(opportunity_id = %opportunity.id, "No credentialed exchanges");
                return Err(AuctionError::NoEnabledSources);
            }
        };

        let floor =
            fallback::fallback_floor(&self.revenue_targets, opportunity.position, opportunity.device);
        let (slot, report) = federated.run(opportunity, floor).await;
        self.learning.on_slot_resolved(opportunity, &slot, &report);

        let strategy = PodStrategy {
            pod_id: uuid::Uuid::new_v4().to_string(),
            opportunity_id: opportunity.id.clone(),
            expected_revenue: floor,
            expected_completion: 1.0,
            rationale: format!("federated across {} exchanges", federated.exchange_count()),
            origin: StrategyOrigin::Federated,
            status: PodStatus::Completed,
            slots: vec![slot],
        };

        let result = PodResult::from_strategy(&strategy);
        self.emit(&result);
        Ok(result)
    }

    fn emit(&self, result: &PodResult) {
        for sink in &self.sinks {
            sink.emit(result);
        }
    }
}
