//! Simulation harness.
//!
//! Runs opportunities through the full pod pipeline against mock sources
//! and checks the market-level properties the engine must hold.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use adpod::advisor::{AdvisorContext, AdvisorStrategy, NullAdvisor, StrategyAdvisor};
use adpod::auction::Auctioneer;
use adpod::config::{PredictorConfig, RevenueTargets};
use adpod::dispatch::BidDispatcher;
use adpod::engine::creative::CreativeFetcher;
use adpod::engine::pod::PodExecutor;
use adpod::engine::PodEngine;
use adpod::learning::LearningLoop;
use adpod::planner::{PlannerConfig, StrategyPlanner};
use adpod::predictor::FillRatePredictor;
use adpod::registry::{DemandRegistry, DemandSource, InMemoryRegistry};
use adpod::types::{
    AdPosition, DeviceType, Opportunity, PodStatus, PredictionContext, Recommendation,
    StrategyOrigin,
};

use crate::mock_source::{registry_entry, MockSource};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Mock sources only ever return inline creatives.
struct NoFetch;

#[async_trait]
impl CreativeFetcher for NoFetch {
    async fn fetch(&self, url: &str) -> Result<String> {
        anyhow::bail!("unexpected creative fetch: {url}")
    }
}

/// Advisor that never answers inside the planner's budget.
struct StalledAdvisor;

#[async_trait]
impl StrategyAdvisor for StalledAdvisor {
    async fn advise(&self, _context: &AdvisorContext) -> Result<AdvisorStrategy> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        anyhow::bail!("stalled")
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

fn targets(position_floor: Decimal) -> RevenueTargets {
    RevenueTargets {
        preroll: position_floor,
        midroll: position_floor,
        postroll: position_floor,
        tv_multiplier: dec!(1.25),
    }
}

fn planner(
    advisor: Arc<dyn StrategyAdvisor>,
    registry: Arc<dyn DemandRegistry>,
    predictor: Arc<FillRatePredictor>,
    floor: Decimal,
) -> StrategyPlanner {
    StrategyPlanner::new(
        advisor,
        registry,
        predictor,
        PlannerConfig {
            advisor_timeout: Duration::from_millis(20),
            revenue_targets: targets(floor),
            ..PlannerConfig::default()
        },
    )
}

/// Full engine over mock sources, fallback-planned at `floor`.
fn build_engine(sources: Vec<DemandSource>, clients: &[Arc<MockSource>], floor: Decimal) -> PodEngine {
    let registry: Arc<dyn DemandRegistry> = Arc::new(InMemoryRegistry::new(sources));
    let predictor = Arc::new(FillRatePredictor::new(PredictorConfig::default()));

    let mut dispatcher = BidDispatcher::new();
    for c in clients {
        dispatcher.register(c.clone());
    }

    let executor = PodExecutor::new(
        Arc::new(dispatcher),
        Auctioneer::default(),
        registry.clone(),
        LearningLoop::new(registry.clone(), predictor.clone()),
        Arc::new(NoFetch),
    );

    PodEngine::new(
        planner(Arc::new(NullAdvisor), registry.clone(), predictor.clone(), floor),
        executor,
        registry,
        predictor,
        targets(floor),
    )
}

// ---------------------------------------------------------------------------
// Market scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_reliable_source_wins_majority() {
    let reliable = Arc::new(MockSource::new("reliable", 10.0, 0.9, "r.example", 7));
    let flaky = Arc::new(MockSource::new("flaky", 20.0, 0.1, "f.example", 11));
    let cheap = Arc::new(MockSource::new("cheap", 5.0, 0.5, "c.example", 13));

    let engine = build_engine(
        vec![
            registry_entry("reliable", 10.0, 0.9),
            registry_entry("flaky", 20.0, 0.1),
            registry_entry("cheap", 5.0, 0.5),
        ],
        &[reliable.clone(), flaky.clone(), cheap.clone()],
        dec!(8),
    );

    let mut wins: HashMap<String, usize> = HashMap::new();
    for _ in 0..1000 {
        let opp = Opportunity::new(AdPosition::Postroll, 30, "news", DeviceType::Desktop);
        let result = engine.handle_opportunity(&opp).await.unwrap();
        assert_eq!(result.slots_attempted, 1);

        for winner in result.per_slot_winner.iter().flatten() {
            assert!(
                winner.clearing_price <= dec!(10),
                "clearing {} above 10",
                winner.clearing_price
            );
            assert!(winner.clearing_price <= winner.bid_price);
            *wins.entry(winner.source.clone()).or_default() += 1;
        }
    }

    let reliable_wins = wins.get("reliable").copied().unwrap_or(0);
    assert!(reliable_wins > 700, "reliable won only {reliable_wins}");
    assert_eq!(wins.get("flaky"), None);
    // Below floor on its own.
    assert_eq!(wins.get("cheap"), None);
    assert_eq!(flaky.call_count(), 0);

    let history = engine.registry().position_history(AdPosition::Postroll);
    assert_eq!(history.slots_attempted, 1000);
    assert_eq!(history.slots_filled as usize, reliable_wins);
}

#[tokio::test]
async fn test_losing_bidder_stays_in_rotation() {
    let top = Arc::new(MockSource::new("top", 20.0, 1.0, "t.example", 23));
    let runner = Arc::new(MockSource::new("runner", 15.0, 1.0, "r.example", 29));
    let engine = build_engine(
        vec![registry_entry("top", 20.0, 0.9), registry_entry("runner", 15.0, 0.9)],
        &[top.clone(), runner.clone()],
        dec!(5),
    );

    for _ in 0..60 {
        let opp = Opportunity::new(AdPosition::Postroll, 30, "news", DeviceType::Desktop);
        let result = engine.handle_opportunity(&opp).await.unwrap();
        let winner = result.per_slot_winner[0].as_ref().unwrap();
        assert_eq!(winner.source, "top");
        // Second price holds only while the runner keeps being asked.
        assert_eq!(winner.clearing_price, dec!(15.01));
    }

    assert_eq!(runner.call_count(), 60);
    let stats = engine.predictor().stats();
    assert!(stats.sources_with_baseline.contains(&"runner".to_string()));
}

#[tokio::test]
async fn test_single_bid_clears_at_haircut() {
    let solo = Arc::new(MockSource::new("solo", 12.0, 1.0, "s.example", 3));
    let engine = build_engine(vec![registry_entry("solo", 12.0, 0.9)], &[solo], dec!(8));

    let opp = Opportunity::new(AdPosition::Postroll, 30, "news", DeviceType::Desktop);
    let result = engine.handle_opportunity(&opp).await.unwrap();

    let winner = result.per_slot_winner[0].as_ref().unwrap();
    assert_eq!(winner.bid_price, dec!(12));
    assert_eq!(winner.clearing_price, dec!(11.40));
    assert_eq!(result.total_revenue, dec!(11.40));
}

#[tokio::test]
async fn test_stalled_advisor_always_yields_valid_strategy() {
    let registry: Arc<dyn DemandRegistry> = Arc::new(InMemoryRegistry::new(vec![
        registry_entry("alpha", 9.0, 0.9),
        registry_entry("beta", 6.0, 0.6),
    ]));
    let predictor = Arc::new(FillRatePredictor::new(PredictorConfig::default()));
    let planner = planner(Arc::new(StalledAdvisor), registry.clone(), predictor, dec!(4));

    let positions = [AdPosition::Preroll, AdPosition::Midroll, AdPosition::Postroll];
    let devices = [DeviceType::Ctv, DeviceType::Mobile, DeviceType::Desktop, DeviceType::Tablet];
    let opportunities: Vec<Opportunity> = (0..100u32)
        .map(|i| {
            Opportunity::new(
                positions[i as usize % positions.len()],
                (i * 7) % 121,
                "sports",
                devices[i as usize % devices.len()],
            )
        })
        .collect();

    let strategies = join_all(opportunities.iter().map(|o| planner.build_strategy(o))).await;
    assert_eq!(strategies.len(), 100);

    for (opp, strategy) in opportunities.iter().zip(strategies) {
        let s = strategy.unwrap();
        assert_eq!(s.origin, StrategyOrigin::Fallback);
        assert_eq!(s.status, PodStatus::Building);
        assert_eq!(s.opportunity_id, opp.id);
        assert!((1..=3).contains(&s.slots.len()));
        assert!((0.0..=1.0).contains(&s.expected_completion));
        assert!(s.expected_revenue >= Decimal::ZERO);

        for (i, slot) in s.slots.iter().enumerate() {
            assert_eq!(slot.index, i);
            assert!((5..=30).contains(&slot.duration_secs));
            assert!(slot.floor >= dec!(0.50) && slot.floor <= dec!(50));
            assert!((400..=3000).contains(&slot.timeout_ms));
            assert!(!slot.candidates.is_empty());
            for c in &slot.candidates {
                assert!(registry.contains(&c.source));
                assert!(c.timeout_ms <= slot.timeout_ms);
            }
        }

        let json = serde_json::to_value(&s).unwrap();
        assert!(json["slots"].is_array());
        assert_eq!(json["origin"], "fallback");
    }
}

#[tokio::test]
async fn test_advertiser_excluded_after_winning() {
    let alpha = Arc::new(MockSource::new("alpha", 15.0, 1.0, "x.example", 5));
    let beta = Arc::new(MockSource::new("beta", 9.0, 1.0, "y.example", 9));
    let engine = build_engine(
        vec![registry_entry("alpha", 15.0, 0.9), registry_entry("beta", 9.0, 0.9)],
        &[alpha.clone(), beta.clone()],
        dec!(5),
    );

    // Midroll ≥ 60s falls back to two 30s slots.
    let opp = Opportunity::new(AdPosition::Midroll, 60, "news", DeviceType::Desktop);
    let result = engine.handle_opportunity(&opp).await.unwrap();

    assert_eq!(result.slots_attempted, 2);
    assert_eq!(result.slots_filled, 2);

    let first = result.per_slot_winner[0].as_ref().unwrap();
    assert_eq!(first.advertiser_domain, "x.example");
    assert_eq!(first.clearing_price, dec!(9.01));

    let second = result.per_slot_winner[1].as_ref().unwrap();
    assert_eq!(second.advertiser_domain, "y.example");
    assert_eq!(second.clearing_price, dec!(8.55));

    let requests = alpha.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].excluded_advertisers.is_empty());
    assert_eq!(requests[1].excluded_advertisers, vec!["x.example".to_string()]);
}

#[tokio::test]
async fn test_failing_source_does_not_sink_pod() {
    let broken = Arc::new(MockSource::new("broken", 30.0, 1.0, "b.example", 17));
    broken.set_error("connection reset");
    let steady = Arc::new(MockSource::new("steady", 7.0, 1.0, "s.example", 19));

    let engine = build_engine(
        vec![registry_entry("broken", 30.0, 0.9), registry_entry("steady", 7.0, 0.9)],
        &[broken.clone(), steady],
        dec!(4),
    );

    let opp = Opportunity::new(AdPosition::Postroll, 30, "news", DeviceType::Desktop);
    let result = engine.handle_opportunity(&opp).await.unwrap();

    assert_eq!(broken.call_count(), 1);
    let winner = result.per_slot_winner[0].as_ref().unwrap();
    assert_eq!(winner.source, "steady");
    assert_eq!(winner.clearing_price, dec!(6.65));

    // Errors count against the source's fill rate.
    assert!(engine.registry().get("broken").unwrap().fill_rate < 0.9);
}

#[tokio::test]
async fn test_fallback_plan_is_deterministic() {
    let registry: Arc<dyn DemandRegistry> = Arc::new(InMemoryRegistry::new(vec![
        registry_entry("alpha", 9.0, 0.9),
        registry_entry("beta", 6.0, 0.6),
        registry_entry("gamma", 3.0, 0.7),
    ]));
    let predictor = Arc::new(FillRatePredictor::new(PredictorConfig::default()));
    let planner = planner(Arc::new(NullAdvisor), registry, predictor, dec!(6));

    let opp = Opportunity::new(AdPosition::Preroll, 45, "news", DeviceType::Ctv);
    let a = planner.build_strategy(&opp).await.unwrap();
    let b = planner.build_strategy(&opp).await.unwrap();

    let shape = |s: &adpod::types::PodStrategy| {
        s.slots
            .iter()
            .map(|slot| {
                (
                    slot.duration_secs,
                    slot.floor,
                    slot.timeout_ms,
                    slot.source_names().iter().map(|n| n.to_string()).collect::<Vec<_>>(),
                )
            })
            .collect::<Vec<_>>()
    };

    assert_eq!(shape(&a), shape(&b));
    assert_eq!(a.slots.len(), 2);
    assert_eq!(a.slots[0].duration_secs, 15);
    assert_eq!(a.slots[1].duration_secs, 30);
    assert_eq!(a.slots[0].floor, dec!(7.50));
}

// ---------------------------------------------------------------------------
// Learning stability
// ---------------------------------------------------------------------------

#[test]
fn test_randomized_outcomes_respect_capacity() {
    let predictor = FillRatePredictor::new(PredictorConfig {
        capacity: 500,
        ..PredictorConfig::default()
    });
    let mut rng = StdRng::seed_from_u64(42);
    let positions = [AdPosition::Preroll, AdPosition::Midroll, AdPosition::Postroll];
    let devices = [DeviceType::Ctv, DeviceType::Mobile, DeviceType::Desktop];
    let categories = ["news", "sports", "kids"];

    for i in 0..10_000u64 {
        let opp = Opportunity::new(
            positions[rng.gen_range(0..positions.len())],
            30,
            categories[rng.gen_range(0..categories.len())],
            devices[rng.gen_range(0..devices.len())],
        );
        let source = format!("src-{}", rng.gen_range(0..5));
        let ctx = PredictionContext::for_source(&opp, &source, dec!(5));
        let filled = rng.gen_bool(0.4);
        let price = filled.then(|| rng.gen_range(0.0..30.0));
        let latency = (i % 7 != 0).then(|| rng.gen_range(0.0..1500.0));

        predictor.record_outcome(ctx, filled, price, latency);
        assert!(predictor.len() <= 500);
    }

    let stats = predictor.stats();
    assert_eq!(stats.records, 500);
    assert_eq!(stats.appended, 10_000);
    assert!((0.0..=1.0).contains(&stats.global_fill_rate));
}

#[test]
fn test_prediction_bounded_at_extreme_floor() {
    let predictor = FillRatePredictor::new(PredictorConfig::default());
    let source = registry_entry("alpha", 9.0, 0.95);
    let opp = Opportunity::new(AdPosition::Midroll, 30, "news", DeviceType::Ctv);
    let ctx = PredictionContext::for_source(&opp, "alpha", dec!(1000));

    let p = predictor.predict(&source, &ctx);
    assert!((0.0..=1.0).contains(&p.probability));
    assert_eq!(p.probability, 0.0);
    assert_eq!(p.recommendation, Recommendation::Skip);
    assert!(p.expected_price.is_finite());
}
