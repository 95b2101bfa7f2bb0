//! ADPOD: real-time ad-pod auction and sequencing engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires registry → predictor → planner → executor, serves the HTTP
//! surface and runs until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use adpod::advisor::http::HttpAdvisor;
use adpod::advisor::{NullAdvisor, StrategyAdvisor};
use adpod::auction::Auctioneer;
use adpod::config::{self, AppConfig};
use adpod::dispatch::http::HttpDemandClient;
use adpod::dispatch::BidDispatcher;
use adpod::engine::creative::HttpCreativeFetcher;
use adpod::engine::federated::{ExchangeHandle, FederatedAuction};
use adpod::engine::pod::PodExecutor;
use adpod::engine::sink::{MemorySink, OutcomeSink, TracingSink};
use adpod::engine::PodEngine;
use adpod::learning::LearningLoop;
use adpod::planner::{PlannerConfig, StrategyPlanner};
use adpod::predictor::FillRatePredictor;
use adpod::registry::{DemandRegistry, InMemoryRegistry};
use adpod::server::{self, ServerState};

const BANNER: &str = r#"
    _    ____  ____   ___  ____
   / \  |  _ \|  _ \ / _ \|  _ \
  / _ \ | | | | |_) | | | | | | |
 / ___ \| |_| |  __/| |_| | |_| |
/_/   \_\____/|_|    \___/|____/

  Ad-pod auction & sequencing engine
  v0.1.0
"#;

/// How often the heartbeat logs registry/predictor state.
const HEARTBEAT_SECS: u64 = 60;

/// Recent pod results kept for `GET /api/pods`.
const RECENT_RESULTS: usize = 200;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("ADPOD_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        engine = %cfg.engine.name,
        sources = cfg.sources.len(),
        exchanges = cfg.exchanges.len(),
        "ADPOD starting up"
    );

    // -- Shared state ----------------------------------------------------

    let registry: Arc<dyn DemandRegistry> = Arc::new(InMemoryRegistry::from_settings(&cfg.sources));
    let predictor = Arc::new(FillRatePredictor::new(cfg.predictor.clone()));

    // -- Components ------------------------------------------------------

    let advisor = build_advisor(&cfg)?;

    let planner = StrategyPlanner::new(
        advisor,
        registry.clone(),
        predictor.clone(),
        PlannerConfig {
            advisor_timeout: Duration::from_millis(cfg.advisor.timeout_ms),
            default_timeout_ms: cfg.engine.default_timeout_ms,
            max_sources_per_slot: cfg.engine.max_sources_per_slot,
            revenue_targets: cfg.revenue_targets.clone(),
        },
    );

    let dispatcher = Arc::new(BidDispatcher::from_sources(&registry.snapshot())?);
    let creative = Arc::new(HttpCreativeFetcher::new(Duration::from_millis(
        cfg.creative.fetch_timeout_ms,
    ))?);

    let executor = PodExecutor::new(
        dispatcher,
        Auctioneer::new(cfg.auction.clone()),
        registry.clone(),
        LearningLoop::new(registry.clone(), predictor.clone()),
        creative.clone(),
    );

    let recent = Arc::new(MemorySink::new(RECENT_RESULTS));
    let mut engine = PodEngine::new(
        planner,
        executor,
        registry.clone(),
        predictor.clone(),
        cfg.revenue_targets.clone(),
    )
    .with_sink(Arc::new(TracingSink))
    .with_sink(recent.clone() as Arc<dyn OutcomeSink>);

    let exchanges = build_exchanges(&cfg)?;
    if !exchanges.is_empty() {
        info!(exchanges = exchanges.len(), "Exchange federation enabled");
        engine = engine.with_federation(FederatedAuction::new(
            exchanges,
            Auctioneer::new(cfg.auction.clone()),
            creative,
        ));
    }

    let engine = Arc::new(engine);

    // -- HTTP surface ----------------------------------------------------

    if cfg.server.enabled {
        let state = Arc::new(ServerState::new(engine.clone(), recent));
        let _server = server::spawn_server(state, cfg.server.port).await?;
    } else {
        warn!("HTTP server disabled; engine is idle");
    }

    // -- Main loop -------------------------------------------------------

    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_SECS));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(federation = engine.has_federation(), "Ready. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let stats = engine.predictor().stats();
                info!(
                    enabled_sources = engine.registry().enabled().len(),
                    records = stats.records,
                    global_fill_rate = format!("{:.3}", stats.global_fill_rate),
                    baselines = stats.sources_with_baseline.len(),
                    "Heartbeat"
                );
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    let stats = predictor.stats();
    info!(
        records = stats.records,
        appended = stats.appended,
        "ADPOD shut down cleanly."
    );

    Ok(())
}

/// HTTP advisor when an endpoint is configured, otherwise the fallback-only
/// null advisor.
fn build_advisor(cfg: &AppConfig) -> Result<Arc<dyn StrategyAdvisor>> {
    match &cfg.advisor.endpoint {
        Some(endpoint) => {
            let api_key = AppConfig::resolve_secret(cfg.advisor.api_key_env.as_deref());
            if api_key.is_none() {
                warn!("Advisor API key not set; calling without credentials");
            }
            info!(endpoint = %endpoint, model = ?cfg.advisor.model, "Using HTTP strategy advisor");
            Ok(Arc::new(HttpAdvisor::new(
                endpoint.clone(),
                api_key,
                cfg.advisor.model.clone(),
                Duration::from_millis(cfg.advisor.timeout_ms),
            )?))
        }
        None => {
            warn!("No strategy advisor configured; every pod uses the fallback plan");
            Ok(Arc::new(NullAdvisor))
        }
    }
}

/// Exchanges whose credentials resolve. Uncredentialed ones are skipped.
fn build_exchanges(cfg: &AppConfig) -> Result<Vec<ExchangeHandle>> {
    let mut handles = Vec::new();
    for ex in &cfg.exchanges {
        let Some(key) = AppConfig::resolve_secret(ex.api_key_env.as_deref()) else {
            warn!(exchange = %ex.name, "Exchange credentials missing, skipping");
            continue;
        };
        let client = HttpDemandClient::new(
            &ex.name,
            &ex.endpoint,
            Some(key),
            Duration::from_millis(ex.timeout_ms.max(1) * 2),
        )?;
        handles.push(ExchangeHandle {
            client: Arc::new(client),
            timeout_ms: ex.timeout_ms,
        });
    }
    Ok(handles)
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("adpod=info"));

    let json_logging = std::env::var("ADPOD_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
