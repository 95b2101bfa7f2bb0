//! Bid dispatcher.
//!
//! Fans a slot's bid request out to every candidate source in parallel.
//! Each call is bounded by `min(candidate timeout, slot timeout)`; a timeout,
//! transport error or malformed body turns into a per-source outcome and
//! never affects the other sources.

pub mod http;
pub mod wire;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::AuctionError;
use crate::registry::DemandSource;
use crate::types::{Bid, Slot, SlotCandidate};

use self::http::HttpDemandClient;
use self::wire::{BidRequest, BidResponse};

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// One demand source endpoint.
#[async_trait]
pub trait DemandClient: Send + Sync {
    /// Ask for a bid. `Ok(None)` is an explicit no-bid.
    async fn request_bid(&self, request: &BidRequest) -> Result<Option<BidResponse>>;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Bids { bids: Vec<Bid>, latency_ms: u64 },
    NoBid { latency_ms: u64 },
    Timeout { timeout_ms: u64 },
    Error { message: String },
}

impl SourceOutcome {
    /// Observed (or lower-bound) latency, for the rolling latency average.
    pub fn latency_ms(&self) -> Option<f64> {
        match self {
            SourceOutcome::Bids { latency_ms, .. } | SourceOutcome::NoBid { latency_ms } => {
                Some(*latency_ms as f64)
            }
            SourceOutcome::Timeout { timeout_ms } => Some(*timeout_ms as f64),
            SourceOutcome::Error { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: String,
    pub outcome: SourceOutcome,
}

impl SourceResult {
    pub fn has_bid(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Bids { .. })
    }
}

/// Everything that came back for one slot.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub slot: usize,
    pub results: Vec<SourceResult>,
}

impl DispatchReport {
    /// All bids in arrival order (ties keep candidate order).
    pub fn bids(&self) -> Vec<Bid> {
        let mut bids: Vec<Bid> = self
            .results
            .iter()
            .filter_map(|r| match &r.outcome {
                SourceOutcome::Bids { bids, .. } => Some(bids.iter().cloned()),
                _ => None,
            })
            .flatten()
            .collect();
        bids.sort_by_key(|b| b.latency_ms);
        bids
    }

    pub fn count(&self, pred: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct BidDispatcher {
    clients: HashMap<String, Arc<dyn DemandClient>>,
}

impl BidDispatcher {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// One HTTP client per configured source.
    pub fn from_sources(sources: &[DemandSource]) -> Result<Self> {
        let mut dispatcher = Self::new();
        for s in sources {
            // Transport backstop well above any slot budget.
            let backstop = Duration::from_millis(s.timeout_ms.max(1) * 2);
            let client = HttpDemandClient::new(&s.name, &s.endpoint, None, backstop)?;
            dispatcher.register(Arc::new(client));
        }
        Ok(dispatcher)
    }

    pub fn register(&mut self, client: Arc<dyn DemandClient>) {
        self.clients.insert(client.name().to_string(), client);
    }

    pub fn has_client(&self, source: &str) -> bool {
        self.clients.contains_key(source)
    }

    /// Fan `request` out to the slot's candidates and wait for all of them.
    pub async fn dispatch(&self, slot: &Slot, request: &BidRequest) -> DispatchReport {
        let calls = slot
            .candidates
            .iter()
            .map(|c| self.call_one(c, slot.timeout_ms, request));
        let results = join_all(calls).await;

        let report = DispatchReport {
            slot: slot.index,
            results,
        };

        info!(
            slot = slot.index,
            sources = report.results.len(),
            bids = report.count(|o| matches!(o, SourceOutcome::Bids { .. })),
            no_bid = report.count(|o| matches!(o, SourceOutcome::NoBid { .. })),
            timeouts = report.count(|o| matches!(o, SourceOutcome::Timeout { .. })),
            errors = report.count(|o| matches!(o, SourceOutcome::Error { .. })),
            "Slot bids collected"
        );

        report
    }

    async fn call_one(
        &self,
        candidate: &SlotCandidate,
        slot_timeout_ms: u64,
        request: &BidRequest,
    ) -> SourceResult {
        let source = candidate.source.clone();
        let Some(client) = self.clients.get(&source) else {
            let err = AuctionError::SourceError {
                source_name: source.clone(),
                message: "no client registered".into(),
            };
            warn!(error = %err, "Skipping source");
            return SourceResult {
                source,
                outcome: SourceOutcome::Error {
                    message: err.to_string(),
                },
            };
        };

        let timeout_ms = candidate.timeout_ms.min(slot_timeout_ms);
        settle(source, timeout_ms, client.request_bid(request)).await
    }
}

/// Await one source call under `timeout_ms` and classify what came back.
/// Shared by the slot dispatcher and the exchange federation.
pub async fn settle<F>(source: String, timeout_ms: u64, call: F) -> SourceResult
where
    F: Future<Output = Result<Option<BidResponse>>>,
{
    let started = Instant::now();
    let result = tokio::time::timeout(Duration::from_millis(timeout_ms), call).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    let outcome = match result {
        Ok(Ok(Some(resp))) => {
            let bids = resp.into_bids(&source, latency_ms);
            if bids.is_empty() {
                SourceOutcome::NoBid { latency_ms }
            } else {
                debug!(source = %source, bids = bids.len(), latency_ms, "Bids received");
                SourceOutcome::Bids { bids, latency_ms }
            }
        }
        Ok(Ok(None)) => SourceOutcome::NoBid { latency_ms },
        Ok(Err(e)) => {
            let err = AuctionError::SourceError {
                source_name: source.clone(),
                message: format!("{e:#}"),
            };
            warn!(error = %err, "Source failed, treating as no bid");
            SourceOutcome::Error {
                message: err.to_string(),
            }
        }
        Err(_) => {
            let err = AuctionError::SourceTimeout {
                source_name: source.clone(),
                timeout_ms,
            };
            warn!(error = %err, "Source timed out, treating as no bid");
            SourceOutcome::Timeout { timeout_ms }
        }
    };

    SourceResult { source, outcome }
}

impl Default for BidDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
