//! Mock demand source for integration testing.
//!
//! Provides a deterministic `DemandClient` that bids with a fixed
//! probability, at a fixed price, and records every request it receives,
//! all in-memory with no external dependencies.

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use adpod::dispatch::wire::{BidRequest, BidResponse, SimpleBid};
use adpod::dispatch::DemandClient;
use adpod::registry::DemandSource;

/// A mock demand source.
///
/// Bids `price` with probability `fill_rate`; otherwise answers no-bid.
/// Honors the request's advertiser exclusions like a compliant bidder.
pub struct MockSource {
    name: String,
    price: f64,
    fill_rate: f64,
    advertiser: String,
    rng: Mutex<StdRng>,
    requests: Arc<Mutex<Vec<BidRequest>>>,
    /// If set, every call fails with this message.
    force_error: Mutex<Option<String>>,
}

impl MockSource {
    pub fn new(name: &str, price: f64, fill_rate: f64, advertiser: &str, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            price,
            fill_rate,
            advertiser: advertiser.to_string(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            requests: Arc::new(Mutex::new(Vec::new())),
            force_error: Mutex::new(None),
        }
    }

    /// Force all subsequent calls to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock() = Some(msg.to_string());
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<BidRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl DemandClient for MockSource {
    async fn request_bid(&self, request: &BidRequest) -> Result<Option<BidResponse>> {
        self.requests.lock().push(request.clone());

        if let Some(msg) = self.force_error.lock().clone() {
            bail!("{msg}");
        }

        if request.excluded_advertisers.contains(&self.advertiser) {
            return Ok(None);
        }

        let roll: f64 = self.rng.lock().gen();
        if roll >= self.fill_rate {
            return Ok(None);
        }

        Ok(Some(BidResponse::Simple(SimpleBid {
            price: self.price,
            creative_ref: format!("<VAST version=\"4.0\"><Ad id=\"{}\"/></VAST>", self.name),
            advertiser_domain: self.advertiser.clone(),
            category: "IAB1".to_string(),
            deal_id: None,
        })))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Registry entry matching a mock source.
pub fn registry_entry(name: &str, avg_price: f64, fill_rate: f64) -> DemandSource {
    DemandSource {
        name: name.to_string(),
        endpoint: format!("https://{name}.example/bid"),
        avg_price,
        fill_rate,
        avg_latency_ms: 50.0,
        accepted_durations: vec![15, 30],
        categories: Vec::new(),
        timeout_ms: 500,
        enabled: true,
    }
}
