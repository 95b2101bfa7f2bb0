//! Federated exchange auction.
//!
//! One unified request per opportunity goes to every credentialed exchange
//! at once. All calls are allowed to settle (answer, fail or time out), the
//! seat bids are flattened into one list, and the highest price wins under
//! the usual second-price rule.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::creative::{resolve_creative, CreativeFetcher};
use crate::auction::{Auctioneer, ExclusionSet, Ranking};
use crate::dispatch::http::HttpDemandClient;
use crate::dispatch::wire::BidResponse;
use crate::dispatch::{settle, DispatchReport};
use crate::types::{AdPosition, DeviceType, Opportunity, Slot, SlotCandidate, SlotResolution};

const MIN_SLOT_SECS: u32 = 5;
const MAX_SLOT_SECS: u32 = 30;

// ---------------------------------------------------------------------------
// Unified payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRequest {
    pub id: String,
    pub imp: Vec<Impression>,
    pub device: DeviceInfo,
    pub content: ContentInfo,
    pub regs: Regs,
    /// Max time the exchange may take, in ms.
    pub tmax: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impression {
    pub id: String,
    pub video: VideoConstraints,
    pub bidfloor: Decimal,
    pub bidfloorcur: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConstraints {
    pub minduration: u32,
    pub maxduration: u32,
    /// 0 pre-roll, -1 mid-roll, -2 post-roll.
    pub startdelay: i32,
    pub mimes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub devicetype: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub cat: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regs {
    pub coppa: u8,
    pub gdpr: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub us_privacy: Option<String>,
}

fn device_code(device: DeviceType) -> u8 {
    match device {
        DeviceType::Mobile => 4,
        DeviceType::Tablet => 5,
        DeviceType::Desktop => 2,
        DeviceType::Ctv => 3,
        DeviceType::Tv => 7,
        DeviceType::Other => 6,
    }
}

fn start_delay(position: AdPosition) -> i32 {
    match position {
        AdPosition::Preroll => 0,
        AdPosition::Midroll => -1,
        AdPosition::Postroll => -2,
    }
}

impl UnifiedRequest {
    pub fn for_opportunity(opportunity: &Opportunity, duration_secs: u32, floor: Decimal, tmax: u64) -> Self {
        Self {
            id: opportunity.id.clone(),
            imp: vec![Impression {
                id: "1".to_string(),
                video: VideoConstraints {
                    minduration: MIN_SLOT_SECS.min(duration_secs),
                    maxduration: duration_secs,
                    startdelay: start_delay(opportunity.position),
                    mimes: vec!["video/mp4".to_string()],
                },
                bidfloor: floor,
                bidfloorcur: "USD".to_string(),
            }],
            device: DeviceInfo {
                devicetype: device_code(opportunity.device),
            },
            content: ContentInfo {
                cat: vec![opportunity.content_category.to_lowercase()],
            },
            regs: Regs {
                coppa: opportunity.privacy.coppa as u8,
                gdpr: opportunity.privacy.gdpr as u8,
                us_privacy: opportunity.privacy.us_privacy.clone(),
            },
            tmax,
        }
    }
}

// ---------------------------------------------------------------------------
// Exchange client
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn request(&self, payload: &UnifiedRequest) -> Result<Option<BidResponse>>;

    fn name(&self) -> &str;
}

#[async_trait]
impl ExchangeClient for HttpDemandClient {
    async fn request(&self, payload: &UnifiedRequest) -> Result<Option<BidResponse>> {
        self.post(payload).await
    }

    fn name(&self) -> &str {
        crate::dispatch::DemandClient::name(self)
    }
}

// ---------------------------------------------------------------------------
// Federation
// ---------------------------------------------------------------------------

pub struct ExchangeHandle {
    pub client: Arc<dyn ExchangeClient>,
    pub timeout_ms: u64,
}

pub struct FederatedAuction {
    exchanges: Vec<ExchangeHandle>,
    auctioneer: Auctioneer,
    creative: Arc<dyn CreativeFetcher>,
}

impl FederatedAuction {
    pub fn new(
        exchanges: Vec<ExchangeHandle>,
        auctioneer: Auctioneer,
        creative: Arc<dyn CreativeFetcher>,
    ) -> Self {
        Self {
            exchanges,
            auctioneer,
            creative,
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.len()
    }

    /// Sell one slot across all exchanges. The returned slot is resolved.
    pub async fn run(&self, opportunity: &Opportunity, floor: Decimal) -> (Slot, DispatchReport) {
        let duration = opportunity.available_secs.clamp(MIN_SLOT_SECS, MAX_SLOT_SECS);
        let tmax = self.exchanges.iter().map(|e| e.timeout_ms).max().unwrap_or(0);

        let mut slot = Slot::new(0, duration, floor, tmax);
        slot.candidates = self
            .exchanges
            .iter()
            .map(|e| SlotCandidate {
                source: e.client.name().to_string(),
                timeout_ms: e.timeout_ms,
            })
            .collect();

        let payload = UnifiedRequest::for_opportunity(opportunity, duration, floor, tmax);
        slot.mark_dispatched();

        let calls = self.exchanges.iter().map(|e| {
            settle(
                e.client.name().to_string(),
                e.timeout_ms,
                e.client.request(&payload),
            )
        });
        let report = DispatchReport {
            slot: 0,
            results: join_all(calls).await,
        };

        let bids = report.bids();
        info!(
            opportunity_id = %opportunity.id,
            exchanges = self.exchanges.len(),
            bids = bids.len(),
            "Exchange bids settled"
        );

        let no_fill = |_: &str| 0.0;
        let mut resolution =
            self.auctioneer
                .evaluate(&slot, &bids, &ExclusionSet::new(), Ranking::PriceOnly, &no_fill);

        if let SlotResolution::Filled(winner) = &mut resolution {
            resolve_creative(self.creative.as_ref(), winner).await;
        }
        slot.resolve(resolution);

        (slot, report)
    }
}
