//! Bid request / response wire types.
//!
//! Sources answer in one of two shapes: a seat-bid envelope (one or more
//! seats, each with bids) or a flat single bid. Both are normalised to
//! [`Bid`] through [`BidResponse::into_bids`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{d, AdPosition, Bid, CreativeRef, DeviceType, PrivacyFlags};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Per-slot request sent to every candidate source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidRequest {
    pub id: String,
    pub floor: Decimal,
    /// Slot duration in seconds.
    pub duration: u32,
    pub position: AdPosition,
    pub category: String,
    pub device: DeviceType,
    #[serde(default)]
    pub excluded_advertisers: Vec<String>,
    #[serde(default)]
    pub excluded_categories: Vec<String>,
    #[serde(default)]
    pub privacy: PrivacyFlags,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BidResponse {
    SeatBid(SeatBidResponse),
    Simple(SimpleBid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeatBidResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub seatbid: Vec<SeatBid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeatBid {
    #[serde(default)]
    pub seat: Option<String>,
    #[serde(default)]
    pub bid: Vec<SeatBidItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeatBidItem {
    pub price: f64,
    /// Inline markup.
    #[serde(default)]
    pub adm: Option<String>,
    /// Notice URL; used as the creative reference when `adm` is absent.
    #[serde(default)]
    pub nurl: Option<String>,
    #[serde(default)]
    pub adomain: Vec<String>,
    #[serde(default)]
    pub cat: Vec<String>,
    #[serde(default)]
    pub dealid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleBid {
    pub price: f64,
    pub creative_ref: String,
    #[serde(default)]
    pub advertiser_domain: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub deal_id: Option<String>,
}

impl BidResponse {
    /// Normalise into canonical bids. Seat bids carrying neither markup nor
    /// a notice URL are dropped.
    pub fn into_bids(self, source: &str, latency_ms: u64) -> Vec<Bid> {
        match self {
            BidResponse::Simple(b) => vec![Bid {
                source: source.to_string(),
                price: d(b.price),
                creative: CreativeRef::from_reference(&b.creative_ref),
                advertiser_domain: normalise(&b.advertiser_domain),
                category: normalise(&b.category),
                other_domains: Vec::new(),
                other_categories: Vec::new(),
                deal_id: b.deal_id,
                latency_ms,
            }],
            BidResponse::SeatBid(resp) => resp
                .seatbid
                .into_iter()
                .flat_map(|seat| seat.bid)
                .filter_map(|item| {
                    let creative = match (non_empty(item.adm), non_empty(item.nurl)) {
                        (Some(adm), _) => CreativeRef::Inline(adm),
                        (None, Some(url)) => CreativeRef::Url(url),
                        (None, None) => return None,
                    };
                    let (advertiser_domain, other_domains) = split_declared(&item.adomain);
                    let (category, other_categories) = split_declared(&item.cat);
                    Some(Bid {
                        source: source.to_string(),
                        price: d(item.price),
                        creative,
                        advertiser_domain,
                        category,
                        other_domains,
                        other_categories,
                        deal_id: item.dealid,
                        latency_ms,
                    })
                })
                .collect(),
        }
    }
}

fn normalise(s: &str) -> String {
    s.trim().to_lowercase()
}

/// First declared value plus the rest, normalised, blanks dropped.
fn split_declared(values: &[String]) -> (String, Vec<String>) {
    let mut declared = values.iter().map(|v| normalise(v)).filter(|v| !v.is_empty());
    let first = declared.next().unwrap_or_default();
    (first, declared.collect())
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}
