//! Per-slot auction.
//!
//! Filters bids against the pod's competitive-separation set, drops those
//! under the floor, scores the rest, and prices the winner under a
//! second-price rule:
//!
//! ```text
//! score    = 0.70 × price/max_price + 0.20 × source_fill + 0.10 × latency_score
//! clearing = second_highest + 0.01      (≥ 2 bids at or above the floor)
//!          = 0.95 × price               (single bid)
//!          capped at the winner's own price
//! ```

use rust_decimal::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::config::AuctionConfig;
use crate::error::AuctionError;
use crate::types::{f, Bid, Slot, SlotFailure, SlotResolution, WinningBid};

// ---------------------------------------------------------------------------
// Exclusions
// ---------------------------------------------------------------------------

/// Advertiser domains and categories already sold in this pod.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExclusionSet {
    advertisers: BTreeSet<String>,
    categories: BTreeSet<String>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every domain and category a winner declared. Empty fields
    /// are not exclusions.
    pub fn add_winner(&mut self, bid: &Bid) {
        self.advertisers.extend(bid.domains().map(str::to_lowercase));
        self.categories.extend(bid.categories().map(str::to_lowercase));
    }

    /// True when any declared domain or category is already taken.
    pub fn excludes(&self, bid: &Bid) -> bool {
        bid.domains().any(|d| self.advertisers.contains(&d.to_lowercase()))
            || bid.categories().any(|c| self.categories.contains(&c.to_lowercase()))
    }

    /// True when every one of `categories` is already taken. An empty list
    /// is never fully excluded.
    pub fn covers_categories(&self, categories: &[String]) -> bool {
        !categories.is_empty()
            && categories
                .iter()
                .all(|c| self.categories.contains(&c.trim().to_lowercase()))
    }

    pub fn advertisers(&self) -> Vec<String> {
        self.advertisers.iter().cloned().collect()
    }

    pub fn categories(&self) -> Vec<String> {
        self.categories.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.advertisers.is_empty() && self.categories.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Auctioneer
// ---------------------------------------------------------------------------

/// How eligible bids are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    /// Price, source fill rate and latency blended.
    Weighted,
    /// Highest price wins. Used for federated exchange bids.
    PriceOnly,
}

#[derive(Debug, Clone)]
pub struct Auctioneer {
    config: AuctionConfig,
}

/// An eligible bid with its rank inputs. `arrival` is its position in the
/// arrival-ordered input.
struct Ranked<'a> {
    bid: &'a Bid,
    score: f64,
    arrival: usize,
}

impl Auctioneer {
    pub fn new(config: AuctionConfig) -> Self {
        Self { config }
    }

    /// Resolve a slot from bids in arrival order. `fill_rate` looks up the
    /// bidding source's current fill rate.
    pub fn evaluate(
        &self,
        slot: &Slot,
        bids: &[Bid],
        exclusions: &ExclusionSet,
        ranking: Ranking,
        fill_rate: &dyn Fn(&str) -> f64,
    ) -> SlotResolution {
        let eligible: Vec<(usize, &Bid)> = bids
            .iter()
            .enumerate()
            .filter(|(_, b)| {
                if b.price <= Decimal::ZERO {
                    debug!(slot = slot.index, source = %b.source, "Dropping non-positive bid");
                    return false;
                }
                if exclusions.excludes(b) {
                    debug!(
                        slot = slot.index,
                        source = %b.source,
                        advertiser = %b.advertiser_domain,
                        category = %b.category,
                        "Dropping excluded bid"
                    );
                    return false;
                }
                true
            })
            .collect();

        if eligible.is_empty() {
            let err = AuctionError::NoBidsForSlot { slot: slot.index };
            info!(received = bids.len(), "{err}");
            return SlotResolution::Failed {
                reason: SlotFailure::NoBids,
                best_price: None,
            };
        }

        // Bids under the floor cannot win or set the price.
        let qualified: Vec<(usize, &Bid)> = eligible
            .iter()
            .copied()
            .filter(|(_, b)| b.price >= slot.floor)
            .collect();

        if qualified.is_empty() {
            let best = eligible
                .iter()
                .map(|(_, b)| b.price)
                .max()
                .unwrap_or(Decimal::ZERO);
            let err = AuctionError::BelowFloor {
                slot: slot.index,
                best,
                floor: slot.floor,
            };
            info!(eligible = eligible.len(), "{err}");
            return SlotResolution::Failed {
                reason: SlotFailure::BelowFloor,
                best_price: Some(best),
            };
        }

        let max_price = qualified
            .iter()
            .map(|(_, b)| b.price)
            .max()
            .unwrap_or(Decimal::ONE);

        let mut ranked: Vec<Ranked> = qualified
            .iter()
            .map(|&(arrival, bid)| Ranked {
                bid,
                score: match ranking {
                    Ranking::Weighted => self.score(bid, max_price, fill_rate(&bid.source)),
                    Ranking::PriceOnly => f(bid.price),
                },
                arrival,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.bid.price.cmp(&a.bid.price))
                .then_with(|| a.arrival.cmp(&b.arrival))
        });

        let winner = &ranked[0];
        let clearing_price = self.clearing_price(winner.bid, &ranked);
        if clearing_price < slot.floor {
            warn!(
                slot = slot.index,
                clearing = format!("${:.2}", clearing_price),
                floor = format!("${:.2}", slot.floor),
                "Clearing price below floor"
            );
        }

        info!(
            slot = slot.index,
            source = %winner.bid.source,
            advertiser = %winner.bid.advertiser_domain,
            bid = format!("${:.2}", winner.bid.price),
            clearing = format!("${:.2}", clearing_price),
            score = format!("{:.3}", winner.score),
            eligible = ranked.len(),
            "Slot won"
        );

        SlotResolution::Filled(WinningBid {
            bid: winner.bid.clone(),
            clearing_price,
            score: winner.score,
            creative_payload: None,
            creative_fallback: false,
        })
    }

    fn score(&self, bid: &Bid, max_price: Decimal, fill_rate: f64) -> f64 {
        let c = &self.config;
        let normalized_price = if max_price > Decimal::ZERO {
            f(bid.price / max_price)
        } else {
            0.0
        };
        let ceiling = c.latency_ceiling_ms.max(1) as f64;
        let latency_score = (1.0 - bid.latency_ms as f64 / ceiling).max(0.0);
        c.price_weight * normalized_price
            + c.fill_weight * fill_rate.clamp(0.0, 1.0)
            + c.latency_weight * latency_score
    }

    fn clearing_price(&self, winner: &Bid, ranked: &[Ranked]) -> Decimal {
        let clearing = if ranked.len() >= 2 {
            let mut prices: Vec<Decimal> = ranked.iter().map(|r| r.bid.price).collect();
            prices.sort_by(|a, b| b.cmp(a));
            prices[1] + self.config.bid_increment
        } else {
            winner.price * self.config.single_bid_haircut
        };
        clearing.min(winner.price)
    }
}

impl Default for Auctioneer {
    fn default() -> Self {
        Self::new(AuctionConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
