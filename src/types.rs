//! Shared types for the ADPOD engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that registry, predictor, planner
//! and engine modules can depend on them without circular references.
//!
//! Money that changes hands (bid prices, floors, clearing prices, revenue)
//! is `Decimal`. Rolling statistics (average prices, fill rates, latencies)
//! are `f64`.

use chrono::{DateTime, Datelike, Timelike, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Convert an `f64` into a `Decimal`, falling back to zero for NaN/inf.
pub fn d(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Convert a `Decimal` into an `f64` (zero if unrepresentable).
pub fn f(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Where in the content the ad break sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdPosition {
    Preroll,
    Midroll,
    Postroll,
}

impl AdPosition {
    pub const ALL: &'static [AdPosition] =
        &[AdPosition::Preroll, AdPosition::Midroll, AdPosition::Postroll];
}

impl fmt::Display for AdPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdPosition::Preroll => write!(f, "preroll"),
            AdPosition::Midroll => write!(f, "midroll"),
            AdPosition::Postroll => write!(f, "postroll"),
        }
    }
}

impl std::str::FromStr for AdPosition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "preroll" | "pre-roll" | "pre" => Ok(AdPosition::Preroll),
            "midroll" | "mid-roll" | "mid" => Ok(AdPosition::Midroll),
            "postroll" | "post-roll" | "post" => Ok(AdPosition::Postroll),
            _ => Err(anyhow::anyhow!("Unknown ad position: {s}")),
        }
    }
}

/// Viewer device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Ctv,
    Tv,
    Desktop,
    Mobile,
    Tablet,
    #[serde(other)]
    Other,
}

impl DeviceType {
    /// Living-room screens command a premium.
    pub fn is_tv(&self) -> bool {
        matches!(self, DeviceType::Ctv | DeviceType::Tv)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceType::Ctv => "ctv",
            DeviceType::Tv => "tv",
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Other => "other",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// Privacy signals forwarded to demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrivacyFlags {
    #[serde(default)]
    pub coppa: bool,
    #[serde(default)]
    pub gdpr: bool,
    #[serde(default)]
    pub us_privacy: Option<String>,
}

/// One ad break to be monetised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(default = "new_id")]
    pub id: String,
    pub position: AdPosition,
    /// Seconds of ad time available in the break.
    pub available_secs: u32,
    pub content_category: String,
    pub device: DeviceType,
    /// Caller's estimate of the viewer's value (1.0 = average).
    #[serde(default = "default_user_value")]
    pub user_value: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub privacy: PrivacyFlags,
}

fn default_user_value() -> f64 {
    1.0
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}s on {} ({})",
            self.id, self.position, self.available_secs, self.device, self.content_category,
        )
    }
}

impl Opportunity {
    pub fn new(
        position: AdPosition,
        available_secs: u32,
        content_category: &str,
        device: DeviceType,
    ) -> Self {
        Self {
            id: new_id(),
            position,
            available_secs,
            content_category: content_category.to_string(),
            device,
            user_value: 1.0,
            timestamp: Utc::now(),
            privacy: PrivacyFlags::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bids
// ---------------------------------------------------------------------------

/// How the creative travels with a bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum CreativeRef {
    /// Markup delivered inline with the bid.
    Inline(String),
    /// Only a notification / creative URL; must be fetched.
    Url(String),
}

impl CreativeRef {
    /// Classify a bare creative reference string.
    pub fn from_reference(reference: &str) -> Self {
        let trimmed = reference.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            CreativeRef::Url(trimmed.to_string())
        } else {
            CreativeRef::Inline(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CreativeRef::Inline(s) | CreativeRef::Url(s) => s,
        }
    }
}

/// Canonical bid, normalised from whatever shape the source answered with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub source: String,
    /// CPM.
    pub price: Decimal,
    pub creative: CreativeRef,
    /// Lower-cased advertiser domain; empty when the source did not say.
    pub advertiser_domain: String,
    /// Lower-cased competitive category; empty when the source did not say.
    pub category: String,
    /// Further declared advertiser domains beyond the first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_domains: Vec<String>,
    /// Further declared categories beyond the first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_categories: Vec<String>,
    pub deal_id: Option<String>,
    pub latency_ms: u64,
}

impl Bid {
    /// Every non-empty advertiser domain the bid declares.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.advertiser_domain.as_str())
            .chain(self.other_domains.iter().map(String::as_str))
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Every non-empty category the bid declares.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.category.as_str())
            .chain(self.other_categories.iter().map(String::as_str))
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ${:.2} {} [{}] ({}ms)",
            self.source, self.price, self.advertiser_domain, self.category, self.latency_ms,
        )
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// A source invited to bid on a slot, with its effective timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotCandidate {
    pub source: String,
    pub timeout_ms: u64,
}

/// Why a slot went unfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotFailure {
    NoBids,
    BelowFloor,
}

impl fmt::Display for SlotFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotFailure::NoBids => write!(f, "no bids"),
            SlotFailure::BelowFloor => write!(f, "all bids below floor"),
        }
    }
}

/// `Pending → Dispatched → {Filled | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Pending,
    Dispatched,
    Filled,
    Failed(SlotFailure),
}

/// The bid that won a slot and what it pays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinningBid {
    pub bid: Bid,
    pub clearing_price: Decimal,
    pub score: f64,
    /// Resolved creative payload, if it had to be fetched.
    pub creative_payload: Option<String>,
    /// Set when the creative fetch failed and a fallback descriptor was used.
    pub creative_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotResolution {
    Filled(WinningBid),
    Failed {
        reason: SlotFailure,
        best_price: Option<Decimal>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub index: usize,
    pub duration_secs: u32,
    pub floor: Decimal,
    pub timeout_ms: u64,
    pub candidates: Vec<SlotCandidate>,
    pub status: SlotStatus,
    pub resolution: Option<SlotResolution>,
}

impl Slot {
    pub fn new(index: usize, duration_secs: u32, floor: Decimal, timeout_ms: u64) -> Self {
        Self {
            index,
            duration_secs,
            floor,
            timeout_ms,
            candidates: Vec::new(),
            status: SlotStatus::Pending,
            resolution: None,
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.source.as_str()).collect()
    }

    pub fn mark_dispatched(&mut self) {
        if self.status == SlotStatus::Pending {
            self.status = SlotStatus::Dispatched;
        }
    }

    /// Record the outcome. A slot resolves exactly once; later calls are
    /// ignored and return `false`.
    pub fn resolve(&mut self, resolution: SlotResolution) -> bool {
        if self.is_resolved() {
            return false;
        }
        self.status = match &resolution {
            SlotResolution::Filled(_) => SlotStatus::Filled,
            SlotResolution::Failed { reason, .. } => SlotStatus::Failed(*reason),
        };
        self.resolution = Some(resolution);
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn winner(&self) -> Option<&WinningBid> {
        match &self.resolution {
            Some(SlotResolution::Filled(w)) => Some(w),
            _ => None,
        }
    }

    /// Revenue earned by this slot (clearing price, zero when unfilled).
    pub fn revenue(&self) -> Decimal {
        self.winner().map(|w| w.clearing_price).unwrap_or(Decimal::ZERO)
    }
}

// ---------------------------------------------------------------------------
// Pod strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyOrigin {
    Advisor,
    Fallback,
    /// Single slot sold through the exchange federation.
    Federated,
}

/// `Building → Executing → Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodStatus {
    Building,
    Executing,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodStrategy {
    pub pod_id: String,
    pub opportunity_id: String,
    pub slots: Vec<Slot>,
    pub expected_revenue: Decimal,
    /// Expected fraction of slots that fill.
    pub expected_completion: f64,
    pub rationale: String,
    pub origin: StrategyOrigin,
    pub status: PodStatus,
}

impl PodStrategy {
    pub fn total_duration_secs(&self) -> u32 {
        self.slots.iter().map(|s| s.duration_secs).sum()
    }

    /// Sum of slot timeouts: the soft latency ceiling for the pod.
    pub fn latency_budget_ms(&self) -> u64 {
        self.slots.iter().map(|s| s.timeout_ms).sum()
    }
}

impl fmt::Display for PodStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape: Vec<String> = self
            .slots
            .iter()
            .map(|s| format!("{}s@${:.2}", s.duration_secs, s.floor))
            .collect();
        write!(
            f,
            "pod {} [{}] {:?} exp_rev=${:.2} exp_fill={:.0}%",
            self.pod_id,
            shape.join(", "),
            self.origin,
            self.expected_revenue,
            self.expected_completion * 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Call,
    Skip,
    ReduceTimeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillPrediction {
    pub probability: f64,
    pub expected_price: f64,
    pub expected_latency_ms: f64,
    pub confidence: f64,
    pub recommendation: Recommendation,
}

impl fmt::Display for FillPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P(fill)={:.0}% price=${:.2} latency={:.0}ms conf={:.0}% {:?}",
            self.probability * 100.0,
            self.expected_price,
            self.expected_latency_ms,
            self.confidence * 100.0,
            self.recommendation,
        )
    }
}

/// Feature snapshot for one (source, slot) pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionContext {
    pub source: String,
    /// 0–23.
    pub hour: u32,
    /// 0 = Monday.
    pub weekday: u32,
    /// 1–12.
    pub month: u32,
    pub device: DeviceType,
    pub content_category: String,
    pub position: AdPosition,
    pub floor: f64,
}

impl PredictionContext {
    pub fn for_source(opportunity: &Opportunity, source: &str, floor: Decimal) -> Self {
        let ts = opportunity.timestamp;
        Self {
            source: source.to_string(),
            hour: ts.hour(),
            weekday: ts.weekday().num_days_from_monday(),
            month: ts.month(),
            device: opportunity.device,
            content_category: opportunity.content_category.to_lowercase(),
            position: opportunity.position,
            floor: f(floor),
        }
    }
}

/// One observed (context → outcome) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub context: PredictionContext,
    pub filled: bool,
    pub price: Option<f64>,
    pub latency_ms: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Position history
// ---------------------------------------------------------------------------

/// Running per-position performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionHistory {
    pub slots_attempted: u64,
    pub slots_filled: u64,
    /// Running mean revenue per attempted slot.
    pub mean_revenue: f64,
}

impl PositionHistory {
    pub fn record(&mut self, revenue: f64, filled: bool) {
        self.slots_attempted += 1;
        if filled {
            self.slots_filled += 1;
        }
        self.mean_revenue += (revenue - self.mean_revenue) / self.slots_attempted as f64;
    }

    pub fn fill_rate(&self) -> f64 {
        if self.slots_attempted == 0 {
            0.0
        } else {
            self.slots_filled as f64 / self.slots_attempted as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Pod result (outcome sink payload)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotWinnerSummary {
    pub slot: usize,
    pub source: String,
    pub advertiser_domain: String,
    pub category: String,
    pub bid_price: Decimal,
    pub clearing_price: Decimal,
    pub creative_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodResult {
    pub pod_id: String,
    pub opportunity_id: String,
    pub origin: StrategyOrigin,
    pub slots_attempted: usize,
    pub slots_filled: usize,
    pub total_revenue: Decimal,
    pub per_slot_winner: Vec<Option<SlotWinnerSummary>>,
    pub failure_reasons: Vec<String>,
    /// Filled slots whose creative had to be substituted.
    pub creative_fallbacks: usize,
    pub completed_at: DateTime<Utc>,
}

impl PodResult {
    /// Summarise a completed strategy.
    pub fn from_strategy(strategy: &PodStrategy) -> Self {
        let mut per_slot_winner = Vec::with_capacity(strategy.slots.len());
        let mut failure_reasons = Vec::new();
        let mut creative_fallbacks = 0;

        for slot in &strategy.slots {
            match &slot.resolution {
                Some(SlotResolution::Filled(w)) => {
                    if w.creative_fallback {
                        creative_fallbacks += 1;
                    }
                    per_slot_winner.push(Some(SlotWinnerSummary {
                        slot: slot.index,
                        source: w.bid.source.clone(),
                        advertiser_domain: w.bid.advertiser_domain.clone(),
                        category: w.bid.category.clone(),
                        bid_price: w.bid.price,
                        clearing_price: w.clearing_price,
                        creative_fallback: w.creative_fallback,
                    }));
                }
                Some(SlotResolution::Failed { reason, .. }) => {
                    failure_reasons.push(format!("slot {}: {reason}", slot.index));
                    per_slot_winner.push(None);
                }
                None => {
                    failure_reasons.push(format!("slot {}: not executed", slot.index));
                    per_slot_winner.push(None);
                }
            }
        }

        Self {
            pod_id: strategy.pod_id.clone(),
            opportunity_id: strategy.opportunity_id.clone(),
            origin: strategy.origin,
            slots_attempted: strategy.slots.iter().filter(|s| s.is_resolved()).count(),
            slots_filled: per_slot_winner.iter().filter(|w| w.is_some()).count(),
            total_revenue: strategy.slots.iter().map(|s| s.revenue()).sum(),
            per_slot_winner,
            failure_reasons,
            creative_fallbacks,
            completed_at: Utc::now(),
        }
    }
}

impl fmt::Display for PodResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pod {} filled {}/{} revenue=${:.2}",
            self.pod_id, self.slots_filled, self.slots_attempted, self.total_revenue,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_bid(source: &str, price: Decimal) -> Bid {
        Bid {
            source: source.to_string(),
            price,
            creative: CreativeRef::Inline("<VAST/>".into()),
            advertiser_domain: "acme.example".into(),
            category: "iab2".into(),
            other_domains: Vec::new(),
            other_categories: Vec::new(),
            deal_id: None,
            latency_ms: 120,
        }
    }

    #[test]
    fn test_position_from_str() {
        assert_eq!("Midroll".parse::<AdPosition>().unwrap(), AdPosition::Midroll);
        assert_eq!("pre-roll".parse::<AdPosition>().unwrap(), AdPosition::Preroll);
        assert!("sideroll".parse::<AdPosition>().is_err());
    }

    #[test]
    fn test_device_is_tv() {
        assert!(DeviceType::Ctv.is_tv());
        assert!(DeviceType::Tv.is_tv());
        assert!(!DeviceType::Mobile.is_tv());
    }

    #[test]
    fn test_unknown_device_deserializes_as_other() {
        let dev: DeviceType = serde_json::from_str("\"fridge\"").unwrap();
        assert_eq!(dev, DeviceType::Other);
    }

    #[test]
    fn test_creative_ref_classification() {
        assert_eq!(
            CreativeRef::from_reference("https://cdn.example/ad.xml"),
            CreativeRef::Url("https://cdn.example/ad.xml".into())
        );
        assert_eq!(
            CreativeRef::from_reference("creative-42"),
            CreativeRef::Inline("creative-42".into())
        );
    }

    #[test]
    fn test_slot_resolves_once() {
        let mut slot = Slot::new(0, 30, dec!(5), 1000);
        slot.mark_dispatched();
        assert_eq!(slot.status, SlotStatus::Dispatched);

        let first = slot.resolve(SlotResolution::Failed {
            reason: SlotFailure::NoBids,
            best_price: None,
        });
        assert!(first);
        assert_eq!(slot.status, SlotStatus::Failed(SlotFailure::NoBids));

        let second = slot.resolve(SlotResolution::Filled(WinningBid {
            bid: sample_bid("a", dec!(10)),
            clearing_price: dec!(9.5),
            score: 1.0,
            creative_payload: None,
            creative_fallback: false,
        }));
        assert!(!second);
        assert_eq!(slot.revenue(), Decimal::ZERO);
    }

    #[test]
    fn test_position_history_running_mean() {
        let mut h = PositionHistory::default();
        h.record(10.0, true);
        h.record(0.0, false);
        h.record(20.0, true);
        assert_eq!(h.slots_attempted, 3);
        assert_eq!(h.slots_filled, 2);
        assert!((h.mean_revenue - 10.0).abs() < 1e-9);
        assert!((h.fill_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_pod_result_from_strategy() {
        let mut filled = Slot::new(0, 30, dec!(5), 1000);
        filled.resolve(SlotResolution::Filled(WinningBid {
            bid: sample_bid("a", dec!(12)),
            clearing_price: dec!(11.40),
            score: 0.9,
            creative_payload: None,
            creative_fallback: true,
        }));
        let mut failed = Slot::new(1, 15, dec!(5), 1000);
        failed.resolve(SlotResolution::Failed {
            reason: SlotFailure::BelowFloor,
            best_price: Some(dec!(3)),
        });

        let strategy = PodStrategy {
            pod_id: "pod-1".into(),
            opportunity_id: "opp-1".into(),
            slots: vec![filled, failed],
            expected_revenue: dec!(10),
            expected_completion: 0.5,
            rationale: String::new(),
            origin: StrategyOrigin::Fallback,
            status: PodStatus::Completed,
        };

        let result = PodResult::from_strategy(&strategy);
        assert_eq!(result.slots_attempted, 2);
        assert_eq!(result.slots_filled, 1);
        assert_eq!(result.total_revenue, dec!(11.40));
        assert_eq!(result.creative_fallbacks, 1);
        assert_eq!(result.failure_reasons, vec!["slot 1: all bids below floor".to_string()]);
        assert!(result.per_slot_winner[1].is_none());
    }

    #[test]
    fn test_prediction_context_from_opportunity() {
        use chrono::TimeZone;
        let mut opp = Opportunity::new(AdPosition::Midroll, 60, "Sports", DeviceType::Ctv);
        // 2026-03-04 is a Wednesday.
        opp.timestamp = Utc.with_ymd_and_hms(2026, 3, 4, 20, 15, 0).unwrap();
        let ctx = PredictionContext::for_source(&opp, "src", dec!(7.5));
        assert_eq!(ctx.hour, 20);
        assert_eq!(ctx.weekday, 2);
        assert_eq!(ctx.month, 3);
        assert_eq!(ctx.content_category, "sports");
        assert!((ctx.floor - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_opportunity_deserialize_defaults() {
        let json = r#"{"position":"preroll","available_secs":30,"content_category":"news","device":"mobile"}"#;
        let opp: Opportunity = serde_json::from_str(json).unwrap();
        assert!(!opp.id.is_empty());
        assert_eq!(opp.user_value, 1.0);
        assert!(!opp.privacy.coppa);
    }
}
