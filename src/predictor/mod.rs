//! Fill-rate predictor.
//!
//! Scores a (source, context) pair for fill probability, expected price and
//! expected latency. Keeps a bounded ring buffer of training records and,
//! every few appends, re-derives additive feature weights from it:
//!
//! ```text
//! weight[bucket] = (fill_rate[bucket] - global_fill_rate) × learning_rate
//! ```
//!
//! for every bucket with enough samples. Per-source baselines are learned
//! the same way once a source has enough history.

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::config::PredictorConfig;
use crate::registry::DemandSource;
use crate::types::{
    AdPosition, DeviceType, FillPrediction, PredictionContext, Recommendation, TrainingRecord,
};

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

/// Weight of the source's own fill rate in the base probability.
const SOURCE_WEIGHT: f64 = 0.6;
/// Weight of the empirical fill rate over recent matching records.
const EMPIRICAL_WEIGHT: f64 = 0.4;
/// How many recent matching records feed the empirical fill rate.
const RECENT_WINDOW: usize = 50;
/// Samples needed for full confidence.
const FULL_CONFIDENCE_SAMPLES: f64 = 100.0;
/// Probability lost per 10 units of floor.
const FLOOR_PENALTY_PER_10: f64 = 0.05;

/// Minimum samples for a bucket weight to be learned.
const MIN_BUCKET_SAMPLES: usize = 10;
/// Minimum samples for a source baseline to be learned.
const MIN_SOURCE_SAMPLES: usize = 20;

const SKIP_BELOW: f64 = 0.30;
const SLOW_LATENCY_MS: f64 = 1500.0;
const SLOW_PROBABILITY_CEILING: f64 = 0.60;

const SCARCITY_BUMP: f64 = 1.10;
const PEAK_LATENCY_PENALTY: f64 = 1.20;
const PEAK_HOURS: std::ops::RangeInclusive<u32> = 18..=22;

fn seasonality(month: u32) -> f64 {
    match month {
        1..=3 => 0.90,
        4..=6 => 1.00,
        7..=9 => 0.95,
        _ => 1.15, // Q4 holiday demand
    }
}

fn position_price_multiplier(position: AdPosition) -> f64 {
    match position {
        AdPosition::Preroll => 1.0,
        AdPosition::Midroll => 1.2,
        AdPosition::Postroll => 0.8,
    }
}

fn device_price_multiplier(device: DeviceType) -> f64 {
    match device {
        DeviceType::Ctv | DeviceType::Tv => 1.3,
        DeviceType::Desktop | DeviceType::Other => 1.0,
        DeviceType::Mobile | DeviceType::Tablet => 0.9,
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Weights {
    hour: [f64; 24],
    weekday: [f64; 7],
    device: HashMap<DeviceType, f64>,
    category: HashMap<String, f64>,
    position: HashMap<AdPosition, f64>,
    source_baseline: HashMap<String, f64>,
}

impl Weights {
    fn adjustment(&self, ctx: &PredictionContext) -> f64 {
        self.hour[(ctx.hour % 24) as usize]
            + self.weekday[(ctx.weekday % 7) as usize]
            + self.device.get(&ctx.device).copied().unwrap_or(0.0)
            + self.category.get(&ctx.content_category).copied().unwrap_or(0.0)
            + self.position.get(&ctx.position).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Default)]
struct PredictorState {
    records: VecDeque<TrainingRecord>,
    appended: u64,
    weights: Weights,
}

/// Snapshot of the learner for logs and the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct PredictorStats {
    pub records: usize,
    pub capacity: usize,
    pub appended: u64,
    pub global_fill_rate: f64,
    pub sources_with_baseline: Vec<String>,
}

/// Accumulates (fills, total) per bucket.
#[derive(Default, Clone, Copy)]
struct Tally {
    fills: usize,
    total: usize,
}

impl Tally {
    fn add(&mut self, filled: bool) {
        self.total += 1;
        if filled {
            self.fills += 1;
        }
    }

    fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.fills as f64 / self.total as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

pub struct FillRatePredictor {
    config: PredictorConfig,
    state: RwLock<PredictorState>,
}

impl FillRatePredictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            state: RwLock::new(PredictorState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Score `source` for the given context.
    pub fn predict(&self, source: &DemandSource, ctx: &PredictionContext) -> FillPrediction {
        let state = self.state.read();

        // Most recent first.
        let matching: Vec<&TrainingRecord> = state
            .records
            .iter()
            .rev()
            .filter(|r| r.context.source == source.name)
            .collect();
        let sample_count = matching.len();
        let recent = &matching[..sample_count.min(RECENT_WINDOW)];

        let source_rate = state
            .weights
            .source_baseline
            .get(&source.name)
            .copied()
            .unwrap_or(source.fill_rate);

        let base = if recent.is_empty() {
            source_rate
        } else {
            let empirical =
                recent.iter().filter(|r| r.filled).count() as f64 / recent.len() as f64;
            SOURCE_WEIGHT * source_rate + EMPIRICAL_WEIGHT * empirical
        };

        let floor_penalty = FLOOR_PENALTY_PER_10 * ctx.floor.max(0.0) / 10.0;
        let raw = (base + state.weights.adjustment(ctx) - floor_penalty) * seasonality(ctx.month);
        let probability = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };

        let confidence = (sample_count as f64 / FULL_CONFIDENCE_SAMPLES).min(1.0);

        // -- Price --
        let prices: Vec<f64> = recent.iter().filter_map(|r| r.price).collect();
        let mut expected_price = blend(source.avg_price, &prices);
        expected_price *= position_price_multiplier(ctx.position);
        expected_price *= device_price_multiplier(ctx.device);
        if probability < 0.5 {
            expected_price *= SCARCITY_BUMP;
        }

        // -- Latency --
        let latencies: Vec<f64> = recent.iter().filter_map(|r| r.latency_ms).collect();
        let mut expected_latency_ms = blend(source.avg_latency_ms, &latencies);
        if PEAK_HOURS.contains(&ctx.hour) {
            expected_latency_ms *= PEAK_LATENCY_PENALTY;
        }

        let recommendation = if probability < SKIP_BELOW {
            Recommendation::Skip
        } else if expected_latency_ms > SLOW_LATENCY_MS && probability < SLOW_PROBABILITY_CEILING {
            Recommendation::ReduceTimeout
        } else {
            Recommendation::Call
        };

        FillPrediction {
            probability,
            expected_price,
            expected_latency_ms,
            confidence,
            recommendation,
        }
    }

    /// Append an observed outcome; periodically re-derives the weights.
    pub fn record_outcome(
        &self,
        context: PredictionContext,
        filled: bool,
        price: Option<f64>,
        latency_ms: Option<f64>,
    ) {
        let mut state = self.state.write();
        state.records.push_back(TrainingRecord {
            context,
            filled,
            price: price.filter(|p| p.is_finite()),
            latency_ms: latency_ms.filter(|l| l.is_finite()),
            timestamp: Utc::now(),
        });
        while state.records.len() > self.config.capacity {
            state.records.pop_front();
        }
        state.appended += 1;

        if state.appended % self.config.retrain_every as u64 == 0 {
            let weights = self.derive_weights(&state.records);
            state.weights = weights;
        }
    }

    fn derive_weights(&self, records: &VecDeque<TrainingRecord>) -> Weights {
        let lr = self.config.learning_rate;
        let mut global = Tally::default();
        let mut hour = [Tally::default(); 24];
        let mut weekday = [Tally::default(); 7];
        let mut device: HashMap<DeviceType, Tally> = HashMap::new();
        let mut category: HashMap<String, Tally> = HashMap::new();
        let mut position: HashMap<AdPosition, Tally> = HashMap::new();
        let mut source: HashMap<String, Tally> = HashMap::new();

        for r in records {
            let c = &r.context;
            global.add(r.filled);
            hour[(c.hour % 24) as usize].add(r.filled);
            weekday[(c.weekday % 7) as usize].add(r.filled);
            device.entry(c.device).or_default().add(r.filled);
            category.entry(c.content_category.clone()).or_default().add(r.filled);
            position.entry(c.position).or_default().add(r.filled);
            source.entry(c.source.clone()).or_default().add(r.filled);
        }

        let g = global.rate();
        let learned = |t: &Tally| -> Option<f64> {
            (t.total >= MIN_BUCKET_SAMPLES).then(|| (t.rate() - g) * lr)
        };

        let mut weights = Weights::default();
        for (i, t) in hour.iter().enumerate() {
            weights.hour[i] = learned(t).unwrap_or(0.0);
        }
        for (i, t) in weekday.iter().enumerate() {
            weights.weekday[i] = learned(t).unwrap_or(0.0);
        }
        weights.device = device
            .iter()
            .filter_map(|(k, t)| learned(t).map(|w| (*k, w)))
            .collect();
        weights.category = category
            .iter()
            .filter_map(|(k, t)| learned(t).map(|w| (k.clone(), w)))
            .collect();
        weights.position = position
            .iter()
            .filter_map(|(k, t)| learned(t).map(|w| (*k, w)))
            .collect();
        weights.source_baseline = source
            .iter()
            .filter(|(_, t)| t.total >= MIN_SOURCE_SAMPLES)
            .map(|(k, t)| (k.clone(), t.rate()))
            .collect();

        debug!(
            records = records.len(),
            global_fill_rate = format!("{:.3}", g),
            baselines = weights.source_baseline.len(),
            "Predictor weights re-derived"
        );

        weights
    }

    pub fn stats(&self) -> PredictorStats {
        let state = self.state.read();
        let fills = state.records.iter().filter(|r| r.filled).count();
        let mut sources_with_baseline: Vec<String> =
            state.weights.source_baseline.keys().cloned().collect();
        sources_with_baseline.sort();
        PredictorStats {
            records: state.records.len(),
            capacity: self.config.capacity,
            appended: state.appended,
            global_fill_rate: if state.records.is_empty() {
                0.0
            } else {
                fills as f64 / state.records.len() as f64
            },
            sources_with_baseline,
        }
    }

    /// Learned baseline for `source`, if it has enough history.
    pub fn source_baseline(&self, source: &str) -> Option<f64> {
        self.state.read().weights.source_baseline.get(source).copied()
    }

    pub fn hour_weight(&self, hour: u32) -> f64 {
        self.state.read().weights.hour[(hour % 24) as usize]
    }

    pub fn weekday_weight(&self, weekday: u32) -> f64 {
        self.state.read().weights.weekday[(weekday % 7) as usize]
    }
}

/// 50/50 blend of `prior` with the mean of `observed`, or `prior` alone.
fn blend(prior: f64, observed: &[f64]) -> f64 {
    if observed.is_empty() {
        prior
    } else {
        let mean = observed.iter().sum::<f64>() / observed.len() as f64;
        0.5 * prior + 0.5 * mean
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
