//! Demand source registry.
//!
//! Holds static per-source configuration alongside the rolling metrics the
//! planner and auction read (average price, fill rate, latency), plus the
//! per-position performance aggregate.
//!
//! `DemandRegistry` is the read/update seam. The in-process implementation
//! serialises writes behind a lock; a multi-instance deployment swaps in an
//! external store implementing the same trait.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::config::SourceSettings;
use crate::types::{AdPosition, PositionHistory};

// ---------------------------------------------------------------------------
// EMA constants
// ---------------------------------------------------------------------------

const PRICE_DECAY: f64 = 0.95;
const FILL_DECAY: f64 = 0.98;
const FILL_BUMP: f64 = 0.02;
const LATENCY_DECAY: f64 = 0.90;

// ---------------------------------------------------------------------------
// Demand source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandSource {
    pub name: String,
    pub endpoint: String,
    pub avg_price: f64,
    /// Always within [0, 1].
    pub fill_rate: f64,
    pub avg_latency_ms: f64,
    pub accepted_durations: Vec<u32>,
    pub categories: Vec<String>,
    pub timeout_ms: u64,
    pub enabled: bool,
}

impl DemandSource {
    pub fn from_settings(s: &SourceSettings) -> Self {
        Self {
            name: s.name.clone(),
            endpoint: s.endpoint.clone(),
            avg_price: s.avg_price.max(0.0),
            fill_rate: s.fill_rate.clamp(0.0, 1.0),
            avg_latency_ms: s.avg_latency_ms.max(0.0),
            accepted_durations: s.durations.clone(),
            categories: s.categories.iter().map(|c| c.to_lowercase()).collect(),
            timeout_ms: s.timeout_ms,
            enabled: s.enabled,
        }
    }

    fn apply_fill(&mut self, price: f64, latency_ms: Option<f64>) {
        self.avg_price = self.avg_price * PRICE_DECAY + price * (1.0 - PRICE_DECAY);
        self.fill_rate = (self.fill_rate * FILL_DECAY + FILL_BUMP).clamp(0.0, 1.0);
        if let Some(l) = latency_ms {
            self.avg_latency_ms = self.avg_latency_ms * LATENCY_DECAY + l * (1.0 - LATENCY_DECAY);
        }
    }

    fn apply_no_fill(&mut self, latency_ms: Option<f64>) {
        self.fill_rate = (self.fill_rate * FILL_DECAY).clamp(0.0, 1.0);
        if let Some(l) = latency_ms {
            self.avg_latency_ms = self.avg_latency_ms * LATENCY_DECAY + l * (1.0 - LATENCY_DECAY);
        }
    }
}

// ---------------------------------------------------------------------------
// Registry trait
// ---------------------------------------------------------------------------

/// Read/update interface over shared source performance state.
pub trait DemandRegistry: Send + Sync {
    fn get(&self, name: &str) -> Option<DemandSource>;

    /// All sources, enabled or not, in stable name order.
    fn snapshot(&self) -> Vec<DemandSource>;

    /// A fill on `name` at `price`.
    fn record_fill(&self, name: &str, price: f64, latency_ms: Option<f64>);

    /// `name` was asked and returned nothing usable.
    fn record_no_fill(&self, name: &str, latency_ms: Option<f64>);

    fn record_position(&self, position: AdPosition, revenue: f64, filled: bool);

    fn position_history(&self, position: AdPosition) -> PositionHistory;

    /// Admin removal. Returns the removed source.
    fn remove(&self, name: &str) -> Option<DemandSource>;

    /// Admin enable/disable. Returns false for unknown sources.
    fn set_enabled(&self, name: &str, enabled: bool) -> bool;

    fn enabled(&self) -> Vec<DemandSource> {
        self.snapshot().into_iter().filter(|s| s.enabled).collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Top `n` enabled sources by average price, highest first.
    fn top_by_price(&self, n: usize) -> Vec<DemandSource> {
        let mut sources = self.enabled();
        sources.sort_by(|a, b| {
            b.avg_price
                .partial_cmp(&a.avg_price)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        sources.truncate(n);
        sources
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryRegistry {
    sources: RwLock<BTreeMap<String, DemandSource>>,
    history: RwLock<HashMap<AdPosition, PositionHistory>>,
}

impl InMemoryRegistry {
    pub fn new(sources: Vec<DemandSource>) -> Self {
        let map = sources.into_iter().map(|s| (s.name.clone(), s)).collect();
        Self {
            sources: RwLock::new(map),
            history: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &[SourceSettings]) -> Self {
        let registry = Self::new(settings.iter().map(DemandSource::from_settings).collect());
        info!(
            total = settings.len(),
            enabled = registry.enabled().len(),
            "Demand registry initialised"
        );
        registry
    }

    pub fn insert(&self, source: DemandSource) {
        self.sources.write().insert(source.name.clone(), source);
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DemandRegistry for InMemoryRegistry {
    fn get(&self, name: &str) -> Option<DemandSource> {
        self.sources.read().get(name).cloned()
    }

    fn snapshot(&self) -> Vec<DemandSource> {
        self.sources.read().values().cloned().collect()
    }

    fn record_fill(&self, name: &str, price: f64, latency_ms: Option<f64>) {
        if let Some(source) = self.sources.write().get_mut(name) {
            source.apply_fill(price, latency_ms);
            debug!(
                source = name,
                avg_price = format!("{:.3}", source.avg_price),
                fill_rate = format!("{:.3}", source.fill_rate),
                "Source fill recorded"
            );
        }
    }

    fn record_no_fill(&self, name: &str, latency_ms: Option<f64>) {
        if let Some(source) = self.sources.write().get_mut(name) {
            source.apply_no_fill(latency_ms);
        }
    }

    fn record_position(&self, position: AdPosition, revenue: f64, filled: bool) {
        self.history
            .write()
            .entry(position)
            .or_default()
            .record(revenue, filled);
    }

    fn position_history(&self, position: AdPosition) -> PositionHistory {
        self.history.read().get(&position).cloned().unwrap_or_default()
    }

    fn remove(&self, name: &str) -> Option<DemandSource> {
        let removed = self.sources.write().remove(name);
        if removed.is_some() {
            info!(source = name, "Demand source removed");
        }
        removed
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.sources.write().get_mut(name) {
            Some(source) => {
                source.enabled = enabled;
                info!(source = name, enabled, "Demand source toggled");
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
