//! Outcome sinks for finished pods.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::info;

use crate::types::PodResult;

pub trait OutcomeSink: Send + Sync {
    fn emit(&self, result: &PodResult);
}

/// Logs every result as a structured event.
pub struct TracingSink;

impl OutcomeSink for TracingSink {
    fn emit(&self, result: &PodResult) {
        info!(
            pod_id = %result.pod_id,
            opportunity_id = %result.opportunity_id,
            origin = ?result.origin,
            attempted = result.slots_attempted,
            filled = result.slots_filled,
            revenue = format!("${:.2}", result.total_revenue),
            creative_fallbacks = result.creative_fallbacks,
            failures = ?result.failure_reasons,
            "Pod completed"
        );
    }
}

/// Keeps the most recent results in memory, newest last.
pub struct MemorySink {
    capacity: usize,
    results: Mutex<VecDeque<PodResult>>,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            results: Mutex::new(VecDeque::new()),
        }
    }

    pub fn recent(&self) -> Vec<PodResult> {
        self.results.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutcomeSink for MemorySink {
    fn emit(&self, result: &PodResult) {
        let mut results = self.results.lock();
        results.push_back(result.clone());
        while results.len() > self.capacity {
            results.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyOrigin;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn result(id: &str) -> PodResult {
        PodResult {
            pod_id: id.into(),
            opportunity_id: "o".into(),
            origin: StrategyOrigin::Fallback,
            slots_attempted: 1,
            slots_filled: 0,
            total_revenue: Decimal::ZERO,
            per_slot_winner: vec![None],
            failure_reasons: vec!["slot 0: no bids".into()],
            creative_fallbacks: 0,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_memory_sink_bounded() {
        let sink = MemorySink::new(2);
        for id in ["a", "b", "c"] {
            sink.emit(&result(id));
        }
        let ids: Vec<String> = sink.recent().into_iter().map(|r| r.pod_id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        TracingSink.emit(&result("x"));
    }
}
