//! Domain error taxonomy.
//!
//! Only `NoEnabledSources` is meant to escape to the top-level caller.
//! Everything else is absorbed where it happens (a source becomes "no bid",
//! a slot fails, the planner falls back, a creative is substituted) and is
//! kept as a typed value so it can be logged and counted.

use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    #[error("Source {source_name} timed out after {timeout_ms}ms")]
    SourceTimeout { source_name: String, timeout_ms: u64 },

    #[error("Source error ({source_name}): {message}")]
    SourceError { source_name: String, message: String },

    #[error("No bids for slot {slot}")]
    NoBidsForSlot { slot: usize },

    #[error("Slot {slot}: best bid ${best:.2} below floor ${floor:.2}")]
    BelowFloor {
        slot: usize,
        best: Decimal,
        floor: Decimal,
    },

    #[error("Strategy advisor failed: {0}")]
    AdvisorFailure(String),

    #[error("Creative retrieval failed ({url}): {message}")]
    CreativeRetrievalFailure { url: String, message: String },

    #[error("No enabled demand sources")]
    NoEnabledSources,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuctionError {
    /// Whether the condition is absorbed inside the engine.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AuctionError::NoEnabledSources | AuctionError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_display_below_floor() {
        let e = AuctionError::BelowFloor {
            slot: 1,
            best: dec!(4.5),
            floor: dec!(8),
        };
        assert_eq!(e.to_string(), "Slot 1: best bid $4.50 below floor $8.00");
    }

    #[test]
    fn test_recoverability() {
        assert!(AuctionError::SourceTimeout {
            source_name: "x".into(),
            timeout_ms: 500
        }
        .is_recoverable());
        assert!(AuctionError::AdvisorFailure("boom".into()).is_recoverable());
        assert!(!AuctionError::NoEnabledSources.is_recoverable());
    }
}
