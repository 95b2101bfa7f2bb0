//! Deterministic pod shapes used when the advisor is unavailable.

use rust_decimal::Decimal;

use crate::config::RevenueTargets;
use crate::types::{AdPosition, DeviceType};

/// Shortest slot the fallback will plan.
const MIN_SLOT_SECS: u32 = 5;
/// Longest single slot the fallback will plan.
const MAX_SLOT_SECS: u32 = 30;

/// Slot durations for a break, from the position → shape table.
pub fn fallback_durations(position: AdPosition, available_secs: u32) -> Vec<u32> {
    match position {
        AdPosition::Midroll if available_secs >= 60 => vec![30, 30],
        AdPosition::Preroll if available_secs >= 45 => vec![15, 30],
        AdPosition::Postroll if available_secs >= 30 => vec![30],
        _ => vec![available_secs.clamp(MIN_SLOT_SECS, MAX_SLOT_SECS)],
    }
}

/// Floor from the position's revenue target, with the TV premium.
pub fn fallback_floor(targets: &RevenueTargets, position: AdPosition, device: DeviceType) -> Decimal {
    let target = targets.for_position(position);
    if device.is_tv() {
        target * targets.tv_multiplier
    } else {
        target
    }
}
