//! Conversions between configured percentages/seconds and the unit scale the
//! healer works in.

/// Highest health value a creature can have.
pub const UNIT_MAX: u32 = 20;

/// Host ticks per notional second.
pub const TICKS_PER_SECOND: u64 = 20;

/// Converts a health percentage (0..=100) to health units.
///
/// The result is never zero: a creature at zero health is dead and cannot be
/// healed, so a configured 0% minimum maps to the lowest healable unit.
pub fn to_health_units(percentage: i64) -> u32 {
    let units = if percentage <= 0 {
        0
    } else {
        percentage.saturating_add(4) / 5
    };
    units.clamp(1, i64::from(UNIT_MAX)) as u32
}

/// Ticks between two heal passes so that `max_units` are restored over
/// `duration_ticks`. Integer division; the remainder is dropped.
pub fn compute_interval(duration_ticks: u64, max_units: u32) -> u64 {
    (duration_ticks / u64::from(max_units.max(1))).max(1)
}

pub fn seconds_to_ticks(seconds: i64) -> u64 {
    u64::try_from(seconds).unwrap_or(0).saturating_mul(TICKS_PER_SECOND)
}
