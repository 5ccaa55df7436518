//! # Congestion expectations
//!
//! What speed the driver "should" be doing at a given position,
//! and how congested the road must be if they are much slower than that.

use navigation_route::{LegAnnotation, MAX_CONGESTION, MetersPerSecond};

/// Congestion reported once speed drops to exactly half of the expected speed.
const HALF_SPEED_CONGESTION: f64 = 50.0;

/// The speed expected at `geometry_index` in the absence of traffic.
///
/// The free-flow speed annotation is preferred; the posted speed limit is the fallback.
pub fn expected_speed(annotation: &LegAnnotation, geometry_index: usize) -> Option<MetersPerSecond> {
    annotation
        .freeflow_speed_at(geometry_index)
        .or_else(|| annotation.maxspeed_at(geometry_index))
}

/// The congestion level consistent with driving at `speed` where `limit` is expected.
///
/// Anything at or above half the limit is considered free-flowing (`0`).
/// Below that, congestion rises linearly from 50 to 100 at standstill, truncated to an integer.
/// Degenerate limits (zero or non-finite) also yield `0`.
pub fn congestion_for_speed(speed: MetersPerSecond, limit: MetersPerSecond) -> u8 {
    let half_limit = limit.into_inner() / 2.0;
    let speed = speed.into_inner();
    if !half_limit.is_normal() || speed >= half_limit {
        return 0;
    }

    let congestion = HALF_SPEED_CONGESTION + (half_limit - speed) * HALF_SPEED_CONGESTION / half_limit;
    if !congestion.is_finite() {
        return 0;
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "The value is clamped into the congestion range first"
    )]
    let congestion = congestion.trunc().clamp(0.0, f64::from(MAX_CONGESTION)) as u8;
    congestion
}
