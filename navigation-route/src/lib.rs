//! Data structures for navigation routes, route progress, and per-segment traffic annotations.
//!
//! Everything in here is a plain value.
//! Routes are never edited in place; "mutations" build a new [`NavigationRoute`]
//! which shares every untouched leg with the value it was derived from.

mod annotation;
mod error;
mod progress;
pub mod refresh;
mod route;
mod speed;

pub use annotation::{LegAnnotation, MaxSpeed, SpeedLimitUnit};
pub use error::RouteModelError;
pub use progress::{LocationMatcherResult, RouteLegProgress, RouteProgress, RouteProgressState};
pub use route::{
    CongestionNumericOverride, LegStep, ManeuverType, NavigationRoute, RoadClass, RouteLeg,
    StepIntersection, StepManeuver,
};
pub use speed::{MetersPerSecond, MetersPerSecondError};

/// The largest valid numeric congestion value.
///
/// Congestion annotations range from 0 (free flow) to 100 (standstill).
pub const MAX_CONGESTION: u8 = 100;
