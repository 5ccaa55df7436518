//! # Live traffic override
//!
//! Routes carry congestion annotations computed by the routing service when the route was fetched.
//! While driving, those annotations go stale:
//! a jam appears which the route doesn't know about, or a known jam clears up.
//!
//! This crate compares live speed samples against the annotations ([`SpeedAnalyzer`]),
//! decides what to do about any disagreement ([`TrafficUpdateAction`]),
//! and rewrites (or restores) a window of the annotations ahead of the driver
//! ([`update_traffic`], [`restore_traffic`]).
//! [`TrafficOverrideSession`] runs all of that for every location update.

mod action;
mod ahead_distance;
mod analyzer;
mod congestion_range;
mod expectation;
pub mod handlers;
mod mutator;
mod options;
mod session;

pub use action::{DecreaseTraffic, IncreaseTraffic, RestoreTraffic, TrafficUpdateAction};
pub use ahead_distance::{AheadDistanceCalculator, segments_within_distance};
pub use analyzer::{SpeedAnalysisResult, SpeedAnalyzer};
pub use congestion_range::CongestionRangeGroup;
pub use expectation::{congestion_for_speed, expected_speed};
pub use mutator::{CongestionUpdate, MutationError, restore_traffic, update_traffic};
pub use options::{OptionsError, TrafficOverrideOptions};
pub use session::{TickOutcome, TrafficOverrideSession};
