use crate::{AheadDistanceCalculator, CongestionRangeGroup};
use navigation_route::{MetersPerSecond, MetersPerSecondError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum OptionsError {
    #[error("Invalid high speed threshold: {0}")]
    InvalidHighSpeedThreshold(#[from] MetersPerSecondError),
    #[error("{name} must be a finite, non-negative number (got {value})")]
    InvalidDistance { name: &'static str, value: f64 },
    #[error("Congestion ranges must be contiguous and cover 0 to 100")]
    NonContiguousCongestionRanges,
}

/// Configuration for live traffic overrides.
///
/// Every field has a default, so a partial (or empty) JSON object is a valid configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrafficOverrideOptions {
    pub enabled: bool,
    /// Speeds at or above this are considered free-flowing regardless of the annotations.
    pub high_speed_threshold_kmh: f64,
    pub near_window_meters: f64,
    pub far_window_meters: f64,
    pub look_ahead_seconds: f64,
    pub max_ahead_distance_meters: f64,
    pub congestion_ranges: CongestionRangeGroup,
}

impl Default for TrafficOverrideOptions {
    fn default() -> Self {
        TrafficOverrideOptions {
            enabled: true,
            high_speed_threshold_kmh: 80.0,
            near_window_meters: 1000.0,
            far_window_meters: 1000.0,
            look_ahead_seconds: AheadDistanceCalculator::DEFAULT_LOOK_AHEAD_SECONDS,
            max_ahead_distance_meters: AheadDistanceCalculator::DEFAULT_MAX_DISTANCE_METERS,
            congestion_ranges: CongestionRangeGroup::default(),
        }
    }
}

impl TrafficOverrideOptions {
    /// # Errors
    ///
    /// Fails if the threshold isn't a valid speed.
    pub fn high_speed_threshold(&self) -> Result<MetersPerSecond, OptionsError> {
        Ok(MetersPerSecond::from_kilometers_per_hour(
            self.high_speed_threshold_kmh,
        )?)
    }

    pub fn ahead_distance_calculator(&self) -> AheadDistanceCalculator {
        AheadDistanceCalculator::new(self.look_ahead_seconds, self.max_ahead_distance_meters)
    }

    /// Checks every field, returning the options unchanged if they are usable.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid field.
    pub fn validated(self) -> Result<Self, OptionsError> {
        self.high_speed_threshold()?;
        for (name, value) in [
            ("near_window_meters", self.near_window_meters),
            ("far_window_meters", self.far_window_meters),
            ("look_ahead_seconds", self.look_ahead_seconds),
            ("max_ahead_distance_meters", self.max_ahead_distance_meters),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(OptionsError::InvalidDistance { name, value });
            }
        }
        if !self.congestion_ranges.is_contiguous() {
            return Err(OptionsError::NonContiguousCongestionRanges);
        }
        Ok(self)
    }
}
