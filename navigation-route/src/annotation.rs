use crate::MetersPerSecond;
use serde::{Deserialize, Serialize};

/// Per-segment annotations along a route leg.
///
/// Every array is parallel to the leg geometry:
/// element `i` describes the segment between coordinates `i` and `i + 1`.
/// Any of them may be absent if the annotation was not requested from the routing service.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LegAnnotation {
    /// Segment lengths in meters.
    pub distance: Option<Vec<f64>>,
    /// Numeric congestion levels (0-100).
    ///
    /// A `null` element means the routing service has no traffic information for that segment.
    pub congestion_numeric: Option<Vec<Option<u8>>>,
    /// Typical free-flow speeds, in km/h.
    pub freeflow_speed: Option<Vec<Option<u16>>>,
    /// Posted speed limits.
    pub maxspeed: Option<Vec<MaxSpeed>>,
}

impl LegAnnotation {
    /// The congestion value at the given geometry index, if one is known.
    pub fn congestion_at(&self, geometry_index: usize) -> Option<u8> {
        self.congestion_numeric
            .as_ref()?
            .get(geometry_index)
            .copied()
            .flatten()
    }

    /// The free-flow speed at the given geometry index, if one is known.
    pub fn freeflow_speed_at(&self, geometry_index: usize) -> Option<MetersPerSecond> {
        let kmh = self
            .freeflow_speed
            .as_ref()?
            .get(geometry_index)
            .copied()
            .flatten()?;
        MetersPerSecond::from_kilometers_per_hour(f64::from(kmh)).ok()
    }

    /// The posted speed limit at the given geometry index, if one is known.
    pub fn maxspeed_at(&self, geometry_index: usize) -> Option<MetersPerSecond> {
        self.maxspeed
            .as_ref()?
            .get(geometry_index)?
            .to_meters_per_second()
    }
}

/// A posted speed limit, in the shape the Directions API uses.
///
/// Exactly one of these forms is expected:
/// `{"speed": 100, "unit": "km/h"}`, `{"unknown": true}`, or `{"none": true}`
/// (the latter meaning there is no limit at all).
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct MaxSpeed {
    pub speed: Option<u16>,
    pub unit: Option<SpeedLimitUnit>,
    pub unknown: Option<bool>,
    pub none: Option<bool>,
}

impl MaxSpeed {
    pub fn kilometers_per_hour(speed: u16) -> Self {
        MaxSpeed {
            speed: Some(speed),
            unit: Some(SpeedLimitUnit::KilometersPerHour),
            ..Default::default()
        }
    }

    pub fn miles_per_hour(speed: u16) -> Self {
        MaxSpeed {
            speed: Some(speed),
            unit: Some(SpeedLimitUnit::MilesPerHour),
            ..Default::default()
        }
    }

    pub fn unknown() -> Self {
        MaxSpeed {
            unknown: Some(true),
            ..Default::default()
        }
    }

    /// Converts the limit to a speed.
    ///
    /// Returns `None` for unknown limits and for roads without any limit,
    /// since neither says anything about how fast traffic is supposed to move.
    /// A speed without a unit is assumed to be in km/h.
    pub fn to_meters_per_second(&self) -> Option<MetersPerSecond> {
        if self.unknown == Some(true) || self.none == Some(true) {
            return None;
        }

        let speed = f64::from(self.speed?);
        let converted = match self.unit.unwrap_or(SpeedLimitUnit::KilometersPerHour) {
            SpeedLimitUnit::KilometersPerHour => MetersPerSecond::from_kilometers_per_hour(speed),
            SpeedLimitUnit::MilesPerHour => MetersPerSecond::from_miles_per_hour(speed),
        };
        converted.ok()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedLimitUnit {
    #[serde(rename = "km/h")]
    KilometersPerHour,
    #[serde(rename = "mph")]
    MilesPerHour,
}
