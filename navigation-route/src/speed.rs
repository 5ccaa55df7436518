use nutype::nutype;
use std::fmt::{Display, Formatter};

const METERS_PER_KILOMETER: f64 = 1000.0;
const SECONDS_PER_HOUR: f64 = 3600.0;
const METERS_PER_MILE: f64 = 1609.344;

/// A non-negative speed, stored canonically in meters per second.
///
/// Speeds arrive in whatever unit the producer prefers
/// (location providers report m/s, annotations km/h, posted limits either km/h or mph),
/// so conversions live here rather than being sprinkled around the analyzer.
///
/// # Examples
///
/// ```
/// # use navigation_route::MetersPerSecond;
/// let speed = MetersPerSecond::from_kilometers_per_hour(72.0).expect("valid speed");
/// assert_eq!(speed.into_inner(), 20.0);
/// assert!(MetersPerSecond::try_new(-1.0).is_err(), "Negative speeds are rejected");
/// assert!(MetersPerSecond::try_new(f64::NAN).is_err(), "So are non-finite ones");
/// ```
#[nutype(
    validate(finite, greater_or_equal = 0.0),
    derive(Debug, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)
)]
pub struct MetersPerSecond(f64);

impl MetersPerSecond {
    /// Converts a speed in kilometers per hour.
    ///
    /// # Errors
    ///
    /// Fails if the converted value is negative or not finite.
    pub fn from_kilometers_per_hour(kmh: f64) -> Result<Self, MetersPerSecondError> {
        // Multiplying first keeps whole km/h values exact (72 km/h is exactly 20 m/s).
        Self::try_new(kmh * METERS_PER_KILOMETER / SECONDS_PER_HOUR)
    }

    /// Converts a speed in miles per hour.
    ///
    /// # Errors
    ///
    /// Fails if the converted value is negative or not finite.
    pub fn from_miles_per_hour(mph: f64) -> Result<Self, MetersPerSecondError> {
        Self::try_new(mph * METERS_PER_MILE / SECONDS_PER_HOUR)
    }

    pub fn to_kilometers_per_hour(self) -> f64 {
        self.into_inner() * SECONDS_PER_HOUR / METERS_PER_KILOMETER
    }

    pub fn to_miles_per_hour(self) -> f64 {
        self.into_inner() * SECONDS_PER_HOUR / METERS_PER_MILE
    }
}

impl Display for MetersPerSecond {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} m/s", self.into_inner())
    }
}
