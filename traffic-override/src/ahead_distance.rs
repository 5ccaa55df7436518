use navigation_route::MetersPerSecond;

/// Decides how far ahead of the driver a traffic window should reach.
///
/// The distance is whatever the driver would cover in `look_ahead_seconds` at the current speed,
/// capped at `max_distance_meters`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AheadDistanceCalculator {
    look_ahead_seconds: f64,
    max_distance_meters: f64,
}

impl AheadDistanceCalculator {
    pub const DEFAULT_LOOK_AHEAD_SECONDS: f64 = 130.0;
    pub const DEFAULT_MAX_DISTANCE_METERS: f64 = 5000.0;

    pub fn new(look_ahead_seconds: f64, max_distance_meters: f64) -> Self {
        AheadDistanceCalculator {
            look_ahead_seconds,
            max_distance_meters,
        }
    }

    pub fn ahead_distance_meters(&self, speed: MetersPerSecond) -> f64 {
        (speed.into_inner() * self.look_ahead_seconds).min(self.max_distance_meters)
    }
}

impl Default for AheadDistanceCalculator {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_LOOK_AHEAD_SECONDS,
            Self::DEFAULT_MAX_DISTANCE_METERS,
        )
    }
}

/// Counts how many whole segments, starting at `start_index`, fit within `meters`.
///
/// `distances` is a leg's `distance` annotation.
/// A segment that would only partially fit is not counted.
pub fn segments_within_distance(distances: &[f64], start_index: usize, meters: f64) -> usize {
    distances
        .get(start_index..)
        .unwrap_or_default()
        .iter()
        .scan(0.0, |covered, distance| {
            *covered += distance;
            Some(*covered)
        })
        .take_while(|covered| *covered <= meters)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kmh(speed: f64) -> MetersPerSecond {
        MetersPerSecond::from_kilometers_per_hour(speed).unwrap()
    }

    #[test]
    fn distance_scales_with_speed() {
        let calculator = AheadDistanceCalculator::default();
        assert_eq!(calculator.ahead_distance_meters(MetersPerSecond::try_new(10.0).unwrap()), 1300.0);
        assert_eq!(calculator.ahead_distance_meters(MetersPerSecond::try_new(0.0).unwrap()), 0.0);
    }

    #[test]
    fn distance_is_capped() {
        let calculator = AheadDistanceCalculator::default();
        assert_eq!(calculator.ahead_distance_meters(kmh(200.0)), 5000.0);
        assert_eq!(
            AheadDistanceCalculator::new(10.0, 100.0).ahead_distance_meters(kmh(72.0)),
            100.0
        );
    }

    #[test]
    fn counts_whole_segments() {
        let distances = [350.0; 10];
        let calculator = AheadDistanceCalculator::default();

        let at_80 = calculator.ahead_distance_meters(kmh(80.0));
        let at_100 = calculator.ahead_distance_meters(kmh(100.0));
        assert_eq!(segments_within_distance(&distances, 0, at_80), 8);
        assert_eq!(segments_within_distance(&distances, 0, at_100), 10);
        assert_eq!(segments_within_distance(&distances, 6, at_100), 4);
    }

    #[test]
    fn counts_nothing_past_the_end() {
        assert_eq!(segments_within_distance(&[10.0, 10.0], 2, 100.0), 0);
        assert_eq!(segments_within_distance(&[10.0, 10.0], 7, 100.0), 0);
        assert_eq!(segments_within_distance(&[50.0, 10.0], 0, 20.0), 0);
    }

    proptest! {
        #[test]
        fn segment_count_is_bounded(
            distances in prop::collection::vec(0.0f64..500.0, 0..50),
            start_index in 0usize..60,
            meters in 0.0f64..10_000.0,
        ) {
            let count = segments_within_distance(&distances, start_index, meters);
            prop_assert!(count <= distances.len().saturating_sub(start_index));
            let covered: f64 = distances.iter().skip(start_index).take(count).sum();
            prop_assert!(covered <= meters);
        }
    }
}
