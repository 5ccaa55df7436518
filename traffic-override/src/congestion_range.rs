use navigation_route::MAX_CONGESTION;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Maps numeric congestion values onto the coarse levels shown to drivers.
///
/// The four ranges must be contiguous and cover `0..=100` exactly (see [`Self::is_contiguous`]).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CongestionRangeGroup {
    pub low: RangeInclusive<u8>,
    pub moderate: RangeInclusive<u8>,
    pub heavy: RangeInclusive<u8>,
    pub severe: RangeInclusive<u8>,
}

impl Default for CongestionRangeGroup {
    fn default() -> Self {
        CongestionRangeGroup {
            low: 0..=39,
            moderate: 40..=59,
            heavy: 60..=79,
            severe: 80..=MAX_CONGESTION,
        }
    }
}

impl CongestionRangeGroup {
    pub fn is_contiguous(&self) -> bool {
        let ranges = [&self.low, &self.moderate, &self.heavy, &self.severe];
        *self.low.start() == 0
            && *self.severe.end() == MAX_CONGESTION
            && ranges.iter().all(|range| range.start() <= range.end())
            && ranges
                .windows(2)
                .all(|pair| u16::from(*pair[0].end()) + 1 == u16::from(*pair[1].start()))
    }

    pub fn is_low(&self, congestion: u8) -> bool {
        self.low.contains(&congestion)
    }

    /// The value a congestion level is lowered to once live speed shows the road is clear.
    ///
    /// Severe congestion only drops to the top of the moderate range,
    /// since one fast sample isn't enough to call a jam gone.
    /// Heavy and moderate congestion drop to free flow.
    pub fn decreased(&self, congestion: u8) -> u8 {
        if self.severe.contains(&congestion) {
            *self.moderate.end()
        } else if self.heavy.contains(&congestion) || self.moderate.contains(&congestion) {
            *self.low.start()
        } else {
            congestion
        }
    }
}
