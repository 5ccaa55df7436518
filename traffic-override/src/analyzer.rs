//! # Speed analysis
//!
//! Compares one live speed sample against what the route's annotations say about the road.

use crate::expectation::{congestion_for_speed, expected_speed};
use navigation_route::{
    CongestionNumericOverride, LocationMatcherResult, MetersPerSecond, NavigationRoute, RoadClass,
    RouteLegProgress, RouteProgress, RouteProgressState,
};
use std::fmt::{Display, Formatter};

/// An existing override is considered wrong once the driver is back above this share of the
/// expected (or high speed threshold) speed.
const FALSE_POSITIVE_SPEED_RATIO: f64 = 0.7;
/// Below this share of the expected speed, the driver is considered to be stuck in traffic.
const LOW_SPEED_RATIO: f64 = 0.5;

/// What one analyzed sample says about the route's congestion annotations.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeedAnalysisResult {
    SkippedAnalysis {
        reason: String,
    },
    FailedToAnalyze {
        reason: String,
    },
    /// The driver is fast enough that any congestion ahead is probably overstated.
    HighSpeedDetected {
        speed: MetersPerSecond,
        leg_progress: RouteLegProgress,
        route: NavigationRoute,
    },
    /// The route carries an override which live speed no longer supports.
    WrongFalsePositiveOverrideDetected {
        route: NavigationRoute,
        congestion_override: CongestionNumericOverride,
    },
    /// The driver is crawling on a motorway which the route says is clearer than that.
    LowSpeedDetected {
        speed: MetersPerSecond,
        expected_speed: MetersPerSecond,
        current_congestion: u8,
        expected_congestion: u8,
        leg_progress: RouteLegProgress,
        route: NavigationRoute,
        timestamp_ms: i64,
    },
    SpeedIsOk {
        speed: MetersPerSecond,
        expected_speed: MetersPerSecond,
    },
    /// The driver is slow, but the route already knows about it.
    SpeedMatchesCongestionLevel {
        speed: MetersPerSecond,
        expected_congestion: u8,
        actual_congestion: u8,
    },
}

impl SpeedAnalysisResult {
    fn skipped(reason: impl Into<String>) -> Self {
        SpeedAnalysisResult::SkippedAnalysis {
            reason: reason.into(),
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        SpeedAnalysisResult::FailedToAnalyze {
            reason: reason.into(),
        }
    }
}

impl Display for SpeedAnalysisResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedAnalysisResult::SkippedAnalysis { reason } => {
                write!(f, "SkippedAnalysis({reason})")
            }
            SpeedAnalysisResult::FailedToAnalyze { reason } => {
                write!(f, "FailedToAnalyze({reason})")
            }
            SpeedAnalysisResult::HighSpeedDetected {
                speed,
                leg_progress,
                ..
            } => write!(
                f,
                "HighSpeedDetected(speed={speed}, geometry_index={})",
                leg_progress.geometry_index
            ),
            SpeedAnalysisResult::WrongFalsePositiveOverrideDetected {
                congestion_override,
                ..
            } => write!(
                f,
                "WrongFalsePositiveOverrideDetected(leg={}, start={}, length={})",
                congestion_override.leg_index,
                congestion_override.start_index,
                congestion_override.length
            ),
            SpeedAnalysisResult::LowSpeedDetected {
                speed,
                expected_speed,
                current_congestion,
                expected_congestion,
                ..
            } => write!(
                f,
                "LowSpeedDetected(speed={speed}, expected_speed={expected_speed}, current_congestion={current_congestion}, expected_congestion={expected_congestion})"
            ),
            SpeedAnalysisResult::SpeedIsOk {
                speed,
                expected_speed,
            } => write!(f, "SpeedIsOk(speed={speed}, expected_speed={expected_speed})"),
            SpeedAnalysisResult::SpeedMatchesCongestionLevel {
                speed,
                expected_congestion,
                actual_congestion,
            } => write!(
                f,
                "SpeedMatchesCongestionLevel(speed={speed}, expected_congestion={expected_congestion}, actual_congestion={actual_congestion})"
            ),
        }
    }
}

/// Classifies live speed samples.
///
/// The analyzer is stateless apart from its threshold;
/// everything it needs to know about earlier overrides lives on the route itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedAnalyzer {
    high_speed_threshold: MetersPerSecond,
}

impl SpeedAnalyzer {
    pub fn new(high_speed_threshold: MetersPerSecond) -> Self {
        SpeedAnalyzer {
            high_speed_threshold,
        }
    }

    pub fn high_speed_threshold(&self) -> MetersPerSecond {
        self.high_speed_threshold
    }

    /// Analyzes one sample. The first matching rule wins:
    ///
    /// 1. Progress that isn't being tracked is skipped.
    /// 2. Samples without a speed, leg progress, or expected speed can't be analyzed,
    ///    except that high speed (at or above the threshold) is detected without an expectation.
    /// 3. An existing override is wrong if the driver is at 70% or more of the expected speed
    ///    (or of the threshold, if that is higher).
    /// 4. On motorways, driving below half the expected speed means the route should be more congested,
    ///    unless it already is.
    pub fn analyze(
        &self,
        route_progress: &RouteProgress,
        location: &LocationMatcherResult,
    ) -> SpeedAnalysisResult {
        if route_progress.state != RouteProgressState::Tracking {
            return SpeedAnalysisResult::skipped(format!(
                "Route progress state is {:?}",
                route_progress.state
            ));
        }
        let Some(speed) = location.speed else {
            return SpeedAnalysisResult::failed("Current speed is unknown");
        };
        let Some(leg_progress) = route_progress.current_leg_progress else {
            return SpeedAnalysisResult::failed("No current leg progress");
        };
        let route = &route_progress.route;

        if speed >= self.high_speed_threshold {
            return SpeedAnalysisResult::HighSpeedDetected {
                speed,
                leg_progress,
                route: route.clone(),
            };
        }

        let Some(leg) = leg_progress.leg(route) else {
            return SpeedAnalysisResult::failed(format!(
                "Route has no leg {}",
                leg_progress.leg_index
            ));
        };
        let Some(annotation) = leg.annotation.as_ref() else {
            return SpeedAnalysisResult::failed("Current leg has no annotations");
        };
        let Some(expected_speed) = expected_speed(annotation, leg_progress.geometry_index) else {
            return SpeedAnalysisResult::failed(format!(
                "Expected speed is unknown at geometry index {}",
                leg_progress.geometry_index
            ));
        };

        if let Some(congestion_override) = route.overridden_traffic() {
            let reference = if expected_speed > self.high_speed_threshold {
                expected_speed
            } else {
                self.high_speed_threshold
            };
            if speed.into_inner() >= FALSE_POSITIVE_SPEED_RATIO * reference.into_inner() {
                return SpeedAnalysisResult::WrongFalsePositiveOverrideDetected {
                    route: route.clone(),
                    congestion_override: congestion_override.clone(),
                };
            }
        }

        let on_motorway = leg
            .intersection(leg_progress.step_index, leg_progress.intersection_index)
            .and_then(|intersection| intersection.road_class)
            == Some(RoadClass::Motorway);
        if on_motorway && speed.into_inner() < LOW_SPEED_RATIO * expected_speed.into_inner() {
            let expected_congestion = congestion_for_speed(speed, expected_speed);
            let current_congestion = annotation
                .congestion_at(leg_progress.geometry_index)
                .unwrap_or(0);
            if current_congestion < expected_congestion {
                return SpeedAnalysisResult::LowSpeedDetected {
                    speed,
                    expected_speed,
                    current_congestion,
                    expected_congestion,
                    leg_progress,
                    route: route.clone(),
                    timestamp_ms: chrono::Utc::now().timestamp_millis(),
                };
            }
            return SpeedAnalysisResult::SpeedMatchesCongestionLevel {
                speed,
                expected_congestion,
                actual_congestion: current_congestion,
            };
        }

        SpeedAnalysisResult::SpeedIsOk {
            speed,
            expected_speed,
        }
    }
}
