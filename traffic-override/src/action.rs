use crate::SpeedAnalysisResult;
use navigation_route::{CongestionNumericOverride, MetersPerSecond, NavigationRoute, RouteLegProgress};

/// Raise congestion ahead of the driver to what their speed implies.
#[derive(Debug, Clone, PartialEq)]
pub struct IncreaseTraffic {
    pub route: NavigationRoute,
    pub leg_progress: RouteLegProgress,
    pub expected_congestion: u8,
}

/// Lower congestion ahead of a driver who is moving fast.
#[derive(Debug, Clone, PartialEq)]
pub struct DecreaseTraffic {
    pub route: NavigationRoute,
    pub leg_progress: RouteLegProgress,
    pub speed: MetersPerSecond,
}

/// Undo an override which live speed no longer supports.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreTraffic {
    pub route: NavigationRoute,
    pub congestion_override: CongestionNumericOverride,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrafficUpdateAction {
    NoAction,
    IncreaseTraffic(IncreaseTraffic),
    DecreaseTraffic(DecreaseTraffic),
    RestoreTraffic(RestoreTraffic),
}

impl TrafficUpdateAction {
    pub fn name(&self) -> &'static str {
        match self {
            TrafficUpdateAction::NoAction => "no_action",
            TrafficUpdateAction::IncreaseTraffic(_) => "increase_traffic",
            TrafficUpdateAction::DecreaseTraffic(_) => "decrease_traffic",
            TrafficUpdateAction::RestoreTraffic(_) => "restore_traffic",
        }
    }
}

impl From<SpeedAnalysisResult> for TrafficUpdateAction {
    fn from(value: SpeedAnalysisResult) -> Self {
        match value {
            SpeedAnalysisResult::LowSpeedDetected {
                expected_congestion,
                leg_progress,
                route,
                ..
            } => TrafficUpdateAction::IncreaseTraffic(IncreaseTraffic {
                route,
                leg_progress,
                expected_congestion,
            }),
            SpeedAnalysisResult::HighSpeedDetected {
                speed,
                leg_progress,
                route,
            } => TrafficUpdateAction::DecreaseTraffic(DecreaseTraffic {
                route,
                leg_progress,
                speed,
            }),
            SpeedAnalysisResult::WrongFalsePositiveOverrideDetected {
                route,
                congestion_override,
            } => TrafficUpdateAction::RestoreTraffic(RestoreTraffic {
                route,
                congestion_override,
            }),
            SpeedAnalysisResult::SkippedAnalysis { .. }
            | SpeedAnalysisResult::FailedToAnalyze { .. }
            | SpeedAnalysisResult::SpeedIsOk { .. }
            | SpeedAnalysisResult::SpeedMatchesCongestionLevel { .. } => {
                TrafficUpdateAction::NoAction
            }
        }
    }
}
