use super::TrafficUpdateActionHandler;
use crate::action::DecreaseTraffic;
use crate::mutator::{CongestionUpdate, update_traffic};
use crate::{AheadDistanceCalculator, CongestionRangeGroup, segments_within_distance};
use navigation_route::NavigationRoute;
use tracing::{debug, info, warn};

/// Lowers congestion ahead of a fast driver.
///
/// The window covers the ahead distance for the current speed,
/// but stops at the next maneuver, at the motorway exit,
/// and (right after an on-ramp) where the ramp merges into the motorway.
/// Traffic past those points may have nothing to do with the road the driver is on.
pub struct DecreaseTrafficHandler {
    congestion_ranges: CongestionRangeGroup,
    ahead_distance: AheadDistanceCalculator,
}

impl DecreaseTrafficHandler {
    pub fn new(
        congestion_ranges: CongestionRangeGroup,
        ahead_distance: AheadDistanceCalculator,
    ) -> Self {
        DecreaseTrafficHandler {
            congestion_ranges,
            ahead_distance,
        }
    }
}

impl TrafficUpdateActionHandler<DecreaseTraffic> for DecreaseTrafficHandler {
    fn handle_action(&self, action: DecreaseTraffic) -> Option<NavigationRoute> {
        let DecreaseTraffic {
            route,
            leg_progress,
            speed,
        } = action;
        let start_index = leg_progress.geometry_index;

        if route
            .overridden_traffic()
            .is_some_and(|o| o.contains(leg_progress.leg_index, start_index))
        {
            debug!(start_index, "Driver is inside an existing override");
            return None;
        }

        let leg = leg_progress.leg(&route)?;
        let congestion = leg.congestion_numeric()?;
        let Some(distances) = leg.distances() else {
            debug!(
                leg_index = leg_progress.leg_index,
                "Leg has no distance annotation; can't size the override window"
            );
            return None;
        };

        let ahead_meters = self.ahead_distance.ahead_distance_meters(speed);
        let window = segments_within_distance(distances, start_index, ahead_meters);
        let hard_limit_index = [
            leg_progress.upcoming_step_first_geometry_index(leg),
            leg.motorway_exit_geometry_index(
                leg_progress.step_index,
                leg_progress.intersection_index,
            ),
            leg.on_ramp_merge_geometry_index(leg_progress.step_index),
        ]
        .into_iter()
        .flatten()
        .min();

        let end_index = start_index
            .saturating_add(window)
            .min(hard_limit_index.unwrap_or(usize::MAX))
            .min(congestion.len());
        let needs_decrease = congestion
            .get(start_index..end_index)
            .unwrap_or_default()
            .iter()
            .flatten()
            .any(|&value| self.congestion_ranges.decreased(value) != value);
        if !needs_decrease {
            debug!(start_index, end_index, "No congestion to decrease ahead");
            return None;
        }

        let decrease = |existing: u8, _: u8| self.congestion_ranges.decreased(existing);
        let update = CongestionUpdate {
            expected_congestion: *self.congestion_ranges.low.start(),
            near_window: window,
            far_window: 0,
            hard_limit_index,
            keep_original: true,
            transform_near: &decrease,
            transform_far: &decrease,
        };
        match update_traffic(&route, &leg_progress, &update) {
            Ok(updated) => {
                info!(
                    route_id = route.id(),
                    start_index, end_index, "Lowered congestion ahead of the driver"
                );
                Some(updated)
            }
            Err(error) => {
                warn!(%error, "Failed to decrease traffic");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navigation_route::{
        CongestionNumericOverride, LegAnnotation, LegStep, MetersPerSecond, RoadClass, RouteLeg,
        ManeuverType, RouteLegProgress, StepIntersection, StepManeuver,
    };

    const SEGMENT_METERS: f64 = 350.0;

    fn motorway(geometry_index: usize) -> StepIntersection {
        StepIntersection {
            geometry_index,
            road_class: Some(RoadClass::Motorway),
        }
    }

    fn route_with_steps(congestion: Vec<Option<u8>>, steps: Vec<LegStep>) -> NavigationRoute {
        NavigationRoute::new(
            "route",
            vec![RouteLeg {
                annotation: Some(LegAnnotation {
                    distance: Some(vec![SEGMENT_METERS; congestion.len()]),
                    congestion_numeric: Some(congestion),
                    ..Default::default()
                }),
                steps,
            }],
        )
    }

    fn route(congestion: Vec<Option<u8>>) -> NavigationRoute {
        route_with_steps(
            congestion,
            vec![LegStep {
                maneuver: None,
                intersections: vec![motorway(0)],
            }],
        )
    }

    fn decrease_at(route: NavigationRoute, geometry_index: usize, kmh: f64) -> DecreaseTraffic {
        DecreaseTraffic {
            route,
            leg_progress: RouteLegProgress {
                leg_index: 0,
                geometry_index,
                step_index: 0,
                intersection_index: 0,
                distance_remaining: 3500.0,
            },
            speed: MetersPerSecond::from_kilometers_per_hour(kmh).unwrap(),
        }
    }

    fn handler() -> DecreaseTrafficHandler {
        DecreaseTrafficHandler::new(
            CongestionRangeGroup::default(),
            AheadDistanceCalculator::default(),
        )
    }

    fn congestion(route: &NavigationRoute) -> Vec<Option<u8>> {
        route.leg(0).unwrap().congestion_numeric().unwrap().to_vec()
    }

    fn values(values: &[u8]) -> Vec<Option<u8>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn severe_congestion_drops_to_moderate_over_ahead_distance() {
        let updated = handler()
            .handle_action(decrease_at(route(values(&[90; 10])), 0, 80.0))
            .unwrap();

        assert_eq!(
            congestion(&updated),
            values(&[59, 59, 59, 59, 59, 59, 59, 59, 90, 90])
        );
        assert_eq!(
            updated.overridden_traffic(),
            Some(&CongestionNumericOverride {
                leg_index: 0,
                start_index: 0,
                length: 8,
                original_values: Some(values(&[90; 8])),
            })
        );
    }

    #[test]
    fn faster_driver_gets_a_longer_window() {
        let updated = handler()
            .handle_action(decrease_at(route(values(&[90; 10])), 0, 100.0))
            .unwrap();

        assert_eq!(congestion(&updated), values(&[59; 10]));
    }

    #[test]
    fn heavy_and_moderate_congestion_drop_to_low() {
        let updated = handler()
            .handle_action(decrease_at(
                route(values(&[85, 70, 45, 30, 0, 100, 60, 40, 80, 80])),
                0,
                80.0,
            ))
            .unwrap();

        assert_eq!(
            congestion(&updated),
            values(&[59, 0, 0, 30, 0, 59, 0, 0, 80, 80])
        );
    }

    #[test]
    fn low_congestion_is_left_alone() {
        let result = handler().handle_action(decrease_at(route(values(&[10; 10])), 0, 80.0));
        assert_eq!(result, None);
    }

    #[test]
    fn only_congestion_within_the_window_counts() {
        let result = handler().handle_action(decrease_at(
            route(values(&[10, 10, 10, 10, 10, 10, 10, 10, 90, 90])),
            0,
            80.0,
        ));
        assert_eq!(result, None);
    }

    #[test]
    fn stops_at_upcoming_step() {
        let steps = vec![
            LegStep {
                maneuver: None,
                intersections: vec![motorway(0)],
            },
            LegStep {
                maneuver: None,
                intersections: vec![motorway(7)],
            },
        ];

        let updated = handler()
            .handle_action(decrease_at(route_with_steps(values(&[90; 10]), steps), 0, 100.0))
            .unwrap();

        assert_eq!(
            congestion(&updated),
            values(&[59, 59, 59, 59, 59, 59, 59, 90, 90, 90])
        );
    }

    #[test]
    fn stops_at_motorway_exit() {
        let steps = vec![LegStep {
            maneuver: None,
            intersections: vec![
                motorway(0),
                StepIntersection {
                    geometry_index: 4,
                    road_class: Some(RoadClass::Primary),
                },
            ],
        }];

        let updated = handler()
            .handle_action(decrease_at(route_with_steps(values(&[90; 10]), steps), 0, 100.0))
            .unwrap();

        assert_eq!(
            congestion(&updated),
            values(&[59, 59, 59, 59, 90, 90, 90, 90, 90, 90])
        );
    }

    #[test]
    fn stops_where_on_ramp_merges() {
        let steps = vec![
            LegStep {
                maneuver: Some(StepManeuver {
                    maneuver_type: ManeuverType::OnRamp,
                }),
                intersections: vec![],
            },
            LegStep {
                maneuver: None,
                intersections: vec![
                    StepIntersection {
                        geometry_index: 3,
                        road_class: None,
                    },
                    StepIntersection {
                        geometry_index: 4,
                        road_class: None,
                    },
                ],
            },
        ];
        let mut action = decrease_at(route_with_steps(values(&[70; 10]), steps), 0, 100.0);
        action.leg_progress.step_index = 1;

        let updated = handler().handle_action(action).unwrap();

        assert_eq!(
            congestion(&updated),
            values(&[0, 0, 0, 0, 70, 70, 70, 70, 70, 70])
        );
        assert_eq!(
            updated.overridden_traffic(),
            Some(&CongestionNumericOverride {
                leg_index: 0,
                start_index: 0,
                length: 4,
                original_values: Some(values(&[70; 4])),
            })
        );
    }

    #[test]
    fn skipped_inside_existing_override_and_resumed_after_it() {
        let overridden = route(values(&[90; 10]))
            .with_leg_congestion(
                0,
                values(&[59, 59, 59, 59, 59, 90, 90, 90, 90, 90]),
                Some(CongestionNumericOverride {
                    leg_index: 0,
                    start_index: 0,
                    length: 5,
                    original_values: Some(values(&[90; 5])),
                }),
            )
            .unwrap();

        assert_eq!(
            handler().handle_action(decrease_at(overridden.clone(), 2, 80.0)),
            None
        );

        let updated = handler()
            .handle_action(decrease_at(overridden, 5, 80.0))
            .unwrap();
        assert_eq!(congestion(&updated), values(&[59; 10]));
        assert_eq!(
            updated.overridden_traffic(),
            Some(&CongestionNumericOverride {
                leg_index: 0,
                start_index: 5,
                length: 5,
                original_values: Some(values(&[90; 5])),
            })
        );
    }
}
