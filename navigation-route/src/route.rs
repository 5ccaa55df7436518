use crate::{LegAnnotation, RouteModelError};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// OSM-derived road classes, as reported on step intersections.
#[repr(u8)]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Unclassified,
    Residential,
    ServiceOther,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StepIntersection {
    /// Index into the leg geometry where this intersection is located.
    pub geometry_index: usize,
    pub road_class: Option<RoadClass>,
}

/// Maneuver types as reported by the Directions API.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ManeuverType {
    Depart,
    Arrive,
    Turn,
    Continue,
    Merge,
    #[serde(rename = "on ramp")]
    OnRamp,
    #[serde(rename = "off ramp")]
    OffRamp,
    Fork,
    #[serde(rename = "end of road")]
    EndOfRoad,
    #[serde(rename = "new name")]
    NewName,
    Roundabout,
    Rotary,
    #[serde(other)]
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepManeuver {
    #[serde(rename = "type")]
    pub maneuver_type: ManeuverType,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LegStep {
    pub maneuver: Option<StepManeuver>,
    #[serde(default)]
    pub intersections: Vec<StepIntersection>,
}

impl LegStep {
    pub fn maneuver_type(&self) -> Option<ManeuverType> {
        self.maneuver.map(|maneuver| maneuver.maneuver_type)
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RouteLeg {
    pub annotation: Option<LegAnnotation>,
    #[serde(default)]
    pub steps: Vec<LegStep>,
}

impl RouteLeg {
    /// The numeric congestion annotation for this leg, if it was requested.
    pub fn congestion_numeric(&self) -> Option<&[Option<u8>]> {
        self.annotation.as_ref()?.congestion_numeric.as_deref()
    }

    /// The segment length annotation for this leg, if it was requested.
    pub fn distances(&self) -> Option<&[f64]> {
        self.annotation.as_ref()?.distance.as_deref()
    }

    pub fn intersection(
        &self,
        step_index: usize,
        intersection_index: usize,
    ) -> Option<&StepIntersection> {
        self.steps.get(step_index)?.intersections.get(intersection_index)
    }

    /// The geometry index of the first intersection of the given step.
    pub fn first_intersection_geometry_index(&self, step_index: usize) -> Option<usize> {
        self.steps
            .get(step_index)?
            .intersections
            .first()
            .map(|intersection| intersection.geometry_index)
    }

    /// Finds where the route leaves the motorway network.
    ///
    /// Scans intersections from the current one onwards (in step order)
    /// and returns the geometry index of the first one with a known, non-motorway road class.
    pub fn motorway_exit_geometry_index(
        &self,
        step_index: usize,
        intersection_index: usize,
    ) -> Option<usize> {
        self.steps
            .iter()
            .enumerate()
            .skip(step_index)
            .flat_map(|(index, step)| {
                let skip = if index == step_index {
                    intersection_index
                } else {
                    0
                };
                step.intersections.iter().skip(skip)
            })
            .find(|intersection| {
                intersection
                    .road_class
                    .is_some_and(|road_class| road_class != RoadClass::Motorway)
            })
            .map(|intersection| intersection.geometry_index)
    }

    /// Where the merge after an on-ramp ends.
    ///
    /// If the step before `step_index` took an on-ramp,
    /// returns the geometry index of the second intersection of step `step_index`.
    pub fn on_ramp_merge_geometry_index(&self, step_index: usize) -> Option<usize> {
        let previous = self.steps.get(step_index.checked_sub(1)?)?;
        if previous.maneuver_type() != Some(ManeuverType::OnRamp) {
            return None;
        }
        self.steps
            .get(step_index)?
            .intersections
            .get(1)
            .map(|intersection| intersection.geometry_index)
    }

    /// Returns a copy of this leg with its congestion annotation replaced.
    fn with_congestion_numeric(&self, congestion_numeric: Vec<Option<u8>>) -> RouteLeg {
        let annotation = LegAnnotation {
            congestion_numeric: Some(congestion_numeric),
            ..self.annotation.clone().unwrap_or_default()
        };
        RouteLeg {
            annotation: Some(annotation),
            steps: self.steps.clone(),
        }
    }
}

/// Describes the one locally overridden range of congestion values on a route.
///
/// `original_values` holds the values that were replaced (when the caller asked to keep them),
/// so that the override can be undone later.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CongestionNumericOverride {
    pub leg_index: usize,
    pub start_index: usize,
    pub length: usize,
    pub original_values: Option<Vec<Option<u8>>>,
}

impl CongestionNumericOverride {
    /// The geometry indices covered by this override.
    pub fn range(&self) -> Range<usize> {
        self.start_index..self.start_index.saturating_add(self.length)
    }

    pub fn contains(&self, leg_index: usize, geometry_index: usize) -> bool {
        self.leg_index == leg_index && self.range().contains(&geometry_index)
    }

    /// The value that was in place at `geometry_index` before this override, if it was kept.
    ///
    /// The outer `Option` tells whether the override knows anything about the index;
    /// the inner one is the (possibly missing) original annotation value.
    pub fn original_value_at(&self, leg_index: usize, geometry_index: usize) -> Option<Option<u8>> {
        if !self.contains(leg_index, geometry_index) {
            return None;
        }
        self.original_values
            .as_ref()?
            .get(geometry_index - self.start_index)
            .copied()
    }
}

/// A route as returned by the routing service, plus any local traffic override.
///
/// Legs are reference counted,
/// so deriving a new route from an existing one only allocates the legs that actually change.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NavigationRoute {
    id: String,
    legs: Vec<Arc<RouteLeg>>,
    #[serde(default)]
    overridden_traffic: Option<CongestionNumericOverride>,
}

impl NavigationRoute {
    pub fn new(id: impl Into<String>, legs: Vec<RouteLeg>) -> Self {
        NavigationRoute {
            id: id.into(),
            legs: legs.into_iter().map(Arc::new).collect(),
            overridden_traffic: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn legs(&self) -> &[Arc<RouteLeg>] {
        &self.legs
    }

    pub fn leg(&self, leg_index: usize) -> Option<&RouteLeg> {
        self.legs.get(leg_index).map(AsRef::as_ref)
    }

    pub fn overridden_traffic(&self) -> Option<&CongestionNumericOverride> {
        self.overridden_traffic.as_ref()
    }

    /// Derives a route with one leg's congestion annotation replaced
    /// and the override tag set to `overridden_traffic`.
    ///
    /// # Errors
    ///
    /// Fails if the route has no leg at `leg_index`.
    pub fn with_leg_congestion(
        &self,
        leg_index: usize,
        congestion_numeric: Vec<Option<u8>>,
        overridden_traffic: Option<CongestionNumericOverride>,
    ) -> Result<NavigationRoute, RouteModelError> {
        let leg = self
            .legs
            .get(leg_index)
            .ok_or(RouteModelError::LegIndexOutOfRange {
                leg_index,
                leg_count: self.legs.len(),
            })?;

        let mut legs = self.legs.clone();
        legs[leg_index] = Arc::new(leg.with_congestion_numeric(congestion_numeric));

        Ok(NavigationRoute {
            id: self.id.clone(),
            legs,
            overridden_traffic,
        })
    }

    /// Derives a route with new legs, keeping the identifier and override tag.
    pub(crate) fn with_legs(&self, legs: Vec<Arc<RouteLeg>>) -> NavigationRoute {
        NavigationRoute {
            id: self.id.clone(),
            legs,
            overridden_traffic: self.overridden_traffic.clone(),
        }
    }

    /// Returns the same route without any local traffic override.
    ///
    /// Congestion values are left as they are;
    /// this is for routes which were freshly fetched from the routing service.
    #[must_use]
    pub fn without_overridden_traffic(&self) -> NavigationRoute {
        NavigationRoute {
            overridden_traffic: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intersection(geometry_index: usize, road_class: Option<RoadClass>) -> StepIntersection {
        StepIntersection {
            geometry_index,
            road_class,
        }
    }

    fn motorway_leg() -> RouteLeg {
        RouteLeg {
            annotation: Some(LegAnnotation {
                congestion_numeric: Some(vec![Some(0); 6]),
                ..Default::default()
            }),
            steps: vec![
                LegStep {
                    maneuver: None,
                    intersections: vec![
                        intersection(0, Some(RoadClass::Motorway)),
                        intersection(2, None),
                    ],
                },
                LegStep {
                    maneuver: None,
                    intersections: vec![
                        intersection(3, Some(RoadClass::Motorway)),
                        intersection(4, Some(RoadClass::Trunk)),
                    ],
                },
            ],
        }
    }

    #[test]
    fn finds_motorway_exit() {
        let leg = motorway_leg();
        assert_eq!(leg.motorway_exit_geometry_index(0, 0), Some(4));
        assert_eq!(leg.motorway_exit_geometry_index(1, 1), Some(4));
        assert_eq!(leg.first_intersection_geometry_index(1), Some(3));
        assert_eq!(leg.first_intersection_geometry_index(2), None);
        assert_eq!(
            leg.intersection(0, 0).and_then(|i| i.road_class),
            Some(RoadClass::Motorway)
        );
    }

    #[test]
    fn finds_merge_after_on_ramp() {
        let steps: Vec<LegStep> = serde_json::from_str(
            r#"[
                {"maneuver": {"type": "on ramp"}, "intersections": []},
                {"intersections": [{"geometry_index": 3}, {"geometry_index": 4}]},
                {"maneuver": {"type": "exit roundabout"}, "intersections": [{"geometry_index": 6}]}
            ]"#,
        )
        .unwrap();
        let leg = RouteLeg {
            annotation: None,
            steps,
        };

        assert_eq!(leg.steps[0].maneuver_type(), Some(ManeuverType::OnRamp));
        assert_eq!(leg.steps[2].maneuver_type(), Some(ManeuverType::Other));
        assert_eq!(leg.on_ramp_merge_geometry_index(1), Some(4));
        assert_eq!(leg.on_ramp_merge_geometry_index(0), None);
        assert_eq!(leg.on_ramp_merge_geometry_index(2), None);
        assert_eq!(motorway_leg().on_ramp_merge_geometry_index(1), None);
    }

    #[test]
    fn derived_routes_share_untouched_legs() {
        let route = NavigationRoute::new("route", vec![motorway_leg(), motorway_leg()]);
        let override_tag = CongestionNumericOverride {
            leg_index: 1,
            start_index: 0,
            length: 1,
            original_values: None,
        };
        let derived = route
            .with_leg_congestion(1, vec![Some(90); 6], Some(override_tag.clone()))
            .unwrap();

        assert!(Arc::ptr_eq(&route.legs()[0], &derived.legs()[0]));
        assert_eq!(route.leg(1).unwrap().congestion_numeric(), Some(&[Some(0); 6][..]));
        assert_eq!(
            derived.leg(1).unwrap().congestion_numeric(),
            Some(&[Some(90); 6][..])
        );
        assert_eq!(derived.overridden_traffic(), Some(&override_tag));
        assert_eq!(route.overridden_traffic(), None);
        assert_eq!(derived.without_overridden_traffic().overridden_traffic(), None);
    }

    #[test]
    fn rejects_unknown_legs() {
        let route = NavigationRoute::new("route", vec![motorway_leg()]);
        assert_eq!(
            route.with_leg_congestion(3, vec![], None),
            Err(RouteModelError::LegIndexOutOfRange {
                leg_index: 3,
                leg_count: 1
            })
        );
    }

    #[test]
    fn override_lookups() {
        let override_tag = CongestionNumericOverride {
            leg_index: 0,
            start_index: 2,
            length: 3,
            original_values: Some(vec![Some(10), None, Some(30)]),
        };

        assert!(override_tag.contains(0, 2));
        assert!(!override_tag.contains(0, 5));
        assert!(!override_tag.contains(1, 3));
        assert_eq!(override_tag.original_value_at(0, 2), Some(Some(10)));
        assert_eq!(override_tag.original_value_at(0, 3), Some(None));
        assert_eq!(override_tag.original_value_at(0, 1), None);
    }

    #[test]
    fn route_json_round_trips_override() {
        let json = r#"{
            "id": "abc",
            "legs": [{"annotation": {"congestion_numeric": [75, 75, 0]}, "steps": []}],
            "overridden_traffic": {"leg_index": 0, "start_index": 0, "length": 2, "original_values": [0, 0]}
        }"#;
        let route: NavigationRoute = serde_json::from_str(json).unwrap();
        assert_eq!(route.id(), "abc");
        assert_eq!(
            route.overridden_traffic().map(CongestionNumericOverride::range),
            Some(0..2)
        );

        let fresh: NavigationRoute =
            serde_json::from_str(r#"{"id": "fresh", "legs": []}"#).unwrap();
        assert_eq!(fresh.overridden_traffic(), None);
    }
}
