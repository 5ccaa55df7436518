use crate::{MetersPerSecond, NavigationRoute, RouteLeg};
use serde::{Deserialize, Serialize};

/// How confident the route-following engine is about the current position on the route.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteProgressState {
    Initialized,
    Tracking,
    Complete,
    OffRoute,
    Uncertain,
}

/// Where the vehicle currently is along a route leg.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RouteLegProgress {
    pub leg_index: usize,
    /// Index into the leg geometry (and therefore into the leg annotations).
    pub geometry_index: usize,
    pub step_index: usize,
    /// Index of the most recently passed intersection within the current step.
    pub intersection_index: usize,
    /// Meters remaining until the end of the leg.
    pub distance_remaining: f64,
}

impl RouteLegProgress {
    /// Finds the leg this progress refers to on the given route.
    pub fn leg<'a>(&self, route: &'a NavigationRoute) -> Option<&'a RouteLeg> {
        route.leg(self.leg_index)
    }

    /// The geometry index of the first intersection of the step after the current one.
    pub fn upcoming_step_first_geometry_index(&self, leg: &RouteLeg) -> Option<usize> {
        leg.first_intersection_geometry_index(self.step_index.checked_add(1)?)
    }
}

/// A snapshot of progress along a route, produced by the route-following engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteProgress {
    pub state: RouteProgressState,
    pub route: NavigationRoute,
    pub current_leg_progress: Option<RouteLegProgress>,
}

/// The map-matched location sample accompanying each progress update.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct LocationMatcherResult {
    /// Current speed, if the location provider reported one.
    pub speed: Option<MetersPerSecond>,
}
