use super::TrafficUpdateActionHandler;
use crate::action::IncreaseTraffic;
use crate::mutator::{CongestionUpdate, update_traffic};
use crate::segments_within_distance;
use navigation_route::NavigationRoute;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Computes an overridden congestion value from the existing one and a reference value.
pub type CongestionTransform = Arc<dyn Fn(u8, u8) -> u8 + Send + Sync>;

/// Raises congestion over the near window to the expected level,
/// then fades it out over the far window.
///
/// The override never extends past the point where the route leaves the motorway,
/// and always keeps the original values so it can be restored.
pub struct IncreaseTrafficHandler {
    near_window_meters: f64,
    far_window_meters: f64,
    transform_near: CongestionTransform,
    transform_far: CongestionTransform,
}

impl IncreaseTrafficHandler {
    pub fn new(near_window_meters: f64, far_window_meters: f64) -> Self {
        IncreaseTrafficHandler {
            near_window_meters,
            far_window_meters,
            transform_near: Arc::new(|existing: u8, expected: u8| existing.max(expected)),
            transform_far: Arc::new(|existing: u8, last_near: u8| {
                existing.max(last_near / 2 + existing / 2)
            }),
        }
    }

    #[must_use]
    pub fn with_transforms(
        self,
        transform_near: impl Fn(u8, u8) -> u8 + Send + Sync + 'static,
        transform_far: impl Fn(u8, u8) -> u8 + Send + Sync + 'static,
    ) -> Self {
        IncreaseTrafficHandler {
            transform_near: Arc::new(transform_near),
            transform_far: Arc::new(transform_far),
            ..self
        }
    }
}

impl TrafficUpdateActionHandler<IncreaseTraffic> for IncreaseTrafficHandler {
    fn handle_action(&self, action: IncreaseTraffic) -> Option<NavigationRoute> {
        let IncreaseTraffic {
            route,
            leg_progress,
            expected_congestion,
        } = action;
        let leg = leg_progress.leg(&route)?;
        let Some(distances) = leg.distances() else {
            debug!(
                leg_index = leg_progress.leg_index,
                "Leg has no distance annotation; can't size the override window"
            );
            return None;
        };

        let start_index = leg_progress.geometry_index;
        // The driver's own segment is always covered, however long it is.
        let near_window =
            segments_within_distance(distances, start_index, self.near_window_meters).max(1);
        let far_window = segments_within_distance(
            distances,
            start_index + near_window,
            self.far_window_meters,
        );
        let hard_limit_index = leg.motorway_exit_geometry_index(
            leg_progress.step_index,
            leg_progress.intersection_index,
        );
        debug!(
            start_index,
            near_window,
            far_window,
            ?hard_limit_index,
            "Increasing traffic"
        );

        let update = CongestionUpdate {
            expected_congestion,
            near_window,
            far_window,
            hard_limit_index,
            keep_original: true,
            transform_near: &*self.transform_near,
            transform_far: &*self.transform_far,
        };
        match update_traffic(&route, &leg_progress, &update) {
            Ok(updated) => {
                info!(
                    route_id = route.id(),
                    start_index, expected_congestion, "Raised congestion ahead of the driver"
                );
                Some(updated)
            }
            Err(error) => {
                warn!(%error, "Failed to increase traffic");
                None
            }
        }
    }
}
