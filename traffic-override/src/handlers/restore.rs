use super::TrafficUpdateActionHandler;
use crate::action::RestoreTraffic;
use crate::mutator::restore_traffic;
use navigation_route::NavigationRoute;
use tracing::{info, warn};

/// Puts the routing service's congestion values back.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreTrafficHandler;

impl TrafficUpdateActionHandler<RestoreTraffic> for RestoreTrafficHandler {
    fn handle_action(&self, action: RestoreTraffic) -> Option<NavigationRoute> {
        let RestoreTraffic {
            route,
            congestion_override,
        } = action;
        match restore_traffic(&route, &congestion_override) {
            Ok(restored) => {
                info!(
                    route_id = route.id(),
                    start_index = congestion_override.start_index,
                    length = congestion_override.length,
                    "Restored congestion override"
                );
                Some(restored)
            }
            Err(error) => {
                warn!(%error, "Failed to restore traffic");
                None
            }
        }
    }
}
