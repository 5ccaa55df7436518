//! # Traffic update action handlers
//!
//! One handler per [`crate::TrafficUpdateAction`] variant.
//! Handlers turn an action into a new route, or decide that nothing should change.
//! They never fail loudly: a route which can't be updated is logged and left as it is.

mod decrease;
mod increase;
mod restore;

pub use decrease::DecreaseTrafficHandler;
pub use increase::{CongestionTransform, IncreaseTrafficHandler};
pub use restore::RestoreTrafficHandler;

use navigation_route::NavigationRoute;

pub trait TrafficUpdateActionHandler<A> {
    /// Returns the updated route, or `None` if the route should stay as it is.
    fn handle_action(&self, action: A) -> Option<NavigationRoute>;
}
