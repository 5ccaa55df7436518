use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteModelError {
    #[error("Leg index {leg_index} is out of range (the route has {leg_count} legs)")]
    LegIndexOutOfRange { leg_index: usize, leg_count: usize },
}
