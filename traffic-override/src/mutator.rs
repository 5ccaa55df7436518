//! # Congestion annotation mutation
//!
//! Overrides a window of a leg's `congestion_numeric` annotation,
//! and undoes such overrides later.
//!
//! Both operations build a new [`NavigationRoute`];
//! the input route is never touched.
//! The window always starts at the driver's position and is split in two:
//! the *near* part reflects the measured anomaly directly,
//! and the *far* part fades it out towards the server values
//! so that consumers don't see an abrupt step at the window boundary.

use navigation_route::{
    CongestionNumericOverride, MAX_CONGESTION, NavigationRoute, RouteLegProgress, RouteModelError,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("Leg index {leg_index} is out of range (the route has {leg_count} legs)")]
    LegIndexOutOfRange { leg_index: usize, leg_count: usize },
    #[error("Leg {leg_index} has no numeric congestion annotation")]
    MissingCongestionAnnotation { leg_index: usize },
    #[error("Nothing to override between geometry index {start_index} and {end_index}")]
    EmptyWindow { start_index: usize, end_index: usize },
}

impl From<RouteModelError> for MutationError {
    fn from(value: RouteModelError) -> Self {
        match value {
            RouteModelError::LegIndexOutOfRange {
                leg_index,
                leg_count,
            } => MutationError::LegIndexOutOfRange {
                leg_index,
                leg_count,
            },
        }
    }
}

/// Describes one congestion override.
///
/// Windows are counted in geometry segments, starting at the driver's geometry index
/// (see [`crate::segments_within_distance`] to get them from a distance).
/// Both transforms receive the existing value first.
/// The second argument is the expected congestion for the near window,
/// and the last value the near window produced for the far window.
pub struct CongestionUpdate<'a> {
    pub expected_congestion: u8,
    pub near_window: usize,
    pub far_window: usize,
    /// Exclusive geometry index the override must not reach, such as a motorway exit.
    pub hard_limit_index: Option<usize>,
    /// Snapshot the replaced values so the override can be restored.
    pub keep_original: bool,
    pub transform_near: &'a (dyn Fn(u8, u8) -> u8 + Send + Sync),
    pub transform_far: &'a (dyn Fn(u8, u8) -> u8 + Send + Sync),
}

fn leg_congestion(
    route: &NavigationRoute,
    leg_index: usize,
) -> Result<&[Option<u8>], MutationError> {
    let leg = route
        .leg(leg_index)
        .ok_or(MutationError::LegIndexOutOfRange {
            leg_index,
            leg_count: route.legs().len(),
        })?;
    leg.congestion_numeric()
        .ok_or(MutationError::MissingCongestionAnnotation { leg_index })
}

/// Derives a route with congestion overridden ahead of the driver.
///
/// Missing congestion values stay missing, and every written value is clamped to 100.
/// The returned route's override tag replaces any previous one.
/// Where the previous override kept originals, the new snapshot keeps *those* values,
/// so restoring always goes back to what the routing service sent.
///
/// # Errors
///
/// Fails if the leg doesn't exist or has no congestion annotation,
/// or if the window is empty because the driver is already at or past the end of the annotation
/// or the hard limit.
pub fn update_traffic(
    route: &NavigationRoute,
    leg_progress: &RouteLegProgress,
    update: &CongestionUpdate<'_>,
) -> Result<NavigationRoute, MutationError> {
    let leg_index = leg_progress.leg_index;
    let congestion = leg_congestion(route, leg_index)?;

    let start_index = leg_progress.geometry_index;
    let limit = update
        .hard_limit_index
        .map_or(congestion.len(), |limit| limit.min(congestion.len()));
    if start_index >= limit {
        return Err(MutationError::EmptyWindow {
            start_index,
            end_index: limit,
        });
    }
    let near_end = start_index.saturating_add(update.near_window).min(limit);
    let far_end = near_end.saturating_add(update.far_window).min(limit);

    let previous = route.overridden_traffic();
    let original_values = update.keep_original.then(|| {
        (start_index..far_end)
            .map(|index| {
                previous
                    .and_then(|previous| previous.original_value_at(leg_index, index))
                    .unwrap_or(congestion[index])
            })
            .collect()
    });

    let mut values = congestion.to_vec();
    let mut last_near_value = update.expected_congestion;
    for value in values[start_index..near_end].iter_mut().flatten() {
        *value = (update.transform_near)(*value, update.expected_congestion).min(MAX_CONGESTION);
        last_near_value = *value;
    }
    for value in values[near_end..far_end].iter_mut().flatten() {
        *value = (update.transform_far)(*value, last_near_value).min(MAX_CONGESTION);
    }

    let congestion_override = CongestionNumericOverride {
        leg_index,
        start_index,
        length: far_end - start_index,
        original_values,
    };
    Ok(route.with_leg_congestion(leg_index, values, Some(congestion_override))?)
}

/// Derives a route with an override undone.
///
/// Values inside the override window are replaced by the kept originals.
/// If the override didn't keep any, the values are left alone and only the tag is dropped.
///
/// # Errors
///
/// Fails if the override refers to a leg that doesn't exist or has no congestion annotation.
pub fn restore_traffic(
    route: &NavigationRoute,
    congestion_override: &CongestionNumericOverride,
) -> Result<NavigationRoute, MutationError> {
    let leg_index = congestion_override.leg_index;
    let mut values = leg_congestion(route, leg_index)?.to_vec();

    if let Some(original_values) = &congestion_override.original_values {
        let end = congestion_override.range().end.min(values.len());
        let start = congestion_override.start_index.min(end);
        for (value, original) in values[start..end].iter_mut().zip(original_values) {
            *value = *original;
        }
    }

    Ok(route.with_leg_congestion(leg_index, values, None)?)
}
