//! # Route refresh
//!
//! Merges freshly fetched annotations into an existing route.
//!
//! A refresh only covers the part of the route ahead of the driver:
//! the current leg is refreshed from the current geometry index onwards,
//! later legs in full, and earlier legs are left alone.
//! Locally overridden congestion values win over refreshed ones,
//! so that a refresh does not undo a live traffic override.

use crate::{LegAnnotation, NavigationRoute, RouteLeg};
use std::ops::Range;
use std::sync::Arc;

/// Merges `new` into `old`, starting at `start_index`.
///
/// Every annotation array follows the same rules:
///
/// - If the old route didn't have the array, the merged one doesn't either.
/// - If `start_index` is past the end of the old array, the merge is impossible and the array is dropped.
/// - If the refresh doesn't include the array, the old one is kept.
/// - Otherwise the result is `old[..start_index]` followed by the new values.
///
/// Within `preserved`, congestion values are taken from `old` regardless of the refresh.
pub fn merge_annotations(
    old: Option<&LegAnnotation>,
    new: Option<&LegAnnotation>,
    start_index: usize,
    preserved: Option<Range<usize>>,
) -> Option<LegAnnotation> {
    let old = old?;
    let Some(new) = new else {
        return Some(old.clone());
    };

    let mut congestion_numeric = merge_array(
        old.congestion_numeric.as_deref(),
        new.congestion_numeric.as_deref(),
        start_index,
    );
    if let (Some(merged), Some(previous), Some(preserved)) = (
        congestion_numeric.as_mut(),
        old.congestion_numeric.as_deref(),
        preserved,
    ) {
        let end = preserved.end.min(merged.len()).min(previous.len());
        if preserved.start < end {
            merged[preserved.start..end].copy_from_slice(&previous[preserved.start..end]);
        }
    }

    Some(LegAnnotation {
        distance: merge_array(old.distance.as_deref(), new.distance.as_deref(), start_index),
        congestion_numeric,
        freeflow_speed: merge_array(
            old.freeflow_speed.as_deref(),
            new.freeflow_speed.as_deref(),
            start_index,
        ),
        maxspeed: merge_array(old.maxspeed.as_deref(), new.maxspeed.as_deref(), start_index),
    })
}

fn merge_array<T: Clone>(old: Option<&[T]>, new: Option<&[T]>, start_index: usize) -> Option<Vec<T>> {
    let old = old?;
    if start_index > old.len() {
        return None;
    }
    match new {
        None => Some(old.to_vec()),
        Some(new) => Some(old[..start_index].iter().chain(new).cloned().collect()),
    }
}

impl NavigationRoute {
    /// Derives a route with refreshed annotations.
    ///
    /// `annotations` is indexed like the route legs.
    /// Legs before `current_leg_index` are never touched,
    /// and the current leg is refreshed starting at `current_geometry_index`.
    /// The override tag is carried over, and the overridden range keeps its local values.
    #[must_use]
    pub fn with_refreshed_annotations(
        &self,
        annotations: &[Option<LegAnnotation>],
        current_leg_index: usize,
        current_geometry_index: usize,
    ) -> NavigationRoute {
        let legs = self
            .legs()
            .iter()
            .enumerate()
            .map(|(index, leg)| {
                if index < current_leg_index {
                    return Arc::clone(leg);
                }
                let start_index = if index == current_leg_index {
                    current_geometry_index
                } else {
                    0
                };
                let preserved = self
                    .overridden_traffic()
                    .filter(|tag| tag.leg_index == index)
                    .map(crate::CongestionNumericOverride::range);
                let annotation = merge_annotations(
                    leg.annotation.as_ref(),
                    annotations.get(index).and_then(Option::as_ref),
                    start_index,
                    preserved,
                );
                Arc::new(RouteLeg {
                    annotation,
                    steps: leg.steps.clone(),
                })
            })
            .collect();

        self.with_legs(legs)
    }
}
