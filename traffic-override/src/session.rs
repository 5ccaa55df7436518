//! # Traffic override session
//!
//! Ties the pieces together for one navigation session:
//! each location update is analyzed, turned into an action, handled,
//! and any resulting route goes through the parsing coordinator before it is published.

use crate::handlers::{
    DecreaseTrafficHandler, IncreaseTrafficHandler, RestoreTrafficHandler,
    TrafficUpdateActionHandler,
};
use crate::{
    OptionsError, SpeedAnalysisResult, SpeedAnalyzer, TrafficOverrideOptions, TrafficUpdateAction,
};
use navigation_route::{LegAnnotation, LocationMatcherResult, NavigationRoute, RouteProgress};
use route_parsing_queue::ParsingTaskCoordinator;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// What happened on one location update.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub analysis: SpeedAnalysisResult,
    /// Name of the action the analysis led to (see [`TrafficUpdateAction::name`]).
    pub action: &'static str,
    /// The route published as a result of this update, if any.
    pub published: Option<NavigationRoute>,
}

impl TickOutcome {
    fn skipped(reason: &str) -> Self {
        TickOutcome {
            analysis: SpeedAnalysisResult::SkippedAnalysis {
                reason: reason.to_string(),
            },
            action: TrafficUpdateAction::NoAction.name(),
            published: None,
        }
    }
}

/// Owns the current route and keeps its congestion annotations in line with live speed.
///
/// The current route is published through a [`watch`] channel;
/// consumers such as ETA estimation or route line rendering subscribe to it.
///
/// Every change to the current route bumps a generation counter.
/// A route derived from an older generation is dropped instead of published,
/// so an override computed while a new route was being set never replaces that route.
pub struct TrafficOverrideSession {
    enabled: bool,
    analyzer: SpeedAnalyzer,
    increase: IncreaseTrafficHandler,
    decrease: DecreaseTrafficHandler,
    restore: RestoreTrafficHandler,
    coordinator: Arc<ParsingTaskCoordinator>,
    route: watch::Sender<Option<NavigationRoute>>,
    /// Only written while the route channel is locked for writing.
    generation: AtomicU64,
}

impl TrafficOverrideSession {
    /// # Errors
    ///
    /// Fails if the options are invalid.
    pub fn new(
        options: TrafficOverrideOptions,
        coordinator: Arc<ParsingTaskCoordinator>,
    ) -> Result<Self, OptionsError> {
        let options = options.validated()?;
        let ahead_distance = options.ahead_distance_calculator();
        Ok(TrafficOverrideSession {
            enabled: options.enabled,
            analyzer: SpeedAnalyzer::new(options.high_speed_threshold()?),
            increase: IncreaseTrafficHandler::new(
                options.near_window_meters,
                options.far_window_meters,
            ),
            decrease: DecreaseTrafficHandler::new(options.congestion_ranges, ahead_distance),
            restore: RestoreTrafficHandler,
            coordinator,
            route: watch::Sender::new(None),
            generation: AtomicU64::new(0),
        })
    }

    /// Replaces the increase handler, e.g. to use custom congestion transforms.
    #[must_use]
    pub fn with_increase_handler(self, increase: IncreaseTrafficHandler) -> Self {
        TrafficOverrideSession { increase, ..self }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<NavigationRoute>> {
        self.route.subscribe()
    }

    pub fn current_route(&self) -> Option<NavigationRoute> {
        self.route.borrow().clone()
    }

    /// Starts tracking a freshly fetched route.
    ///
    /// Local overrides never survive a new route.
    pub fn set_route(&self, route: NavigationRoute) {
        debug!(route_id = route.id(), "New route set");
        self.replace_route(Some(route.without_overridden_traffic()));
    }

    pub fn clear_route(&self) {
        self.replace_route(None);
    }

    fn replace_route(&self, route: Option<NavigationRoute>) {
        self.route.send_modify(|current| {
            *current = route;
            self.generation.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// The current route, along with its generation.
    fn snapshot(&self) -> Option<(NavigationRoute, u64)> {
        let current = self.route.borrow();
        let route = current.as_ref()?.clone();
        Some((route, self.generation.load(Ordering::Relaxed)))
    }

    /// Applies a route refresh to the current route.
    ///
    /// `annotations` is indexed like the route legs;
    /// the current leg is refreshed from `geometry_index` onwards and earlier legs are left alone.
    /// A local override survives the refresh.
    pub async fn on_route_refreshed(
        &self,
        annotations: &[Option<LegAnnotation>],
        leg_index: usize,
        geometry_index: usize,
    ) -> Option<NavigationRoute> {
        let Some((route, generation)) = self.snapshot() else {
            debug!("Ignoring route refresh, no route is set");
            return None;
        };
        let refreshed = route.with_refreshed_annotations(annotations, leg_index, geometry_index);
        debug!(route_id = refreshed.id(), leg_index, geometry_index, "Route refreshed");
        self.publish(refreshed, generation).await
    }

    /// Processes one location update.
    ///
    /// The analysis always runs against the session's own copy of the route,
    /// which may carry an override the route-following engine doesn't know about.
    pub async fn on_location_update(
        &self,
        route_progress: &RouteProgress,
        location: &LocationMatcherResult,
    ) -> TickOutcome {
        if !self.enabled {
            return TickOutcome::skipped("Traffic override is disabled");
        }
        let Some((route, generation)) = self.snapshot() else {
            return TickOutcome::skipped("No route is set");
        };
        if route.id() != route_progress.route.id() {
            return TickOutcome::skipped("Route progress refers to a different route");
        }

        let route_progress = RouteProgress {
            state: route_progress.state,
            route,
            current_leg_progress: route_progress.current_leg_progress,
        };
        let analysis = self.analyzer.analyze(&route_progress, location);
        let action = TrafficUpdateAction::from(analysis.clone());
        let action_name = action.name();
        debug!(%analysis, action = action_name, "Analyzed location update");

        let updated = match action {
            TrafficUpdateAction::NoAction => None,
            TrafficUpdateAction::IncreaseTraffic(action) => self.increase.handle_action(action),
            TrafficUpdateAction::DecreaseTraffic(action) => self.decrease.handle_action(action),
            TrafficUpdateAction::RestoreTraffic(action) => self.restore.handle_action(action),
        };

        let published = match updated {
            Some(route) => self.publish(route, generation).await,
            None => None,
        };
        TickOutcome {
            analysis,
            action: action_name,
            published,
        }
    }

    /// Publishes `route` if the current route is still the one of `generation`.
    async fn publish(&self, route: NavigationRoute, generation: u64) -> Option<NavigationRoute> {
        let route = self
            .coordinator
            .parse_route_response(|| async move { route })
            .await;

        // The route may have changed while waiting for the coordinator.
        let published = self.route.send_if_modified(|current| {
            if current.is_none() || self.generation.load(Ordering::Relaxed) != generation {
                return false;
            }
            *current = Some(route.clone());
            self.generation.fetch_add(1, Ordering::Relaxed);
            true
        });
        if published {
            Some(route)
        } else {
            debug!(
                route_id = route.id(),
                generation, "Dropping update derived from a route which is no longer current"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::tests::{motorway_route, moving_at, tracking};
    use navigation_route::{CongestionNumericOverride, RouteProgressState};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    fn options() -> TrafficOverrideOptions {
        TrafficOverrideOptions {
            near_window_meters: 200.0,
            far_window_meters: 200.0,
            ..Default::default()
        }
    }

    fn session() -> TrafficOverrideSession {
        TrafficOverrideSession::new(options(), Arc::new(ParsingTaskCoordinator::new())).unwrap()
    }

    fn current_congestion(session: &TrafficOverrideSession) -> Vec<Option<u8>> {
        session
            .current_route()
            .and_then(|route| route.leg(0)?.congestion_numeric().map(<[_]>::to_vec))
            .unwrap()
    }

    #[tokio::test]
    async fn overrides_then_restores_congestion() {
        let session = session();
        let route = motorway_route(vec![Some(0); 5]);
        session.set_route(route.clone());

        let slow = session
            .on_location_update(&tracking(route.clone(), 0), &moving_at(5.0))
            .await;
        assert_eq!(slow.action, "increase_traffic");
        assert!(slow.published.is_some());
        assert_eq!(
            current_congestion(&session),
            vec![Some(75), Some(75), Some(37), Some(37), Some(0)]
        );

        let still_slow = session
            .on_location_update(&tracking(route.clone(), 1), &moving_at(5.0))
            .await;
        assert!(matches!(
            still_slow.analysis,
            SpeedAnalysisResult::SpeedMatchesCongestionLevel { .. }
        ));
        assert_eq!(still_slow.published, None);

        let recovered = session
            .on_location_update(&tracking(route.clone(), 1), &moving_at(19.0))
            .await;
        assert_eq!(recovered.action, "restore_traffic");
        assert_eq!(current_congestion(&session), vec![Some(0); 5]);
        assert_eq!(
            session.current_route().and_then(|r| r.overridden_traffic().cloned()),
            None
        );
    }

    #[tokio::test]
    async fn custom_transforms_hold_the_expected_congestion() {
        let session = session().with_increase_handler(
            IncreaseTrafficHandler::new(200.0, 200.0)
                .with_transforms(|_, expected| expected, |_, last_near| last_near),
        );
        let route = motorway_route(vec![Some(0); 5]);
        session.set_route(route.clone());

        session
            .on_location_update(&tracking(route, 0), &moving_at(5.0))
            .await;

        assert_eq!(
            current_congestion(&session),
            vec![Some(75), Some(75), Some(75), Some(75), Some(0)]
        );
    }

    #[tokio::test]
    async fn subscribers_see_published_routes() {
        let session = session();
        let mut routes = session.subscribe();
        let route = motorway_route(vec![Some(0); 5]);
        session.set_route(route.clone());
        assert!(routes.has_changed().unwrap());
        routes.borrow_and_update();

        session
            .on_location_update(&tracking(route, 0), &moving_at(5.0))
            .await;

        assert!(routes.has_changed().unwrap());
        let published = routes.borrow_and_update().clone().unwrap();
        assert_eq!(published.overridden_traffic().map(|o| o.length), Some(4));
    }

    #[tokio::test]
    async fn updates_go_through_the_coordinator() {
        let coordinator = Arc::new(ParsingTaskCoordinator::new());
        let prepared = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&prepared);
        coordinator.set_prepare_for_parsing_action(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let session = TrafficOverrideSession::new(options(), coordinator).unwrap();
        let route = motorway_route(vec![Some(0); 5]);
        session.set_route(route.clone());

        session
            .on_location_update(&tracking(route.clone(), 0), &moving_at(12.0))
            .await;
        assert_eq!(prepared.load(Ordering::SeqCst), 0);

        session
            .on_location_update(&tracking(route, 0), &moving_at(5.0))
            .await;
        assert_eq!(prepared.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn new_route_clears_overrides() {
        let session = session();
        let route = motorway_route(vec![Some(0); 5]);
        session.set_route(route.clone());
        session
            .on_location_update(&tracking(route, 0), &moving_at(5.0))
            .await;
        let overridden = session.current_route().unwrap();
        assert!(overridden.overridden_traffic().is_some());

        session.set_route(overridden);

        assert_eq!(
            session.current_route().and_then(|r| r.overridden_traffic().cloned()),
            None
        );
    }

    #[tokio::test]
    async fn skips_when_there_is_nothing_to_do() {
        let disabled = TrafficOverrideSession::new(
            TrafficOverrideOptions {
                enabled: false,
                ..options()
            },
            Arc::new(ParsingTaskCoordinator::new()),
        )
        .unwrap();
        let route = motorway_route(vec![Some(0); 5]);
        disabled.set_route(route.clone());
        let outcome = disabled
            .on_location_update(&tracking(route.clone(), 0), &moving_at(5.0))
            .await;
        insta::assert_snapshot!(outcome.analysis, @"SkippedAnalysis(Traffic override is disabled)");

        let session = session();
        let outcome = session
            .on_location_update(&tracking(route.clone(), 0), &moving_at(5.0))
            .await;
        insta::assert_snapshot!(outcome.analysis, @"SkippedAnalysis(No route is set)");

        session.set_route(NavigationRoute::new("other", vec![]));
        let outcome = session
            .on_location_update(&tracking(route.clone(), 0), &moving_at(5.0))
            .await;
        insta::assert_snapshot!(
            outcome.analysis,
            @"SkippedAnalysis(Route progress refers to a different route)"
        );

        session.set_route(route.clone());
        let off_route = RouteProgress {
            state: RouteProgressState::OffRoute,
            ..tracking(route, 0)
        };
        let outcome = session.on_location_update(&off_route, &moving_at(5.0)).await;
        assert_eq!(outcome.action, "no_action");
        assert_eq!(outcome.published, None);
    }

    async fn yield_a_few_times() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn override_for_a_replaced_route_is_dropped() {
        let coordinator = Arc::new(ParsingTaskCoordinator::new());
        let session = TrafficOverrideSession::new(options(), Arc::clone(&coordinator)).unwrap();
        let route = motorway_route(vec![Some(0); 5]);
        session.set_route(route.clone());

        // Keep the lane busy so the override has to wait for it.
        let (release, released) = oneshot::channel::<()>();
        let busy = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move {
                coordinator
                    .parse_route_response(|| async move {
                        let _ = released.await;
                    })
                    .await;
            }
        });
        yield_a_few_times().await;

        let progress = tracking(route, 0);
        let location = moving_at(5.0);
        let (outcome, ()) = tokio::join!(session.on_location_update(&progress, &location), async {
            yield_a_few_times().await;
            // Same id, fresh annotations.
            session.set_route(motorway_route(vec![Some(90); 5]));
            let _ = release.send(());
        });
        busy.await.unwrap();

        assert_eq!(outcome.action, "increase_traffic");
        assert_eq!(outcome.published, None);
        assert_eq!(current_congestion(&session), vec![Some(90); 5]);
        assert_eq!(
            session.current_route().and_then(|r| r.overridden_traffic().cloned()),
            None
        );
    }

    #[tokio::test]
    async fn refresh_keeps_the_local_override() {
        let session = session();
        assert_eq!(session.on_route_refreshed(&[], 0, 0).await, None);

        let route = motorway_route(vec![Some(0); 5]);
        session.set_route(route.clone());
        session
            .on_location_update(&tracking(route.clone(), 0), &moving_at(5.0))
            .await;

        let refresh = LegAnnotation {
            congestion_numeric: Some(vec![Some(10); 5]),
            ..Default::default()
        };
        let refreshed = session.on_route_refreshed(&[Some(refresh)], 0, 0).await;

        assert_eq!(refreshed, session.current_route());
        assert_eq!(
            current_congestion(&session),
            vec![Some(75), Some(75), Some(37), Some(37), Some(10)]
        );
        assert_eq!(
            session
                .current_route()
                .and_then(|r| r.overridden_traffic().map(CongestionNumericOverride::range)),
            Some(0..4)
        );

        let recovered = session
            .on_location_update(&tracking(route, 1), &moving_at(19.0))
            .await;
        assert_eq!(recovered.action, "restore_traffic");
        assert_eq!(
            current_congestion(&session),
            vec![Some(0), Some(0), Some(0), Some(0), Some(10)]
        );
    }

    #[test]
    fn invalid_options_are_rejected() {
        let result = TrafficOverrideSession::new(
            TrafficOverrideOptions {
                high_speed_threshold_kmh: f64::NAN,
                ..Default::default()
            },
            Arc::new(ParsingTaskCoordinator::new()),
        );
        assert!(matches!(
            result,
            Err(OptionsError::InvalidHighSpeedThreshold(_))
        ));
    }
}
