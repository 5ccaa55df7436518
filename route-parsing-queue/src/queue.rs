use crate::{AlternativesParsingResult, ParsingTaskCoordinator};
use std::future::Future;
use tracing::debug;

/// How aggressively the navigator saves memory on long routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongRoutesOptimisationOptions {
    /// Every response is parsed right away, concurrently with anything else.
    NoOptimisations,
    /// Responses larger than `response_to_parse_size_bytes` are parsed one at a time,
    /// and the memory held by previous routes is released before each of them.
    OptimiseNavigationForLongRoutes {
        current_route_length_meters: u64,
        response_to_parse_size_bytes: usize,
    },
}

/// What the queue knows about a directions response before parsing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteResponseInfo {
    pub size_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlternativesInfo {
    pub response: RouteResponseInfo,
    /// The user explicitly asked for new alternatives, rather than them arriving on a timer.
    pub user_triggered_alternatives_refresh: bool,
}

/// Handed to the parsing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseArguments {
    /// Parse into the compact structure used for long routes.
    pub optimise_directions_response_structure: bool,
}

/// Applies the long route optimisation policy on top of a [`ParsingTaskCoordinator`].
pub struct RoutesParsingQueue {
    options: LongRoutesOptimisationOptions,
    coordinator: ParsingTaskCoordinator,
}

impl RoutesParsingQueue {
    pub fn new(options: LongRoutesOptimisationOptions) -> Self {
        RoutesParsingQueue {
            options,
            coordinator: ParsingTaskCoordinator::new(),
        }
    }

    pub fn coordinator(&self) -> &ParsingTaskCoordinator {
        &self.coordinator
    }

    /// The action only ever runs for responses that go through the coordinator lane.
    pub fn set_prepare_for_parsing_action(&self, action: impl Fn() + Send + Sync + 'static) {
        self.coordinator.set_prepare_for_parsing_action(action);
    }

    fn parse_arguments(&self) -> ParseArguments {
        ParseArguments {
            optimise_directions_response_structure: matches!(
                self.options,
                LongRoutesOptimisationOptions::OptimiseNavigationForLongRoutes { .. }
            ),
        }
    }

    fn needs_exclusive_lane(&self, response: RouteResponseInfo) -> bool {
        match self.options {
            LongRoutesOptimisationOptions::NoOptimisations => false,
            LongRoutesOptimisationOptions::OptimiseNavigationForLongRoutes {
                response_to_parse_size_bytes,
                ..
            } => response.size_bytes > response_to_parse_size_bytes,
        }
    }

    /// Parses a primary route response (new routes, reroute or refresh).
    pub async fn parse_route_response<F, Fut, T>(&self, response: RouteResponseInfo, work: F) -> T
    where
        F: FnOnce(ParseArguments) -> Fut,
        Fut: Future<Output = T>,
    {
        let arguments = self.parse_arguments();
        if self.needs_exclusive_lane(response) {
            self.coordinator
                .parse_route_response(|| work(arguments))
                .await
        } else {
            work(arguments).await
        }
    }

    /// Parses alternative routes, unless they are already stale.
    pub async fn parse_alternatives<F, Fut, T>(
        &self,
        alternatives: AlternativesInfo,
        work: F,
    ) -> AlternativesParsingResult<T>
    where
        F: FnOnce(ParseArguments) -> Fut,
        Fut: Future<Output = T>,
    {
        let arguments = self.parse_arguments();
        match self.options {
            LongRoutesOptimisationOptions::NoOptimisations => {
                AlternativesParsingResult::Parsed(work(arguments).await)
            }
            LongRoutesOptimisationOptions::OptimiseNavigationForLongRoutes { .. }
                if alternatives.user_triggered_alternatives_refresh =>
            {
                debug!("Skipping user triggered alternatives refresh on a long route");
                AlternativesParsingResult::NotActual
            }
            LongRoutesOptimisationOptions::OptimiseNavigationForLongRoutes { .. } => {
                if self.needs_exclusive_lane(alternatives.response) {
                    self.coordinator
                        .parse_alternatives(|| work(arguments))
                        .await
                } else {
                    AlternativesParsingResult::Parsed(work(arguments).await)
                }
            }
        }
    }
}
