//! # Route parsing arbitration
//!
//! Parsing a directions response for a long route is expensive,
//! and so is cloning the parsed result.
//! This crate makes sure that at most one such operation is in flight at a time
//! when that matters, and that best-effort alternative route work
//! is thrown away when a primary route update races with it.
//!
//! [`ParsingTaskCoordinator`] is the exclusive lane itself.
//! [`RoutesParsingQueue`] decides, per response, whether the lane is needed at all.

mod coordinator;
mod queue;

pub use coordinator::{AlternativesParsingResult, ParsingTaskCoordinator};
pub use queue::{
    AlternativesInfo, LongRoutesOptimisationOptions, ParseArguments, RouteResponseInfo,
    RoutesParsingQueue,
};
