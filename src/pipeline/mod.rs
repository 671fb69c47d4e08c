//! # Pipeline Dispatch Engine
//!
//! The mediator core: composes, per request type, a nested chain of
//! cross-cutting behaviors terminating in exactly one handler, and
//! dispatches request instances through it.
//!
//! ## Architecture
//!
//! ```text
//! Mediator::send(request)
//! └── PipelineCache (per request type, built once, reused concurrently)
//!     └── Pipeline<R>
//!         └── B1 ── B2 ── ... ── Bn ── RequestHandler<R>
//!             (entry order = registration order; exit order = reverse)
//! ```
//!
//! Behaviors run inside the caller's execution context; there is no
//! dedicated pipeline thread. Each behavior may rewrite mutable parts of the
//! request, short-circuit without calling the rest of the chain, transform
//! the response on the way back out, or let faults propagate unchanged.

pub mod composer;
pub mod dispatcher;

pub use composer::{Next, Pipeline, PipelineBehavior, RequestHandler};
#[cfg(test)]
pub(crate) use composer::compose;
pub use dispatcher::{DispatchRecord, Mediator, MediatorBuilder, MediatorStats};
