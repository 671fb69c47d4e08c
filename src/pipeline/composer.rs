//! # Pipeline Composition
//!
//! Builds the invocation chain for a request type from its registered
//! behaviors plus its terminal handler, and caches the composed chain so
//! every subsequent dispatch of that type reuses it.
//!
//! Composition is idempotent and side-effect-free: two concurrent first-time
//! compositions of the same request type produce equivalent chains and
//! either result may win the cache insert.

use std::any::{Any, TypeId};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::cancellation::CancellationToken;
use crate::error::{PipelineError, Result};
use crate::registry::{BehaviorRegistry, HandlerRegistry};
use crate::request::Request;

/// Terminal handler bound to exactly one (request, response) type pair.
///
/// Stateless across invocations except for injected collaborators. By the
/// time the handler runs, every mutation point of the request has been
/// finalized, so it receives the request by shared reference.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(&self, request: &R, token: &CancellationToken) -> Result<R::Response>;

    /// Handler name for diagnostics.
    fn handler_name(&self) -> &str {
        "unnamed_handler"
    }
}

/// Cross-cutting wrapper around the next link of a request's chain.
///
/// The behavior may (a) inspect or rewrite mutable parts of the request
/// before calling `next`, (b) not call `next` at all (short-circuit),
/// (c) transform the response `next` returned, or (d) let a fault from
/// `next` propagate unchanged. Re-classifying a fault is allowed only where
/// a behavior's documented contract says so.
#[async_trait]
pub trait PipelineBehavior<R: Request>: Send + Sync {
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response>;

    /// Behavior name for diagnostics.
    fn behavior_name(&self) -> &str {
        "unnamed_behavior"
    }
}

/// Continuation handed to a behavior: the remaining behaviors plus the
/// terminal handler. Consumed by [`Next::run`]; a behavior that drops it
/// short-circuits the rest of the chain.
pub struct Next<'a, R: Request> {
    behaviors: &'a [Arc<dyn PipelineBehavior<R>>],
    handler: &'a dyn RequestHandler<R>,
}

impl<'a, R: Request> Next<'a, R> {
    /// Invoke the rest of the chain.
    ///
    /// Observes the cancellation token before each link, so a cancelled
    /// dispatch unwinds as [`PipelineError::Cancelled`] without reaching the
    /// handler.
    pub async fn run(self, request: &mut R, token: &CancellationToken) -> Result<R::Response> {
        token.check()?;

        match self.behaviors.split_first() {
            Some((current, rest)) => {
                current
                    .handle(
                        request,
                        Next {
                            behaviors: rest,
                            handler: self.handler,
                        },
                        token,
                    )
                    .await
            }
            None => self.handler.handle(request, token).await,
        }
    }

    /// Links remaining after this point, the terminal handler included.
    pub fn remaining(&self) -> usize {
        self.behaviors.len() + 1
    }
}

/// The composed, ordered chain for one request type: behaviors in
/// registration order terminating in the handler. Immutable once built;
/// safe to execute concurrently.
pub struct Pipeline<R: Request> {
    behaviors: Vec<Arc<dyn PipelineBehavior<R>>>,
    handler: Arc<dyn RequestHandler<R>>,
}

impl<R: Request> Pipeline<R> {
    fn new(behaviors: Vec<Arc<dyn PipelineBehavior<R>>>, handler: Arc<dyn RequestHandler<R>>) -> Self {
        Self { behaviors, handler }
    }

    /// Run one request instance through the chain.
    pub async fn execute(&self, request: &mut R, token: &CancellationToken) -> Result<R::Response> {
        Next {
            behaviors: &self.behaviors,
            handler: self.handler.as_ref(),
        }
        .run(request, token)
        .await
    }

    pub fn behavior_count(&self) -> usize {
        self.behaviors.len()
    }

    pub fn handler_name(&self) -> &str {
        self.handler.handler_name()
    }
}

/// Build the chain for `R` from the frozen registries.
///
/// Fails fast with [`PipelineError::HandlerNotFound`] when no terminal
/// handler is registered; an empty behavior list degenerates to calling the
/// handler directly.
pub(crate) fn compose<R: Request>(
    handlers: &HandlerRegistry,
    behaviors: &BehaviorRegistry,
) -> Result<Pipeline<R>> {
    let handler = handlers
        .resolve::<R>()
        .ok_or(PipelineError::HandlerNotFound {
            request_type: std::any::type_name::<R>(),
        })?;

    let chain = behaviors.resolve::<R>();
    debug!(
        request_type = std::any::type_name::<R>(),
        behaviors = chain.len(),
        handler = handler.handler_name(),
        "composed pipeline"
    );

    Ok(Pipeline::new(chain, handler))
}

/// Per-request-type cache of composed pipelines.
///
/// The only structure mutated after startup under concurrent access;
/// insert-if-absent through `DashMap` so a dispatch never pays the
/// registry walk twice for the same type.
#[derive(Default)]
pub(crate) struct PipelineCache {
    pipelines: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached pipeline for `R`, composing and caching it on first use.
    pub fn resolve<R: Request>(
        &self,
        handlers: &HandlerRegistry,
        behaviors: &BehaviorRegistry,
    ) -> Result<Arc<Pipeline<R>>> {
        let key = TypeId::of::<R>();

        if let Some(cached) = self.pipelines.get(&key) {
            if let Ok(pipeline) = Arc::clone(cached.value()).downcast::<Pipeline<R>>() {
                return Ok(pipeline);
            }
        }

        // Built outside the map entry: a duplicate concurrent build is
        // idempotent and whichever insert wins serves future dispatches.
        let built: Arc<dyn Any + Send + Sync> = Arc::new(compose::<R>(handlers, behaviors)?);
        let stored = Arc::clone(self.pipelines.entry(key).or_insert(built).value());

        stored
            .downcast::<Pipeline<R>>()
            .map_err(|_| PipelineError::Configuration {
                reason: format!(
                    "pipeline cache entry for '{}' holds a mismatched type",
                    std::any::type_name::<R>()
                ),
            })
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }
}
