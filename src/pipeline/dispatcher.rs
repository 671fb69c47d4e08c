//! # Mediator
//!
//! The dispatch entry point: `send` resolves the composed pipeline for a
//! request's type and invokes it; `publish` fans a notification out to its
//! subscribers.
//!
//! ## Overview
//!
//! A [`MediatorBuilder`] collects handler, behavior, and subscriber
//! registrations at startup, then [`MediatorBuilder::build`] freezes them
//! into an immutable [`Mediator`]. After that point the handler and behavior
//! registries are read concurrently without locking; the per-type pipeline
//! cache is the only structure still mutated, under an insert-if-absent
//! discipline.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mediate_core::pipeline::Mediator;
//! # use mediate_core::error::Result;
//! # async fn example(mediator: Mediator) -> Result<()> {
//! # struct CreateWidget;
//! # impl mediate_core::request::Request for CreateWidget {
//! #     type Response = ();
//! #     fn activation(&self) -> &mediate_core::request::Activation { unimplemented!() }
//! # }
//! let response = mediator.send(CreateWidget).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::config::MediatorConfig;
use crate::error::Result;
use crate::pipeline::composer::PipelineCache;
use crate::pipeline::{PipelineBehavior, RequestHandler};
use crate::registry::{
    BehaviorRegistry, HandlerRegistry, Notification, NotificationSubscriber, SubscriberRegistry,
};
use crate::request::Request;

/// Builder collecting registrations before the mediator is frozen.
pub struct MediatorBuilder {
    config: MediatorConfig,
    handlers: HandlerRegistry,
    behaviors: BehaviorRegistry,
    subscribers: Arc<SubscriberRegistry>,
}

impl MediatorBuilder {
    pub fn new() -> Self {
        Self::with_config(MediatorConfig::default())
    }

    pub fn with_config(config: MediatorConfig) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::new(),
            behaviors: BehaviorRegistry::new(),
            subscribers: Arc::new(SubscriberRegistry::new()),
        }
    }

    /// Register the terminal handler for request type `R`.
    /// First registration wins; a duplicate is ignored with a warning.
    pub fn register_handler<R: Request>(mut self, handler: Arc<dyn RequestHandler<R>>) -> Self {
        self.handlers.try_add::<R>(handler);
        self
    }

    /// Append a behavior to the chain for request type `R`.
    /// Registration order defines execution order.
    pub fn register_behavior<R: Request>(mut self, behavior: Arc<dyn PipelineBehavior<R>>) -> Self {
        self.behaviors.push::<R>(behavior);
        self
    }

    /// Register a subscriber for notification type `N`.
    pub fn register_subscriber<N: Notification>(
        self,
        subscriber: Arc<dyn NotificationSubscriber<N>>,
    ) -> Self {
        self.subscribers.register::<N>(subscriber);
        self
    }

    /// Handle to the subscriber registry, for constructing behaviors that
    /// publish (the entity-change notification behavior).
    pub fn subscribers(&self) -> Arc<SubscriberRegistry> {
        Arc::clone(&self.subscribers)
    }

    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    /// Freeze the registries into a dispatchable mediator.
    pub fn build(self) -> Mediator {
        debug!(
            handlers = self.handlers.len(),
            "mediator built; registries frozen"
        );

        Mediator {
            config: self.config,
            handlers: self.handlers,
            behaviors: self.behaviors,
            subscribers: self.subscribers,
            pipelines: PipelineCache::new(),
            history: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MediatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The dispatcher. Cheap to share behind an `Arc`; `send` and `publish` are
/// safe for arbitrary concurrent use.
pub struct Mediator {
    config: MediatorConfig,
    handlers: HandlerRegistry,
    behaviors: BehaviorRegistry,
    subscribers: Arc<SubscriberRegistry>,
    pipelines: PipelineCache,
    history: RwLock<Vec<DispatchRecord>>,
}

impl Mediator {
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::new()
    }

    /// Dispatch a request with a fresh, never-cancelled token.
    pub async fn send<R: Request>(&self, request: R) -> Result<R::Response> {
        self.send_with_token(request, &CancellationToken::new())
            .await
    }

    /// Dispatch a request, threading `token` through every link of the
    /// chain. Behaviors execute in registration order going in and reverse
    /// order coming out; this ordering is per-instance, and concurrent
    /// dispatches interleave freely.
    pub async fn send_with_token<R: Request>(
        &self,
        mut request: R,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let request_type = std::any::type_name::<R>();
        let started = std::time::Instant::now();
        debug!(request_type, "dispatching request");

        let result = match self.pipelines.resolve::<R>(&self.handlers, &self.behaviors) {
            Ok(pipeline) => pipeline.execute(&mut request, token).await,
            Err(e) => Err(e),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(request_type, duration_ms, "dispatch completed"),
            Err(e) => warn!(request_type, duration_ms, error = %e, "dispatch failed"),
        }

        self.record_dispatch(request_type, result.is_ok(), duration_ms);
        result
    }

    /// Publish a notification to its subscribers with a fresh token.
    pub async fn publish<N: Notification>(&self, notification: &N) -> Result<()> {
        self.publish_with_token(notification, &CancellationToken::new())
            .await
    }

    /// Publish a notification, sequentially, in registration order, within
    /// the calling context. Every subscriber runs; the first failure is
    /// returned after the fan-out completes.
    pub async fn publish_with_token<N: Notification>(
        &self,
        notification: &N,
        token: &CancellationToken,
    ) -> Result<()> {
        self.subscribers.publish(notification, token).await
    }

    pub fn has_handler<R: Request>(&self) -> bool {
        self.handlers.contains::<R>()
    }

    pub fn registered_request_types(&self) -> Vec<&'static str> {
        self.handlers.registered_request_types()
    }

    pub fn subscriber_count<N: Notification>(&self) -> usize {
        self.subscribers.subscriber_count::<N>()
    }

    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    /// Dispatch records, oldest first. Empty when history is disabled.
    pub fn history(&self) -> Vec<DispatchRecord> {
        self.history.read().clone()
    }

    pub fn clear_history(&self) {
        self.history.write().clear();
    }

    pub fn stats(&self) -> MediatorStats {
        let history = self.history.read();
        let successful = history.iter().filter(|r| r.success).count();

        MediatorStats {
            registered_handlers: self.handlers.len(),
            composed_pipelines: self.pipelines.len(),
            total_dispatched: history.len(),
            successful_dispatches: successful,
            failed_dispatches: history.len() - successful,
            history_enabled: self.config.enable_history,
        }
    }

    fn record_dispatch(&self, request_type: &'static str, success: bool, duration_ms: u64) {
        if !self.config.enable_history {
            return;
        }

        let mut history = self.history.write();
        history.push(DispatchRecord {
            request_type,
            success,
            duration_ms,
            dispatched_at: Utc::now(),
        });

        if history.len() > self.config.max_history_size {
            let excess = history.len() - self.config.max_history_size;
            history.drain(0..excess);
        }
    }
}

/// One dispatched request, as recorded in the bounded history.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub request_type: &'static str,
    pub success: bool,
    pub duration_ms: u64,
    pub dispatched_at: DateTime<Utc>,
}

/// Mediator statistics snapshot.
#[derive(Debug, Clone)]
pub struct MediatorStats {
    pub registered_handlers: usize,
    pub composed_pipelines: usize,
    pub total_dispatched: usize,
    pub successful_dispatches: usize,
    pub failed_dispatches: usize,
    pub history_enabled: bool,
}
