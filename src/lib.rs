#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Mediate Core
//!
//! Typed CQRS mediator: requests flow through an ordered, per-type chain of
//! cross-cutting behaviors into exactly one terminal handler, and change
//! notifications fan out to independent subscribers.
//!
//! ## Overview
//!
//! Mediate Core is the in-process composition layer of a CRUD backend. The
//! data access, HTTP surface, and delivery adapters live elsewhere and
//! consume the dispatcher purely via `send`/`publish`; this crate owns the
//! mechanism between them: the request/response contracts, the handler and
//! behavior registries, the pipeline composer with its per-type cache, the
//! dispatcher, and the notification fan-out.
//!
//! ## Architecture
//!
//! ```text
//! Mediator::send(request)
//! ├── HandlerRegistry     (one terminal handler per request type)
//! ├── BehaviorRegistry    (ordered behavior chain per request type)
//! ├── PipelineCache       (chain composed once, reused concurrently)
//! └── SubscriberRegistry  (notification fan-out, no short-circuit)
//! ```
//!
//! Behaviors execute in registration order on the way in and exact-reverse
//! order on the way out. Each may rewrite the request's documented mutation
//! points (model payload, filter tree), short-circuit the chain, transform
//! the response, or let faults propagate unchanged. A single cancellation
//! token threads through every link.
//!
//! ## Key Features
//!
//! - **Typed contracts**: one response type per request type, fixed at
//!   definition time; behavior applicability is a compile-time trait bound,
//!   never a runtime type walk
//! - **Composed once**: pipelines are built per request type and cached
//!   under an insert-if-absent discipline safe for concurrent first use
//! - **Worked behavior set**: tenancy (default/authenticate/filter), soft
//!   delete, change tracking, validation, memory and distributed caching,
//!   tag invalidation, entity-change notification
//! - **Explicit fault taxonomy**: validation, forbidden, domain, cancelled,
//!   and infrastructure faults with status hints for the boundary layer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mediate_core::pipeline::Mediator;
//! use mediate_core::request::{Activation, Request};
//! use mediate_core::error::Result;
//! # use mediate_core::pipeline::RequestHandler;
//! # use mediate_core::cancellation::CancellationToken;
//! # use std::sync::Arc;
//!
//! struct Ping { activation: Activation }
//!
//! impl Request for Ping {
//!     type Response = String;
//!     fn activation(&self) -> &Activation { &self.activation }
//! }
//!
//! struct PingHandler;
//!
//! #[async_trait::async_trait]
//! impl RequestHandler<Ping> for PingHandler {
//!     async fn handle(&self, _request: &Ping, _token: &CancellationToken) -> Result<String> {
//!         Ok("pong".to_string())
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let mediator = Mediator::builder()
//!     .register_handler::<Ping>(Arc::new(PingHandler))
//!     .build();
//!
//! let response = mediator.send(Ping { activation: Activation::system() }).await?;
//! assert_eq!(response, "pong");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`request`] - Request/response contracts, activation, capability traits
//! - [`pipeline`] - Composer, dispatcher, behavior and handler traits
//! - [`registry`] - Handler, behavior, and subscriber registries
//! - [`behaviors`] - The worked cross-cutting behavior set
//! - [`filter`] - Filter expression trees and rewriting
//! - [`cancellation`] - Cooperative cancellation tokens
//! - [`error`] - Structured fault taxonomy
//! - [`config`] - Mediator configuration
//! - [`logging`] - Tracing initialization

pub mod behaviors;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod request;

pub use cancellation::CancellationToken;
pub use config::MediatorConfig;
pub use error::{FieldError, PipelineError, Result};
pub use filter::{CompareOp, FilterNode, LogicOp};
pub use pipeline::{Mediator, MediatorBuilder, Next, PipelineBehavior, RequestHandler};
pub use registry::{Notification, NotificationSubscriber};
pub use request::{Activation, ChangeKind, Principal, Request};
