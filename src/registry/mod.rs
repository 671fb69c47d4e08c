//! # Registry Infrastructure
//!
//! Registries mapping request and notification types to the components that
//! serve them.
//!
//! ## Available Registries
//!
//! - **HandlerRegistry**: exactly one terminal handler per request type
//!   (first-registration-wins)
//! - **BehaviorRegistry**: ordered cross-cutting behavior lists per request
//!   type (registration order is execution order)
//! - **SubscriberRegistry**: zero-or-more notification subscribers per
//!   notification type (sequential fan-out, no short-circuit)
//!
//! Handler and behavior registries are populated through
//! [`MediatorBuilder`](crate::pipeline::MediatorBuilder) and frozen at build
//! time; after startup they are read concurrently without locking. The
//! subscriber registry is shared (the entity-change behavior publishes
//! through it) and guards its map with a read-mostly lock.
//!
//! All three registries are keyed by `TypeId` and store type-erased entries;
//! the generic registration and resolution methods are the only places the
//! erasure is crossed, so applicability never requires a runtime
//! "is-assignable" walk at dispatch time.

pub mod behavior_registry;
pub mod handler_registry;
pub mod subscriber_registry;

pub use behavior_registry::BehaviorRegistry;
pub use handler_registry::HandlerRegistry;
pub use subscriber_registry::{Notification, NotificationSubscriber, SubscriberRegistry};
