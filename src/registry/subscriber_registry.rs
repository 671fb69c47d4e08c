//! # Subscriber Registry
//!
//! Notification fan-out: zero-or-more subscribers per notification type,
//! invoked sequentially in registration order within the publishing context.
//! No implicit parallelism, no implicit retry, no short-circuit.
//!
//! ## Failure policy
//!
//! A failing subscriber never suppresses the subscribers after it. Every
//! subscriber runs; each failure is logged; [`SubscriberRegistry::publish`]
//! returns the *first* failure after the fan-out completes. Callers that
//! must not let notification faults mask an already-committed result (the
//! entity-change behavior) decide at their own layer whether to swallow the
//! returned error.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::cancellation::CancellationToken;
use crate::error::Result;

/// Marker for one-way, multi-subscriber broadcast values. A notification has
/// no response and is distinct from a request.
pub trait Notification: Send + Sync + 'static {}

/// Trait for notification subscribers.
#[async_trait]
pub trait NotificationSubscriber<N: Notification>: Send + Sync {
    /// Handle a published notification.
    async fn handle(&self, notification: &N, token: &CancellationToken) -> Result<()>;

    /// Subscriber name for identification in logs.
    fn subscriber_name(&self) -> &str {
        "unnamed_subscriber"
    }
}

struct SubscriberList {
    notification_type: &'static str,
    // Each box holds an Arc<dyn NotificationSubscriber<N>> for the entry's N.
    subscribers: Vec<Box<dyn Any + Send + Sync>>,
}

/// Registry for managing notification subscribers.
///
/// Shared behind an `Arc` between the mediator and the behaviors that
/// publish (entity-change). The map is read-mostly after startup; a
/// `parking_lot` read lock is taken only long enough to clone the subscriber
/// handles, never held across an await.
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: RwLock<HashMap<TypeId, SubscriberList>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for notification type `N`. Subscribers are
    /// invoked in registration order.
    pub fn register<N: Notification>(&self, subscriber: Arc<dyn NotificationSubscriber<N>>) {
        let notification_type = std::any::type_name::<N>();
        let subscriber_name = subscriber.subscriber_name().to_string();

        let mut entries = self.entries.write();
        let list = entries
            .entry(TypeId::of::<N>())
            .or_insert_with(|| SubscriberList {
                notification_type,
                subscribers: Vec::new(),
            });
        list.subscribers.push(Box::new(subscriber));

        info!(
            notification_type,
            subscriber = %subscriber_name,
            position = list.subscribers.len(),
            "registered notification subscriber"
        );
    }

    pub fn subscriber_count<N: Notification>(&self) -> usize {
        self.entries
            .read()
            .get(&TypeId::of::<N>())
            .map_or(0, |list| list.subscribers.len())
    }

    /// Type names of notification types with at least one subscriber.
    pub fn registered_notification_types(&self) -> Vec<&'static str> {
        self.entries
            .read()
            .values()
            .map(|list| list.notification_type)
            .collect()
    }

    /// Publish `notification` to every subscriber registered for `N`,
    /// sequentially, in registration order.
    ///
    /// Zero subscribers is not an error. See the module docs for the
    /// failure policy.
    pub async fn publish<N: Notification>(
        &self,
        notification: &N,
        token: &CancellationToken,
    ) -> Result<()> {
        let notification_type = std::any::type_name::<N>();

        let subscribers: Vec<Arc<dyn NotificationSubscriber<N>>> = {
            let entries = self.entries.read();
            entries.get(&TypeId::of::<N>()).map_or_else(Vec::new, |list| {
                list.subscribers
                    .iter()
                    .filter_map(|boxed| {
                        boxed
                            .downcast_ref::<Arc<dyn NotificationSubscriber<N>>>()
                            .cloned()
                    })
                    .collect()
            })
        };

        if subscribers.is_empty() {
            debug!(notification_type, "no subscribers for notification type");
            return Ok(());
        }

        let mut first_failure = None;
        for subscriber in subscribers {
            token.check()?;

            if let Err(e) = subscriber.handle(notification, token).await {
                error!(
                    notification_type,
                    subscriber = subscriber.subscriber_name(),
                    error = %e,
                    "notification subscriber failed"
                );
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }

        first_failure.map_or(Ok(()), Err)
    }
}
