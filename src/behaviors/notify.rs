//! # Entity-Change Notification Behavior
//!
//! After the wrapped chain returns a present response, classify the
//! operation (created / updated / deleted, declared by the request type)
//! and broadcast an [`EntityChanged`] notification to every subscriber.
//!
//! ## Failure policy
//!
//! The notification goes out *after* the response is finalized, which makes
//! a subscriber fault genuinely ambiguous: the mutation already committed.
//! The default policy here is [`NotifyFaultPolicy::Isolate`]: log the
//! fault and let the successful response stand, so observability problems
//! never masquerade as failed writes. [`NotifyFaultPolicy::Propagate`]
//! restores the alternative contract, where the dispatch caller sees the
//! subscriber fault even though the write committed; pick it when a lost
//! notification is worse than a confusing error.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::cancellation::CancellationToken;
use crate::config::MediatorConfig;
use crate::error::Result;
use crate::pipeline::{Next, PipelineBehavior};
use crate::registry::{Notification, SubscriberRegistry};
use crate::request::{ChangeKind, Mutation, Request};

/// Broadcast after a mutation's response is finalized.
#[derive(Debug, Clone)]
pub struct EntityChanged<M> {
    pub entity: M,
    pub kind: ChangeKind,
    pub occurred_at: DateTime<Utc>,
}

impl<M: Send + Sync + 'static> Notification for EntityChanged<M> {}

/// What to do when a subscriber faults during the post-response broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyFaultPolicy {
    /// Log the fault; the successful response stands. Default.
    Isolate,
    /// Surface the fault to the dispatch caller, failing an operation whose
    /// mutation already committed.
    Propagate,
}

/// Publishes [`EntityChanged`] for mutation requests whose response is
/// present. Register for create/update/delete request types implementing
/// [`Mutation`].
pub struct EntityChangedBehavior {
    subscribers: Arc<SubscriberRegistry>,
    policy: NotifyFaultPolicy,
}

impl EntityChangedBehavior {
    pub fn new(subscribers: Arc<SubscriberRegistry>) -> Self {
        Self {
            subscribers,
            policy: NotifyFaultPolicy::Isolate,
        }
    }

    pub fn with_policy(mut self, policy: NotifyFaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn from_config(config: &MediatorConfig, subscribers: Arc<SubscriberRegistry>) -> Self {
        let policy = if config.propagate_notify_errors {
            NotifyFaultPolicy::Propagate
        } else {
            NotifyFaultPolicy::Isolate
        };
        Self::new(subscribers).with_policy(policy)
    }
}

#[async_trait]
impl<R, M> PipelineBehavior<R> for EntityChangedBehavior
where
    R: Request<Response = Option<M>> + Mutation,
    M: Clone + Send + Sync + 'static,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let response = next.run(request, token).await?;

        if let Some(entity) = &response {
            let notification = EntityChanged {
                entity: entity.clone(),
                kind: R::KIND,
                occurred_at: Utc::now(),
            };

            match self.subscribers.publish(&notification, token).await {
                Ok(()) => {
                    debug!(kind = ?R::KIND, "published entity-change notification");
                }
                Err(e) if self.policy == NotifyFaultPolicy::Isolate => {
                    error!(
                        kind = ?R::KIND,
                        error = %e,
                        "entity-change subscriber failed; response preserved"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(response)
    }

    fn behavior_name(&self) -> &str {
        "entity_changed"
    }
}
