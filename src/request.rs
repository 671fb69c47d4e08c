//! # Request Contracts
//!
//! The type-level association between a request and its response, the
//! construction-time activation stamp, and the capability traits behaviors
//! key off.
//!
//! ## Overview
//!
//! Every concrete request type is a distinct static type and maps to exactly
//! one response type via [`Request::Response`]. A request is constructed with
//! an [`Activation`]: a nullable principal plus an activation timestamp and
//! identity string stamped exactly once, at construction. The activation is
//! never re-derived later in the pipeline; the change-tracking behavior
//! stamps domain-model audit fields *independently* of it.
//!
//! ## Capability traits
//!
//! Behaviors never reflect over requests at dispatch time. Applicability is a
//! compile-time trait bound checked when the behavior is registered for a
//! request type:
//!
//! - [`HasModel`]: the request carries a mutable model payload
//! - [`HasTenant`]: the model has a tenant field (zero value = unset)
//! - [`TrackCreated`] / [`TrackUpdated`]: the model carries audit stamps
//! - [`HasFilter`]: the request carries a rewritable filter tree
//! - [`Cacheable`] / [`CacheExpire`]: the request opts into caching
//! - [`Mutation`]: the request declares its change classification

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::filter::FilterNode;

/// Identity attached to activations when no principal (or no name) is present.
pub const SYSTEM_IDENTITY: &str = "system";

/// Opaque caller identity. The core only ever asks it for a display name and
/// a resolved tenant id; its internal structure (claims, roles) is invisible.
pub trait Principal: Send + Sync {
    /// Human-readable identity, if the principal carries one.
    fn display_name(&self) -> Option<&str>;

    /// Tenant the principal belongs to. `Uuid::nil()` when unresolvable.
    fn tenant_id(&self) -> Uuid {
        Uuid::nil()
    }
}

/// Construction-time security and audit context of a request.
///
/// The timestamp and identity are stamped once in [`Activation::new`] and are
/// immutable afterwards.
#[derive(Clone)]
pub struct Activation {
    principal: Option<Arc<dyn Principal>>,
    activated: DateTime<Utc>,
    activated_by: String,
}

impl Activation {
    /// Stamp a new activation from an optional principal.
    ///
    /// `activated_by` resolves to the principal's display name, falling back
    /// to [`SYSTEM_IDENTITY`] when the principal is absent or nameless.
    pub fn new(principal: Option<Arc<dyn Principal>>) -> Self {
        let activated_by = principal
            .as_deref()
            .and_then(Principal::display_name)
            .unwrap_or(SYSTEM_IDENTITY)
            .to_string();

        Self {
            principal,
            activated: Utc::now(),
            activated_by,
        }
    }

    /// Activation with no principal; `activated_by` is [`SYSTEM_IDENTITY`].
    pub fn system() -> Self {
        Self::new(None)
    }

    pub fn principal(&self) -> Option<&Arc<dyn Principal>> {
        self.principal.as_ref()
    }

    pub fn activated(&self) -> DateTime<Utc> {
        self.activated
    }

    pub fn activated_by(&self) -> &str {
        &self.activated_by
    }

    /// Tenant resolved from the principal; `Uuid::nil()` when there is no
    /// principal or the principal cannot resolve one.
    pub fn resolved_tenant(&self) -> Uuid {
        self.principal
            .as_deref()
            .map_or_else(Uuid::nil, Principal::tenant_id)
    }
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activation")
            .field("activated", &self.activated)
            .field("activated_by", &self.activated_by)
            .field("has_principal", &self.principal.is_some())
            .finish()
    }
}

/// A value describing one intended operation and its expected response type.
///
/// The request-to-response mapping is fixed at definition time: one request
/// type always yields exactly one response type.
pub trait Request: Send + Sync + 'static {
    type Response: Send + 'static;

    /// The construction-time activation stamp.
    fn activation(&self) -> &Activation;
}

/// A request carrying a mutable domain-model payload.
///
/// The model is one of the two documented mutation points in the pipeline
/// (the other is the filter tree): tenant-default and change-tracking
/// behaviors rewrite it before the terminal handler runs.
pub trait HasModel {
    type Model;

    fn model(&self) -> &Self::Model;
    fn model_mut(&mut self) -> &mut Self::Model;
}

/// A model with a tenant field. `Uuid::nil()` means "unset".
pub trait HasTenant {
    fn tenant_id(&self) -> Uuid;
    fn set_tenant_id(&mut self, tenant_id: Uuid);
}

/// A model tracking its creation stamp.
pub trait TrackCreated {
    fn created(&self) -> Option<DateTime<Utc>>;
    fn stamp_created(&mut self, at: DateTime<Utc>, by: &str);
}

/// A model tracking its last-update stamp.
pub trait TrackUpdated {
    fn stamp_updated(&mut self, at: DateTime<Utc>, by: &str);
}

/// A query request carrying a rewritable filter tree.
///
/// `None` means "no caller-supplied filter"; tenant and soft-delete behaviors
/// AND-combine their predicates into this slot.
pub trait HasFilter {
    fn filter(&self) -> Option<&FilterNode>;
    fn filter_mut(&mut self) -> &mut Option<FilterNode>;
}

/// Opt-in contract for the caching behaviors.
pub trait Cacheable {
    /// Key the response is stored under. Must be stable for equivalent
    /// requests and distinct across requests that may differ in result.
    fn cache_key(&self) -> String;

    /// Sliding expiration window, refreshed on every hit.
    fn sliding_expiration(&self) -> Option<std::time::Duration> {
        None
    }

    /// Absolute expiration window, measured from insertion.
    fn absolute_expiration(&self) -> Option<std::time::Duration> {
        None
    }

    /// Tag grouping this entry with others for bulk invalidation,
    /// conventionally derived from the target entity type.
    fn cache_tag(&self) -> Option<String> {
        None
    }
}

/// Opt-in contract for the cache-expire behavior: after the wrapped
/// operation completes without fault, all entries under this tag are
/// invalidated, whether or not anything actually changed.
pub trait CacheExpire {
    fn cache_tag(&self) -> String;
}

/// Classification of a completed mutation, carried by entity-change
/// notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A command request declaring, at the type level, which change it performs.
/// Used by the entity-change notification behavior to classify the operation
/// without inspecting the request at runtime.
pub trait Mutation {
    const KIND: ChangeKind;
}
