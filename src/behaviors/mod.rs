//! # Cross-Cutting Behaviors
//!
//! The worked behavior set: tenancy, soft delete, change tracking,
//! validation, caching, and entity-change notification. Each is an ordinary
//! [`PipelineBehavior`](crate::pipeline::PipelineBehavior) implementation;
//! applicability is a compile-time trait bound on the request (or its
//! model), checked when the behavior is registered for a request type,
//! never a runtime type walk at dispatch time.
//!
//! Registration order matters. A typical command chain:
//!
//! ```text
//! TenantDefault → TenantAuthenticate → Validation → TrackCreated/Updated
//!     → CacheExpire → EntityChanged → handler
//! ```
//!
//! and a typical tenant-scoped query chain:
//!
//! ```text
//! TenantFilter → SoftDeleteFilter → MemoryCache → handler
//! ```

pub mod cache;
pub mod notify;
pub mod soft_delete;
pub mod tenant;
pub mod track_change;
pub mod validation;

pub use cache::{
    BytesCache, CacheExpireBehavior, CachePolicy, CacheStore, DistributedCacheBehavior,
    InMemoryBytesCache, MemoryCache, MemoryCacheBehavior,
};
pub use notify::{EntityChanged, EntityChangedBehavior, NotifyFaultPolicy};
pub use soft_delete::{SoftDeleteFilterBehavior, DELETED_FIELD};
pub use tenant::{
    TenantAuthenticateBehavior, TenantDefaultBehavior, TenantFilterBehavior, TENANT_FIELD,
};
pub use track_change::{TrackCreatedBehavior, TrackUpdatedBehavior};
pub use validation::{ModelValidationBehavior, ValidationBehavior, ValidationOutcome, Validator};
