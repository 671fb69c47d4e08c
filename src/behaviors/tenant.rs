//! # Tenancy Behaviors
//!
//! Three behaviors enforcing the tenant isolation boundary:
//!
//! - [`TenantDefaultBehavior`] fills an unset model tenant from the
//!   principal, never overriding an explicit one.
//! - [`TenantAuthenticateBehavior`] rejects a model whose tenant differs
//!   from the principal's, before the handler runs.
//! - [`TenantFilterBehavior`] AND-combines a tenant predicate into a query's
//!   filter tree. A tenant-aware query must never execute without a tenant
//!   predicate: an unresolvable (nil) tenant is a fault, not an unfiltered
//!   query.

use async_trait::async_trait;
use tracing::debug;

use crate::cancellation::CancellationToken;
use crate::error::{PipelineError, Result};
use crate::filter::{add_predicate_if_absent, FilterNode};
use crate::pipeline::{Next, PipelineBehavior};
use crate::request::{HasFilter, HasModel, HasTenant, Request};

/// Field name tenant predicates are written under.
pub const TENANT_FIELD: &str = "tenant_id";

/// Assigns the principal's tenant to a model whose tenant field is unset.
pub struct TenantDefaultBehavior;

#[async_trait]
impl<R> PipelineBehavior<R> for TenantDefaultBehavior
where
    R: Request + HasModel,
    R::Model: HasTenant,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let resolved = request.activation().resolved_tenant();

        let model = request.model_mut();
        if model.tenant_id().is_nil() && !resolved.is_nil() {
            model.set_tenant_id(resolved);
            debug!(tenant_id = %resolved, "defaulted model tenant from principal");
        }

        next.run(request, token).await
    }

    fn behavior_name(&self) -> &str {
        "tenant_default"
    }
}

/// Fails with [`PipelineError::Forbidden`] when the model carries a tenant
/// that differs from the principal's resolved tenant. The handler never runs.
pub struct TenantAuthenticateBehavior;

#[async_trait]
impl<R> PipelineBehavior<R> for TenantAuthenticateBehavior
where
    R: Request + HasModel,
    R::Model: HasTenant,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let model_tenant = request.model().tenant_id();

        if !model_tenant.is_nil() {
            let resolved = request.activation().resolved_tenant();
            if model_tenant != resolved {
                return Err(PipelineError::forbidden(
                    "model tenant does not match the caller's tenant",
                ));
            }
        }

        next.run(request, token).await
    }

    fn behavior_name(&self) -> &str {
        "tenant_authenticate"
    }
}

/// AND-combines `tenant_id = <resolved>` into the query's filter tree.
///
/// Leaves the tree untouched when it already constrains the tenant field,
/// preserving the exactly-one-tenant-predicate invariant.
pub struct TenantFilterBehavior;

#[async_trait]
impl<R> PipelineBehavior<R> for TenantFilterBehavior
where
    R: Request + HasFilter,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let resolved = request.activation().resolved_tenant();
        if resolved.is_nil() {
            // Security-critical: never let a tenant-scoped query run unfiltered.
            return Err(PipelineError::forbidden(
                "tenant could not be resolved for a tenant-scoped query",
            ));
        }

        let added = add_predicate_if_absent(
            request.filter_mut(),
            FilterNode::eq(TENANT_FIELD, resolved.to_string()),
        );
        if added {
            debug!(tenant_id = %resolved, "added tenant predicate to query filter");
        }

        next.run(request, token).await
    }

    fn behavior_name(&self) -> &str {
        "tenant_filter"
    }
}
