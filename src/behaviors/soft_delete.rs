//! # Soft-Delete Filter Behavior
//!
//! Queries against soft-deletable models must exclude flagged records by
//! default: the behavior AND-combines `is_deleted = false` into the filter
//! tree. A caller that explicitly constrains `is_deleted` anywhere in its
//! filter (to see deleted records, say) wins; the tree is left unchanged.
//! The containment check is the stack-based walk in [`crate::filter`].

use async_trait::async_trait;
use tracing::debug;

use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::filter::{add_predicate_if_absent, FilterNode};
use crate::pipeline::{Next, PipelineBehavior};
use crate::request::{HasFilter, Request};

/// Field name soft-delete predicates are written under.
pub const DELETED_FIELD: &str = "is_deleted";

/// Excludes soft-deleted records from query results by default.
///
/// Register for query request types whose response model supports soft
/// delete.
pub struct SoftDeleteFilterBehavior;

#[async_trait]
impl<R> PipelineBehavior<R> for SoftDeleteFilterBehavior
where
    R: Request + HasFilter,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let added = add_predicate_if_absent(
            request.filter_mut(),
            FilterNode::eq(DELETED_FIELD, false),
        );
        if added {
            debug!("added soft-delete predicate to query filter");
        }

        next.run(request, token).await
    }

    fn behavior_name(&self) -> &str {
        "soft_delete_filter"
    }
}
