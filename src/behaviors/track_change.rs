//! # Change-Tracking Behaviors
//!
//! Audit stamping for create/update-shaped commands. The stamps written here
//! are domain-model fields (Created/CreatedBy, Updated/UpdatedBy) and are
//! independent of the request's own activation stamp, which was fixed at
//! construction and is never re-derived.
//!
//! - [`TrackCreatedBehavior`] stamps Created/CreatedBy only when unset, so
//!   replays and retries keep the original creation stamp.
//! - [`TrackUpdatedBehavior`] stamps Updated/UpdatedBy unconditionally on
//!   every pass.

use async_trait::async_trait;
use chrono::Utc;

use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::pipeline::{Next, PipelineBehavior};
use crate::request::{HasModel, Request, TrackCreated, TrackUpdated};

/// Stamps Created/CreatedBy on models that have not been stamped yet.
pub struct TrackCreatedBehavior;

#[async_trait]
impl<R> PipelineBehavior<R> for TrackCreatedBehavior
where
    R: Request + HasModel,
    R::Model: TrackCreated,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let by = request.activation().activated_by().to_string();

        let model = request.model_mut();
        if model.created().is_none() {
            model.stamp_created(Utc::now(), &by);
        }

        next.run(request, token).await
    }

    fn behavior_name(&self) -> &str {
        "track_created"
    }
}

/// Stamps Updated/UpdatedBy on every pass through the pipeline.
pub struct TrackUpdatedBehavior;

#[async_trait]
impl<R> PipelineBehavior<R> for TrackUpdatedBehavior
where
    R: Request + HasModel,
    R::Model: TrackUpdated,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let by = request.activation().activated_by().to_string();
        request.model_mut().stamp_updated(Utc::now(), &by);

        next.run(request, token).await
    }

    fn behavior_name(&self) -> &str {
        "track_updated"
    }
}
