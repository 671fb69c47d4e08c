//! # Validation Behavior
//!
//! Runs an injected validator against the request (or just its model
//! payload) before anything downstream executes. An invalid outcome becomes
//! a [`PipelineError::Validation`] fault carrying the structured field
//! errors, and the rest of the chain never runs. With no validator injected
//! the pipeline proceeds unchanged.
//!
//! This is the one behavior whose contract re-classifies: a raw validator
//! outcome is converted into a Validation fault. Infrastructure failures
//! *inside* the validator still propagate unchanged.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cancellation::CancellationToken;
use crate::error::{FieldError, PipelineError, Result};
use crate::pipeline::{Next, PipelineBehavior};
use crate::request::{HasModel, Request};

/// Result of running a validator: valid when the error list is empty.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<FieldError>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn invalid(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Injected validation contract.
#[async_trait]
pub trait Validator<T: ?Sized>: Send + Sync {
    async fn validate(&self, value: &T, token: &CancellationToken) -> Result<ValidationOutcome>;
}

/// Validates the whole request value.
pub struct ValidationBehavior<R> {
    validator: Option<Arc<dyn Validator<R>>>,
}

impl<R> ValidationBehavior<R> {
    pub fn new(validator: Arc<dyn Validator<R>>) -> Self {
        Self {
            validator: Some(validator),
        }
    }

    /// No validator registered; requests pass through unchanged.
    pub fn disabled() -> Self {
        Self { validator: None }
    }
}

#[async_trait]
impl<R> PipelineBehavior<R> for ValidationBehavior<R>
where
    R: Request,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        if let Some(validator) = &self.validator {
            let outcome = validator.validate(&*request, token).await?;
            if !outcome.is_valid() {
                return Err(PipelineError::Validation {
                    errors: outcome.errors,
                });
            }
        }

        next.run(request, token).await
    }

    fn behavior_name(&self) -> &str {
        "validation"
    }
}

/// Validates only the request's model payload.
pub struct ModelValidationBehavior<R: HasModel> {
    validator: Option<Arc<dyn Validator<R::Model>>>,
}

impl<R: HasModel> ModelValidationBehavior<R> {
    pub fn new(validator: Arc<dyn Validator<R::Model>>) -> Self {
        Self {
            validator: Some(validator),
        }
    }

    pub fn disabled() -> Self {
        Self { validator: None }
    }
}

#[async_trait]
impl<R> PipelineBehavior<R> for ModelValidationBehavior<R>
where
    R: Request + HasModel,
    R::Model: Send + Sync,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        if let Some(validator) = &self.validator {
            let outcome = validator.validate(request.model(), token).await?;
            if !outcome.is_valid() {
                return Err(PipelineError::Validation {
                    errors: outcome.errors,
                });
            }
        }

        next.run(request, token).await
    }

    fn behavior_name(&self) -> &str {
        "model_validation"
    }
}
