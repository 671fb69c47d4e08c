//! # Structured Error Handling
//!
//! Fault taxonomy for the dispatch pipeline. Every fault kind carries enough
//! structure for a boundary layer (HTTP, gRPC, messaging) to map it onto a
//! transport-level status without re-parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Faults that can unwind out of a dispatched pipeline.
///
/// Behaviors let faults raised by inner links propagate unchanged unless
/// their documented contract says they re-classify (the validation behavior
/// converts a raw validator outcome into [`PipelineError::Validation`]).
/// Cancellation is its own kind and is never reinterpreted as a domain fault.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Client input failed validation. Maps to a 400-equivalent status.
    #[error("validation failed with {} field error(s)", errors.len())]
    Validation { errors: Vec<FieldError> },

    /// Tenant or identity mismatch. Maps to a 403-equivalent status.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// Explicit business fault raised by a handler or behavior.
    #[error("domain fault ({status}): {message}")]
    Domain { status: u16, message: String },

    /// The dispatch observed its cancellation token.
    #[error("dispatch cancelled")]
    Cancelled,

    /// No terminal handler is registered for the dispatched request type.
    #[error("no handler registered for request type '{request_type}'")]
    HandlerNotFound { request_type: &'static str },

    /// Invalid mediator or environment configuration.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// Anything else (cache provider failure, serialization failure).
    /// Propagates unchanged up through the chain.
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn domain(status: u16, message: impl Into<String>) -> Self {
        Self::Domain {
            status,
            message: message.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// The transport-agnostic status hint for this fault kind.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Forbidden { .. } => 403,
            Self::Domain { status, .. } => *status,
            Self::Cancelled => 499,
            Self::HandlerNotFound { .. } | Self::Configuration { .. } => 500,
            Self::Infrastructure(_) => 500,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
