//! Mediator configuration with environment-variable overrides.

use crate::error::{PipelineError, Result};

/// Tunables for the dispatcher and the behaviors that consult it.
#[derive(Debug, Clone)]
pub struct MediatorConfig {
    /// Record dispatches in the bounded in-memory history.
    pub enable_history: bool,
    /// Maximum number of dispatch records kept; oldest are dropped first.
    pub max_history_size: usize,
    /// Whether the entity-change notification behavior propagates subscriber
    /// faults to the dispatch caller instead of logging and swallowing them.
    /// See `behaviors::notify` for the tradeoff.
    pub propagate_notify_errors: bool,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            enable_history: true,
            max_history_size: 1000,
            propagate_notify_errors: false,
        }
    }
}

impl MediatorConfig {
    /// Defaults overridden by `MEDIATE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(enable) = std::env::var("MEDIATE_ENABLE_HISTORY") {
            config.enable_history = enable.parse().map_err(|e| PipelineError::Configuration {
                reason: format!("invalid MEDIATE_ENABLE_HISTORY: {e}"),
            })?;
        }

        if let Ok(size) = std::env::var("MEDIATE_MAX_HISTORY_SIZE") {
            config.max_history_size = size.parse().map_err(|e| PipelineError::Configuration {
                reason: format!("invalid MEDIATE_MAX_HISTORY_SIZE: {e}"),
            })?;
        }

        if let Ok(propagate) = std::env::var("MEDIATE_PROPAGATE_NOTIFY_ERRORS") {
            config.propagate_notify_errors =
                propagate.parse().map_err(|e| PipelineError::Configuration {
                    reason: format!("invalid MEDIATE_PROPAGATE_NOTIFY_ERRORS: {e}"),
                })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MediatorConfig::default();
        assert!(config.enable_history);
        assert_eq!(config.max_history_size, 1000);
        assert!(!config.propagate_notify_errors);
    }
}
