//! # Behavior Registry
//!
//! Ordered lists of cross-cutting behaviors per request type.
//!
//! Registration order is significant: it defines execution order on the way
//! into the pipeline and the exact-reverse order on the way out. The registry
//! preserves insertion order per request type and never reorders.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::pipeline::PipelineBehavior;
use crate::request::Request;

struct BehaviorList {
    request_type: &'static str,
    // Box holds a Vec<Arc<dyn PipelineBehavior<R>>> for the entry's R.
    behaviors: Box<dyn Any + Send + Sync>,
}

/// Per-request-type ordered behavior lists.
#[derive(Default)]
pub struct BehaviorRegistry {
    entries: HashMap<TypeId, BehaviorList>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `behavior` to the list for request type `R`.
    pub fn push<R: Request>(&mut self, behavior: Arc<dyn PipelineBehavior<R>>) {
        let request_type = std::any::type_name::<R>();

        let entry = self
            .entries
            .entry(TypeId::of::<R>())
            .or_insert_with(|| BehaviorList {
                request_type,
                behaviors: Box::new(Vec::<Arc<dyn PipelineBehavior<R>>>::new()),
            });

        let list = entry
            .behaviors
            .downcast_mut::<Vec<Arc<dyn PipelineBehavior<R>>>>()
            .expect("behavior list stored under matching TypeId");
        list.push(behavior);

        info!(
            request_type,
            position = list.len(),
            "registered pipeline behavior"
        );
    }

    /// The registered behaviors for `R` in registration order; empty when
    /// none were registered (the pipeline then degenerates to the handler).
    pub fn resolve<R: Request>(&self) -> Vec<Arc<dyn PipelineBehavior<R>>> {
        self.entries
            .get(&TypeId::of::<R>())
            .and_then(|entry| {
                entry
                    .behaviors
                    .downcast_ref::<Vec<Arc<dyn PipelineBehavior<R>>>>()
            })
            .cloned()
            .unwrap_or_default()
    }

    pub fn count<R: Request>(&self) -> usize {
        self.entries
            .get(&TypeId::of::<R>())
            .and_then(|entry| {
                entry
                    .behaviors
                    .downcast_ref::<Vec<Arc<dyn PipelineBehavior<R>>>>()
            })
            .map_or(0, Vec::len)
    }

    /// Type names of request types with at least one behavior registered.
    pub fn registered_request_types(&self) -> Vec<&'static str> {
        self.entries.values().map(|e| e.request_type).collect()
    }
}
