//! # Handler Registry
//!
//! Maps a request type to exactly one terminal handler.
//!
//! Registration policy is first-registration-wins ("try add"): a second
//! handler registered for the same request type is ignored with a warning,
//! never silently replaced. Resolution failure is a hard error surfaced to
//! the caller at composition time, not swallowed.

use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::pipeline::RequestHandler;
use crate::request::Request;

struct HandlerEntry {
    request_type: &'static str,
    // Box holds an Arc<dyn RequestHandler<R>> for the entry's R.
    handler: Box<dyn Any + Send + Sync>,
}

/// One-handler-per-request-type registry.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: HashMap<TypeId, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for request type `R` unless one is already present.
    ///
    /// Returns `true` when the handler was registered, `false` when an
    /// earlier registration won.
    pub fn try_add<R: Request>(&mut self, handler: Arc<dyn RequestHandler<R>>) -> bool {
        let request_type = std::any::type_name::<R>();

        match self.entries.entry(TypeId::of::<R>()) {
            Entry::Occupied(_) => {
                warn!(
                    request_type,
                    "handler already registered for request type; ignoring duplicate"
                );
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(HandlerEntry {
                    request_type,
                    handler: Box::new(handler),
                });
                info!(request_type, "registered request handler");
                true
            }
        }
    }

    /// Resolve the handler for `R`, if one was registered.
    pub fn resolve<R: Request>(&self) -> Option<Arc<dyn RequestHandler<R>>> {
        self.entries
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.handler.downcast_ref::<Arc<dyn RequestHandler<R>>>())
            .cloned()
    }

    pub fn contains<R: Request>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<R>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Type names of all registered request types, for diagnostics.
    pub fn registered_request_types(&self) -> Vec<&'static str> {
        self.entries.values().map(|e| e.request_type).collect()
    }
}
