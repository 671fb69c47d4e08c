//! # Caching Behaviors
//!
//! Opt-in response caching for the pipeline, plus tag-based invalidation.
//!
//! ## Overview
//!
//! A request that implements [`Cacheable`](crate::request::Cacheable) is
//! checked against a cache before the rest of the chain runs: a hit returns
//! the cached value without ever touching the handler; a miss runs the chain
//! and stores the result under the request's key with the request's
//! sliding/absolute expiration windows. A `None` response is never cached,
//! so "not found" is always re-checked.
//!
//! Two store shapes are supported:
//!
//! - [`CacheStore`]: in-process, values kept as shared `Any` handles
//!   ([`MemoryCacheBehavior`])
//! - [`BytesCache`]: out-of-process style, values serialized to bytes with
//!   serde ([`DistributedCacheBehavior`])
//!
//! [`CacheExpireBehavior`] invalidates every entry under a request's entity
//! tag after the wrapped operation completes without fault, whether or not
//! it actually changed anything.
//!
//! Consistency of cached values across concurrent writers for the same key
//! is the store's concern; behaviors hold no locks across store calls.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::error::{PipelineError, Result};
use crate::pipeline::{Next, PipelineBehavior};
use crate::request::{CacheExpire, Cacheable, Request};

/// Expiration and grouping attributes of one cache entry.
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    /// Window refreshed on every hit; the entry dies when it goes unread
    /// for this long.
    pub sliding: Option<Duration>,
    /// Hard lifetime measured from insertion.
    pub absolute: Option<Duration>,
    /// Tag grouping the entry for bulk invalidation.
    pub tag: Option<String>,
}

impl CachePolicy {
    fn from_cacheable<R: Cacheable>(request: &R) -> Self {
        Self {
            sliding: request.sliding_expiration(),
            absolute: request.absolute_expiration(),
            tag: request.cache_tag(),
        }
    }
}

/// In-process cache contract: shared-handle values under string keys.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Arc<dyn Any + Send + Sync>>>;
    async fn set(
        &self,
        key: &str,
        value: Arc<dyn Any + Send + Sync>,
        policy: CachePolicy,
    ) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    /// Drop every entry stored under `tag`.
    async fn remove_tag(&self, tag: &str) -> Result<()>;
}

/// Byte-oriented cache contract for distributed-style providers.
#[async_trait]
pub trait BytesCache: Send + Sync {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set_bytes(&self, key: &str, bytes: Vec<u8>, policy: CachePolicy) -> Result<()>;
    async fn remove_tag(&self, tag: &str) -> Result<()>;
}

struct MemoryEntry {
    value: Arc<dyn Any + Send + Sync>,
    tag: Option<String>,
    sliding: Option<Duration>,
    absolute_deadline: Option<Instant>,
    last_access: Instant,
}

impl MemoryEntry {
    fn expired(&self, now: Instant) -> bool {
        if let Some(deadline) = self.absolute_deadline {
            if now >= deadline {
                return true;
            }
        }
        if let Some(window) = self.sliding {
            if now.duration_since(self.last_access) >= window {
                return true;
            }
        }
        false
    }
}

/// DashMap-backed [`CacheStore`] with lazy expiry: entries are evicted when
/// a read finds them dead, and wholesale via [`CacheStore::remove_tag`].
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Arc<dyn Any + Send + Sync>>> {
        let now = Instant::now();

        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.expired(now) {
                drop(entry);
                self.entries.remove(key);
                return Ok(None);
            }
            entry.last_access = now;
            return Ok(Some(Arc::clone(&entry.value)));
        }

        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: Arc<dyn Any + Send + Sync>,
        policy: CachePolicy,
    ) -> Result<()> {
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                tag: policy.tag,
                sliding: policy.sliding,
                absolute_deadline: policy.absolute.map(|window| now + window),
                last_access: now,
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn remove_tag(&self, tag: &str) -> Result<()> {
        self.entries
            .retain(|_, entry| entry.tag.as_deref() != Some(tag));
        Ok(())
    }
}

struct BytesEntry {
    bytes: Vec<u8>,
    tag: Option<String>,
    sliding: Option<Duration>,
    absolute_deadline: Option<Instant>,
    last_access: Instant,
}

impl BytesEntry {
    fn expired(&self, now: Instant) -> bool {
        if let Some(deadline) = self.absolute_deadline {
            if now >= deadline {
                return true;
            }
        }
        if let Some(window) = self.sliding {
            if now.duration_since(self.last_access) >= window {
                return true;
            }
        }
        false
    }
}

/// In-memory [`BytesCache`] standing in for a distributed provider in tests
/// and single-process deployments.
#[derive(Default)]
pub struct InMemoryBytesCache {
    entries: DashMap<String, BytesEntry>,
}

impl InMemoryBytesCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BytesCache for InMemoryBytesCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();

        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.expired(now) {
                drop(entry);
                self.entries.remove(key);
                return Ok(None);
            }
            entry.last_access = now;
            return Ok(Some(entry.bytes.clone()));
        }

        Ok(None)
    }

    async fn set_bytes(&self, key: &str, bytes: Vec<u8>, policy: CachePolicy) -> Result<()> {
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            BytesEntry {
                bytes,
                tag: policy.tag,
                sliding: policy.sliding,
                absolute_deadline: policy.absolute.map(|window| now + window),
                last_access: now,
            },
        );
        Ok(())
    }

    async fn remove_tag(&self, tag: &str) -> Result<()> {
        self.entries
            .retain(|_, entry| entry.tag.as_deref() != Some(tag));
        Ok(())
    }
}

/// In-process cache behavior for requests opting in via `Cacheable`.
///
/// A hit never invokes the rest of the chain; a `None` response is never
/// stored.
pub struct MemoryCacheBehavior {
    store: Arc<dyn CacheStore>,
}

impl MemoryCacheBehavior {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<R, M> PipelineBehavior<R> for MemoryCacheBehavior
where
    R: Request<Response = Option<M>> + Cacheable,
    M: Clone + Send + Sync + 'static,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let key = request.cache_key();

        if let Some(hit) = self.store.get(&key).await? {
            match hit.downcast::<M>() {
                Ok(value) => {
                    debug!(cache_key = %key, "memory cache hit");
                    return Ok(Some((*value).clone()));
                }
                Err(_) => {
                    // Key collision across response types; treat as a miss.
                    warn!(cache_key = %key, "cached value has mismatched type; ignoring");
                }
            }
        }

        let response = next.run(request, token).await?;

        if let Some(value) = &response {
            self.store
                .set(
                    &key,
                    Arc::new(value.clone()),
                    CachePolicy::from_cacheable(request),
                )
                .await?;
            debug!(cache_key = %key, "memory cache populated");
        }

        Ok(response)
    }

    fn behavior_name(&self) -> &str {
        "memory_cache"
    }
}

/// Distributed-style cache behavior: responses serialized to bytes through
/// serde on the way in and deserialized on a hit. A payload that no longer
/// deserializes is treated as a miss, not a fault.
pub struct DistributedCacheBehavior {
    store: Arc<dyn BytesCache>,
}

impl DistributedCacheBehavior {
    pub fn new(store: Arc<dyn BytesCache>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<R, M> PipelineBehavior<R> for DistributedCacheBehavior
where
    R: Request<Response = Option<M>> + Cacheable,
    M: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let key = request.cache_key();

        if let Some(bytes) = self.store.get_bytes(&key).await? {
            match serde_json::from_slice::<M>(&bytes) {
                Ok(value) => {
                    debug!(cache_key = %key, "distributed cache hit");
                    return Ok(Some(value));
                }
                Err(e) => {
                    warn!(cache_key = %key, error = %e, "cached payload no longer deserializes; ignoring");
                }
            }
        }

        let response = next.run(request, token).await?;

        if let Some(value) = &response {
            let bytes = serde_json::to_vec(value)
                .map_err(|e| PipelineError::Infrastructure(anyhow::Error::new(e)))?;
            self.store
                .set_bytes(&key, bytes, CachePolicy::from_cacheable(request))
                .await?;
            debug!(cache_key = %key, "distributed cache populated");
        }

        Ok(response)
    }

    fn behavior_name(&self) -> &str {
        "distributed_cache"
    }
}

/// Invalidates every cached entry under the request's entity tag after the
/// wrapped operation completes without fault. Runs whether or not the
/// operation actually mutated anything.
pub struct CacheExpireBehavior {
    store: Arc<dyn CacheStore>,
    bytes: Option<Arc<dyn BytesCache>>,
}

impl CacheExpireBehavior {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store, bytes: None }
    }

    /// Also invalidate a byte-oriented store under the same tag.
    pub fn with_bytes(mut self, bytes: Arc<dyn BytesCache>) -> Self {
        self.bytes = Some(bytes);
        self
    }
}

#[async_trait]
impl<R> PipelineBehavior<R> for CacheExpireBehavior
where
    R: Request + CacheExpire,
{
    async fn handle(
        &self,
        request: &mut R,
        next: Next<'_, R>,
        token: &CancellationToken,
    ) -> Result<R::Response> {
        let response = next.run(request, token).await?;

        let tag = request.cache_tag();
        self.store.remove_tag(&tag).await?;
        if let Some(bytes) = &self.bytes {
            bytes.remove_tag(&tag).await?;
        }
        debug!(cache_tag = %tag, "expired cached entries for tag");

        Ok(response)
    }

    fn behavior_name(&self) -> &str {
        "cache_expire"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{compose, RequestHandler};
    use crate::registry::{BehaviorRegistry, HandlerRegistry};
    use crate::request::Activation;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Widget {
        name: String,
    }

    struct GetWidget {
        activation: Activation,
        name: String,
    }

    impl GetWidget {
        fn named(name: &str) -> Self {
            Self {
                activation: Activation::system(),
                name: name.to_string(),
            }
        }
    }

    impl Request for GetWidget {
        type Response = Option<Widget>;

        fn activation(&self) -> &Activation {
            &self.activation
        }
    }

    impl Cacheable for GetWidget {
        fn cache_key(&self) -> String {
            format!("widget:{}", self.name)
        }

        fn sliding_expiration(&self) -> Option<Duration> {
            Some(Duration::from_secs(60))
        }

        fn cache_tag(&self) -> Option<String> {
            Some("widget".to_string())
        }
    }

    struct WidgetHandler {
        invocations: Arc<AtomicU64>,
        found: bool,
    }

    #[async_trait]
    impl RequestHandler<GetWidget> for WidgetHandler {
        async fn handle(
            &self,
            request: &GetWidget,
            _token: &CancellationToken,
        ) -> Result<Option<Widget>> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(self.found.then(|| Widget {
                name: request.name.clone(),
            }))
        }
    }

    struct ExpireWidgets {
        activation: Activation,
    }

    impl Request for ExpireWidgets {
        type Response = ();

        fn activation(&self) -> &Activation {
            &self.activation
        }
    }

    impl CacheExpire for ExpireWidgets {
        fn cache_tag(&self) -> String {
            "widget".to_string()
        }
    }

    struct NoopHandler;

    #[async_trait]
    impl RequestHandler<ExpireWidgets> for NoopHandler {
        async fn handle(&self, _request: &ExpireWidgets, _token: &CancellationToken) -> Result<()> {
            Ok(())
        }
    }

    fn query_pipeline(
        behavior: Arc<dyn PipelineBehavior<GetWidget>>,
        found: bool,
    ) -> (crate::pipeline::Pipeline<GetWidget>, Arc<AtomicU64>) {
        let invocations = Arc::new(AtomicU64::new(0));
        let mut handlers = HandlerRegistry::new();
        handlers.try_add::<GetWidget>(Arc::new(WidgetHandler {
            invocations: invocations.clone(),
            found,
        }));
        let mut behaviors = BehaviorRegistry::new();
        behaviors.push::<GetWidget>(behavior);
        (
            compose::<GetWidget>(&handlers, &behaviors).unwrap(),
            invocations,
        )
    }

    #[tokio::test]
    async fn test_memory_hit_short_circuits_handler() {
        let store = Arc::new(MemoryCache::new());
        let (pipeline, invocations) =
            query_pipeline(Arc::new(MemoryCacheBehavior::new(store.clone())), true);
        let token = CancellationToken::new();

        let mut first = GetWidget::named("gizmo");
        let miss = pipeline.execute(&mut first, &token).await.unwrap();
        assert_eq!(miss.unwrap().name, "gizmo");
        assert_eq!(invocations.load(Ordering::SeqCst), 1);

        let mut second = GetWidget::named("gizmo");
        let hit = pipeline.execute(&mut second, &token).await.unwrap();
        assert_eq!(hit.unwrap().name, "gizmo");
        assert_eq!(invocations.load(Ordering::SeqCst), 1, "handler not re-invoked on hit");
    }

    #[tokio::test]
    async fn test_none_response_never_cached() {
        let store = Arc::new(MemoryCache::new());
        let (pipeline, invocations) =
            query_pipeline(Arc::new(MemoryCacheBehavior::new(store.clone())), false);
        let token = CancellationToken::new();

        for _ in 0..2 {
            let mut request = GetWidget::named("ghost");
            assert!(pipeline.execute(&mut request, &token).await.unwrap().is_none());
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 2, "absent result re-checked");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_distributed_round_trips_through_bytes() {
        let store = Arc::new(InMemoryBytesCache::new());
        let (pipeline, invocations) =
            query_pipeline(Arc::new(DistributedCacheBehavior::new(store.clone())), true);
        let token = CancellationToken::new();

        let mut first = GetWidget::named("gizmo");
        pipeline.execute(&mut first, &token).await.unwrap();
        let mut second = GetWidget::named("gizmo");
        let hit = pipeline.execute(&mut second, &token).await.unwrap();

        assert_eq!(hit.unwrap().name, "gizmo");
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert!(store.get_bytes("widget:gizmo").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expire_clears_tagged_entries() {
        let store = Arc::new(MemoryCache::new());
        let (query, _invocations) =
            query_pipeline(Arc::new(MemoryCacheBehavior::new(store.clone())), true);
        let token = CancellationToken::new();

        let mut request = GetWidget::named("gizmo");
        query.execute(&mut request, &token).await.unwrap();
        assert_eq!(store.len(), 1);

        let mut handlers = HandlerRegistry::new();
        handlers.try_add::<ExpireWidgets>(Arc::new(NoopHandler));
        let mut behaviors = BehaviorRegistry::new();
        behaviors.push::<ExpireWidgets>(Arc::new(CacheExpireBehavior::new(store.clone())));
        let expire = compose::<ExpireWidgets>(&handlers, &behaviors).unwrap();

        let mut command = ExpireWidgets {
            activation: Activation::system(),
        };
        expire.execute(&mut command, &token).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sliding_expiration_evicts() {
        let store = MemoryCache::new();
        store
            .set(
                "k",
                Arc::new(Widget {
                    name: "old".to_string(),
                }),
                CachePolicy {
                    sliding: Some(Duration::from_millis(5)),
                    ..CachePolicy::default()
                },
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.is_empty());
    }
}
