//! End-to-end scenarios wiring the worked behaviors through a full mediator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use mediate_core::behaviors::{
    EntityChanged, EntityChangedBehavior, MemoryCache, MemoryCacheBehavior,
    TenantDefaultBehavior, TrackCreatedBehavior, TrackUpdatedBehavior, ValidationBehavior,
    ValidationOutcome, Validator,
};
use mediate_core::cancellation::CancellationToken;
use mediate_core::error::{FieldError, PipelineError, Result};
use mediate_core::pipeline::{Mediator, Next, PipelineBehavior, RequestHandler};
use mediate_core::registry::NotificationSubscriber;
use mediate_core::request::{
    Activation, Cacheable, ChangeKind, HasModel, HasTenant, Mutation, Principal, Request,
    TrackCreated, TrackUpdated,
};

struct TenantPrincipal {
    name: &'static str,
    tenant: Uuid,
}

impl Principal for TenantPrincipal {
    fn display_name(&self) -> Option<&str> {
        Some(self.name)
    }

    fn tenant_id(&self) -> Uuid {
        self.tenant
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Widget {
    name: String,
    tenant_id: Uuid,
    created: Option<DateTime<Utc>>,
    created_by: Option<String>,
    updated: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl HasTenant for Widget {
    fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: Uuid) {
        self.tenant_id = tenant_id;
    }
}

impl TrackCreated for Widget {
    fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    fn stamp_created(&mut self, at: DateTime<Utc>, by: &str) {
        self.created = Some(at);
        self.created_by = Some(by.to_string());
    }
}

impl TrackUpdated for Widget {
    fn stamp_updated(&mut self, at: DateTime<Utc>, by: &str) {
        self.updated = Some(at);
        self.updated_by = Some(by.to_string());
    }
}

struct CreateWidget {
    activation: Activation,
    model: Widget,
}

impl CreateWidget {
    fn with_principal(principal: TenantPrincipal, model: Widget) -> Self {
        Self {
            activation: Activation::new(Some(Arc::new(principal))),
            model,
        }
    }
}

impl Request for CreateWidget {
    type Response = Option<Widget>;

    fn activation(&self) -> &Activation {
        &self.activation
    }
}

impl HasModel for CreateWidget {
    type Model = Widget;

    fn model(&self) -> &Widget {
        &self.model
    }

    fn model_mut(&mut self) -> &mut Widget {
        &mut self.model
    }
}

impl Mutation for CreateWidget {
    const KIND: ChangeKind = ChangeKind::Created;
}

struct CreateWidgetHandler {
    invocations: Arc<AtomicU64>,
}

#[async_trait]
impl RequestHandler<CreateWidget> for CreateWidgetHandler {
    async fn handle(
        &self,
        request: &CreateWidget,
        _token: &CancellationToken,
    ) -> Result<Option<Widget>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        // Stand-in for the data layer: echo the finalized model as the
        // created read-model.
        Ok(Some(request.model.clone()))
    }

    fn handler_name(&self) -> &str {
        "create_widget_handler"
    }
}

struct WidgetNameRequired;

#[async_trait]
impl Validator<CreateWidget> for WidgetNameRequired {
    async fn validate(
        &self,
        value: &CreateWidget,
        _token: &CancellationToken,
    ) -> Result<ValidationOutcome> {
        if value.model.name.is_empty() {
            Ok(ValidationOutcome::invalid(vec![FieldError::new(
                "name",
                "must not be empty",
            )]))
        } else {
            Ok(ValidationOutcome::valid())
        }
    }
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
        Some(Duration::from_secs(300))
    }

    fn cache_tag(&self) -> Option<String> {
        Some("widget".to_string())
    }
}

struct GetWidgetHandler {
    invocations: Arc<AtomicU64>,
}

#[async_trait]
impl RequestHandler<GetWidget> for GetWidgetHandler {
    async fn handle(&self, request: &GetWidget, _token: &CancellationToken) -> Result<Option<Widget>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Widget {
            name: request.name.clone(),
            ..Widget::default()
        }))
    }
}

struct WidgetProjection {
    received: AtomicU64,
}

#[async_trait]
impl NotificationSubscriber<EntityChanged<Widget>> for WidgetProjection {
    async fn handle(
        &self,
        notification: &EntityChanged<Widget>,
        _token: &CancellationToken,
    ) -> Result<()> {
        assert_eq!(notification.kind, ChangeKind::Created);
        self.received.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscriber_name(&self) -> &str {
        "widget_projection"
    }
}

#[tokio::test]
async fn create_command_defaults_tenant_validates_and_stamps_audit() {
    let tenant = Uuid::new_v4();
    let invocations = Arc::new(AtomicU64::new(0));

    let mediator = Mediator::builder()
        .register_behavior::<CreateWidget>(Arc::new(TenantDefaultBehavior))
        .register_behavior::<CreateWidget>(Arc::new(ValidationBehavior::new(Arc::new(
            WidgetNameRequired,
        ))))
        .register_behavior::<CreateWidget>(Arc::new(TrackCreatedBehavior))
        .register_behavior::<CreateWidget>(Arc::new(TrackUpdatedBehavior))
        .register_handler::<CreateWidget>(Arc::new(CreateWidgetHandler {
            invocations: invocations.clone(),
        }))
        .build();

    let command = CreateWidget::with_principal(
        TenantPrincipal {
            name: "JohnDoe",
            tenant,
        },
        Widget {
            name: "X".to_string(),
            ..Widget::default()
        },
    );
    assert_eq!(command.activation().activated_by(), "JohnDoe");

    let created = mediator.send(command).await.unwrap().expect("created");

    assert_eq!(created.tenant_id, tenant, "unset tenant defaulted to T1");
    assert!(created.created.is_some());
    assert_eq!(created.created_by.as_deref(), Some("JohnDoe"));
    assert_eq!(created.updated_by.as_deref(), Some("JohnDoe"));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn create_command_with_empty_name_never_reaches_handler() {
    let invocations = Arc::new(AtomicU64::new(0));

    let mediator = Mediator::builder()
        .register_behavior::<CreateWidget>(Arc::new(ValidationBehavior::new(Arc::new(
            WidgetNameRequired,
        ))))
        .register_handler::<CreateWidget>(Arc::new(CreateWidgetHandler {
            invocations: invocations.clone(),
        }))
        .build();

    let command = CreateWidget::with_principal(
        TenantPrincipal {
            name: "JohnDoe",
            tenant: Uuid::new_v4(),
        },
        Widget::default(),
    );

    let result = mediator.send(command).await;
    match result {
        Err(PipelineError::Validation { errors }) => {
            assert_eq!(errors[0].field, "name");
        }
        other => panic!("expected validation fault, got {other:?}"),
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cached_query_invokes_handler_once() {
    let invocations = Arc::new(AtomicU64::new(0));
    let store = Arc::new(MemoryCache::new());

    let mediator = Mediator::builder()
        .register_behavior::<GetWidget>(Arc::new(MemoryCacheBehavior::new(store)))
        .register_handler::<GetWidget>(Arc::new(GetWidgetHandler {
            invocations: invocations.clone(),
        }))
        .build();

    let first = mediator.send(GetWidget::named("gizmo")).await.unwrap();
    let second = mediator.send(GetWidget::named("gizmo")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        invocations.load(Ordering::SeqCst),
        1,
        "second dispatch served from cache"
    );

    // A different key misses.
    mediator.send(GetWidget::named("doohickey")).await.unwrap();
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn successful_create_fans_out_entity_change() {
    let projection = Arc::new(WidgetProjection {
        received: AtomicU64::new(0),
    });
    let invocations = Arc::new(AtomicU64::new(0));

    let builder = Mediator::builder().register_subscriber::<EntityChanged<Widget>>(projection.clone());
    let subscribers = builder.subscribers();

    let mediator = builder
        .register_behavior::<CreateWidget>(Arc::new(EntityChangedBehavior::new(subscribers)))
        .register_handler::<CreateWidget>(Arc::new(CreateWidgetHandler {
            invocations: invocations.clone(),
        }))
        .build();

    let command = CreateWidget::with_principal(
        TenantPrincipal {
            name: "JohnDoe",
            tenant: Uuid::new_v4(),
        },
        Widget {
            name: "X".to_string(),
            ..Widget::default()
        },
    );

    let created = mediator.send(command).await.unwrap();
    assert!(created.is_some());
    assert_eq!(projection.received.load(Ordering::SeqCst), 1);
    assert_eq!(mediator.subscriber_count::<EntityChanged<Widget>>(), 1);
}

#[tokio::test]
async fn behavior_can_short_circuit_without_reaching_chain() {
    struct Guard;

    #[async_trait]
    impl PipelineBehavior<CreateWidget> for Guard {
        async fn handle(
            &self,
            _request: &mut CreateWidget,
            _next: Next<'_, CreateWidget>,
            _token: &CancellationToken,
        ) -> Result<Option<Widget>> {
            // Dropping `next` without running it short-circuits the chain.
            Err(PipelineError::forbidden("writes disabled"))
        }
    }

    let invocations = Arc::new(AtomicU64::new(0));
    let mediator = Mediator::builder()
        .register_behavior::<CreateWidget>(Arc::new(Guard))
        .register_handler::<CreateWidget>(Arc::new(CreateWidgetHandler {
            invocations: invocations.clone(),
        }))
        .build();

    let command = CreateWidget::with_principal(
        TenantPrincipal {
            name: "JohnDoe",
            tenant: Uuid::new_v4(),
        },
        Widget::default(),
    );

    let result = mediator.send(command).await;
    assert!(matches!(result, Err(PipelineError::Forbidden { .. })));
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}
