//! KeelComponent controller: the orchestration driver
//!
//! Runs one reconciliation pass per component event: `before`, then apply
//! the objects returned by `resources`, then `after`. A dependency that is
//! not ready yet skips the pass and requeues with jitter; nothing applied
//! earlier is touched and nothing is ever deleted.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use rand::Rng;
use tracing::{debug, error, info, info_span, instrument, warn, Span};
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use keel_common::crd::{KeelComponent, KeelComponentStatus};
use keel_common::events::{actions, reasons, EventPublisher};
use keel_common::metrics::{record_objects_applied, ReconcileTimer};
use keel_common::{
    Error, KubeEventPublisher, StepError, StepResult, KEEL_SYSTEM_NAMESPACE,
    REQUEUE_ERROR_SECS, REQUEUE_NOT_READY_SECS, REQUEUE_SUCCESS_SECS,
};

use crate::apply::{KubeObjectApplier, ObjectApplier};
use crate::context::PassContext;
use crate::desired::DesiredObject;
use crate::handlers::{ComponentHandler, ComponentKind};
use crate::resolver::{ClusterReader, KubeClusterReader};

/// Event reporter name
pub const CONTROLLER_NAME: &str = "keel-component-controller";

/// Whether the priority (init) components are all running.
///
/// Non-priority components are held back until this reports `true`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InitGate: Send + Sync {
    /// Check the priority components in `namespace`
    async fn init_components_running(&self, namespace: &str) -> Result<bool, Error>;
}

/// Shared context for the component controller
pub struct ComponentContext {
    /// Cluster reads for dependency resolution
    pub reader: Arc<dyn ClusterReader>,
    /// Cluster writes
    pub applier: Arc<dyn ObjectApplier>,
    /// Kubernetes Event publisher
    pub events: Arc<dyn EventPublisher>,
    /// Priority component ordering
    pub init_gate: Arc<dyn InitGate>,
    /// Name of the KeelCluster resource
    pub cluster_name: String,
}

impl ComponentContext {
    /// Create a context from explicit collaborators
    pub fn new(
        reader: Arc<dyn ClusterReader>,
        applier: Arc<dyn ObjectApplier>,
        events: Arc<dyn EventPublisher>,
        init_gate: Arc<dyn InitGate>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            applier,
            events,
            init_gate,
            cluster_name: cluster_name.into(),
        }
    }

    /// Create a context backed by the Kubernetes API
    pub fn from_client(
        client: Client,
        init_gate: Arc<dyn InitGate>,
        cluster_name: impl Into<String>,
    ) -> Self {
        Self::new(
            Arc::new(KubeClusterReader::new(client.clone())),
            Arc::new(KubeObjectApplier::new(client.clone())),
            Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)),
            init_gate,
            cluster_name,
        )
    }

    /// Create a context for testing with mock collaborators
    #[cfg(test)]
    pub fn for_testing(
        reader: Arc<dyn ClusterReader>,
        applier: Arc<dyn ObjectApplier>,
        init_gate: Arc<dyn InitGate>,
    ) -> Self {
        Self::new(
            reader,
            applier,
            Arc::new(keel_common::NoopEventPublisher),
            init_gate,
            "keel-cluster",
        )
    }
}

/// Requeue delay for a pass skipped on a missing dependency
pub fn not_ready_requeue() -> Duration {
    let base = Duration::from_secs(REQUEUE_NOT_READY_SECS);
    let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
    base + Duration::from_millis(jitter_ms)
}

fn pass_span(component: &str, namespace: &str) -> Span {
    info_span!(
        "component_pass",
        component = %component,
        namespace = %namespace,
        pass_id = %Uuid::new_v4()
    )
}

/// Reconcile a KeelComponent
#[instrument(skip(component, ctx), fields(component = %component.name_any()))]
pub async fn reconcile(
    component: Arc<KeelComponent>,
    ctx: Arc<ComponentContext>,
) -> Result<Action, Error> {
    let name = component.name_any();

    let Some(kind) = ComponentKind::from_name(&name) else {
        debug!("no handler for component, leaving it alone");
        return Ok(Action::await_change());
    };

    if let Err(e) = component.validate() {
        warn!(error = %e, "component validation failed");
        ctx.events
            .publish(
                &component.object_ref(&()),
                EventType::Warning,
                reasons::VALIDATION_FAILED,
                actions::RECONCILE,
                Some(e.to_string()),
            )
            .await;
        // Requires a spec change
        return Ok(Action::await_change());
    }

    let namespace = component
        .namespace()
        .unwrap_or_else(|| KEEL_SYSTEM_NAMESPACE.to_string());

    if !component.is_init_component() && !ctx.init_gate.init_components_running(&namespace).await?
    {
        debug!("waiting for priority components");
        return Ok(Action::requeue(not_ready_requeue()));
    }

    let span = pass_span(&name, &namespace);
    let timer = ReconcileTimer::start(&name);

    match run_pass(kind.handler(), component, namespace, span.clone(), &ctx).await {
        Ok(()) => {
            timer.success();
            Ok(Action::requeue(Duration::from_secs(REQUEUE_SUCCESS_SECS)))
        }
        Err(StepError::Recoverable(not_ready)) => {
            info!(parent: &span, dependency = %not_ready.dependency, reason = %not_ready.message, "dependency not ready, skipping pass");
            timer.not_ready(&not_ready.dependency);
            Ok(Action::requeue(not_ready_requeue()))
        }
        Err(StepError::Fatal(e)) => {
            timer.error(if e.is_retryable() { "transient" } else { "permanent" });
            Err(e)
        }
    }
}

/// Error policy for the component controller
///
/// - Retryable errors (transient): requeue after 30 seconds
/// - Non-retryable errors (permanent): await spec change
pub fn error_policy(
    component: Arc<KeelComponent>,
    error: &Error,
    _ctx: Arc<ComponentContext>,
) -> Action {
    error!(
        ?error,
        component = %component.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(REQUEUE_ERROR_SECS))
    } else {
        Action::await_change()
    }
}

/// One `before → resources → after` pass
async fn run_pass(
    handler: &dyn ComponentHandler,
    component: Arc<KeelComponent>,
    namespace: String,
    span: Span,
    ctx: &ComponentContext,
) -> StepResult<()> {
    let object_ref = component.object_ref(&());

    let cluster = match ctx.reader.get_cluster(&namespace, &ctx.cluster_name).await? {
        Some(cluster) => Arc::new(cluster),
        None => {
            return Err(StepError::not_ready(
                format!("keelcluster {}/{}", namespace, ctx.cluster_name),
                "cluster specification not found",
            ))
        }
    };
    let pass = PassContext::new(component, cluster, namespace, span);

    let deps = match handler.before(&pass, ctx.reader.as_ref()).await {
        Ok(deps) => deps,
        Err(StepError::Fatal(e)) => {
            warn!(parent: &pass.span, error = %e, "before step failed");
            ctx.events
                .publish(
                    &object_ref,
                    EventType::Warning,
                    reasons::DEPENDENCY_FAILED,
                    actions::RESOLVE,
                    Some(e.to_string()),
                )
                .await;
            return Err(e.into());
        }
        Err(not_ready) => return Err(not_ready),
    };
    let pass = pass.resolved(deps);

    let objects = handler.resources(&pass)?;
    let name = pass.name();

    if let Err(e) = ctx.applier.apply_all(&pass.namespace, &name, &objects).await {
        error!(parent: &pass.span, error = %e, "applying resources failed");
        ctx.events
            .publish(
                &object_ref,
                EventType::Warning,
                reasons::APPLY_FAILED,
                actions::APPLY,
                Some(e.to_string()),
            )
            .await;
        return Err(e.into());
    }
    for object in &objects {
        record_objects_applied(&name, object.kind(), 1);
    }
    debug!(parent: &pass.span, count = objects.len(), "resources applied");

    if let Some(status) = controller_status(&objects) {
        if pass.component.status.as_ref() != Some(&status) {
            ctx.applier
                .patch_component_status(&pass.namespace, &name, &status)
                .await?;
            info!(
                parent: &pass.span,
                controller_type = %status.controller_type,
                controller_name = %status.controller_name,
                "recorded backing controller"
            );
            ctx.events
                .publish(
                    &object_ref,
                    EventType::Normal,
                    reasons::RESOURCES_APPLIED,
                    actions::APPLY,
                    Some(format!(
                        "{} {} applied",
                        status.controller_type, status.controller_name
                    )),
                )
                .await;
        }
    }

    if let Err(e) = handler.after(&pass, ctx.reader.as_ref()).await {
        // Applied objects stay; the next pass converges
        warn!(parent: &pass.span, error = %e, "after step failed");
        ctx.events
            .publish(
                &object_ref,
                EventType::Warning,
                reasons::POST_APPLY_FAILED,
                actions::POST_APPLY,
                Some(e.to_string()),
            )
            .await;
        return Err(e.into());
    }

    Ok(())
}

/// Status naming the first workload controller among the applied objects
fn controller_status(objects: &[DesiredObject]) -> Option<KeelComponentStatus> {
    objects.iter().find_map(|object| {
        object.controller_type().map(|controller_type| KeelComponentStatus {
            controller_type,
            controller_name: object.name(),
        })
    })
}
