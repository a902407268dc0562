//! Status translation: controller status and pods to a component view
//!
//! Dispatches on the component's recorded [`ControllerType`] to read the
//! replica counts, then lists the controller's pods for diagnostics. The
//! lifecycle is `Running` iff all desired replicas are ready and there is at
//! least one.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ContainerStatus, Pod, PodTemplateSpec};
use kube::ResourceExt;
use tracing::{debug, warn};

use keel_common::crd::{ControllerType, KeelComponent};
use keel_common::kube_utils::{has_condition, label_selector};
use keel_common::{Error, KEEL_SYSTEM_NAMESPACE};

use crate::reader::StatusReader;
use crate::view::{
    ComponentLifecycle, ComponentStatusView, ContainerState, ContainerStatusView, PodPhase,
    PodStatusView,
};

const CONTAINER_ID_LEN: usize = 8;

/// Replica counts and pod labels read from a workload controller
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControllerSnapshot {
    /// Desired replicas (desired scheduled for per-node controllers)
    pub replicas: i32,
    /// Ready replicas (available for per-node controllers)
    pub ready_replicas: i32,
    /// Labels of the pod template
    pub pod_labels: BTreeMap<String, String>,
}

fn template_labels(template: &PodTemplateSpec) -> BTreeMap<String, String> {
    template
        .metadata
        .as_ref()
        .and_then(|m| m.labels.clone())
        .unwrap_or_default()
}

/// Read the controller backing a component
pub async fn controller_snapshot(
    reader: &dyn StatusReader,
    namespace: &str,
    component: &KeelComponent,
) -> Result<ControllerSnapshot, Error> {
    let name = component.name_any();
    let status = component.status.clone().unwrap_or_default();
    let controller_name = status.controller_name.as_str();

    match status.controller_type {
        ControllerType::Deployment => {
            let deploy = reader.get_deployment(namespace, controller_name).await?;
            let observed = deploy.status.unwrap_or_default();
            Ok(ControllerSnapshot {
                replicas: observed.replicas.unwrap_or(0),
                ready_replicas: observed.ready_replicas.unwrap_or(0),
                pod_labels: deploy
                    .spec
                    .as_ref()
                    .map(|s| template_labels(&s.template))
                    .unwrap_or_default(),
            })
        }
        ControllerType::StatefulSet => {
            let sts = reader.get_stateful_set(namespace, controller_name).await?;
            let observed = sts.status.unwrap_or_default();
            Ok(ControllerSnapshot {
                replicas: observed.replicas,
                ready_replicas: observed.ready_replicas.unwrap_or(0),
                pod_labels: sts
                    .spec
                    .as_ref()
                    .map(|s| template_labels(&s.template))
                    .unwrap_or_default(),
            })
        }
        ControllerType::DaemonSet => {
            let ds = reader.get_daemon_set(namespace, controller_name).await?;
            let observed = ds.status.unwrap_or_default();
            Ok(ControllerSnapshot {
                replicas: observed.desired_number_scheduled,
                ready_replicas: observed.number_available.unwrap_or(0),
                pod_labels: ds
                    .spec
                    .as_ref()
                    .map(|s| template_labels(&s.template))
                    .unwrap_or_default(),
            })
        }
        ControllerType::Unknown(value) => Err(Error::unsupported_controller(name, value)),
    }
}

/// Translate a component's live state into its status view
pub async fn translate(
    reader: &dyn StatusReader,
    component: &KeelComponent,
) -> Result<ComponentStatusView, Error> {
    let name = component.name_any();
    let namespace = component
        .namespace()
        .unwrap_or_else(|| KEEL_SYSTEM_NAMESPACE.to_string());

    let snapshot = controller_snapshot(reader, &namespace, component).await?;
    let pods = list_pods(reader, &namespace, &name, &snapshot.pod_labels).await;

    let mut view = ComponentStatusView {
        name,
        status: ComponentLifecycle::from_replicas(snapshot.replicas, snapshot.ready_replicas),
        is_init_component: component.is_init_component(),
        message: String::new(),
        reason: String::new(),
        replicas: snapshot.replicas,
        ready_replicas: snapshot.ready_replicas,
        pod_statuses: pods.iter().map(pod_diagnostics).collect(),
    };
    backfill(&mut view);
    debug!(component = %view.name, status = %view.status, "translated component status");
    Ok(view)
}

// A listing failure still yields a status, just without pods
async fn list_pods(
    reader: &dyn StatusReader,
    namespace: &str,
    component: &str,
    labels: &BTreeMap<String, String>,
) -> Vec<Pod> {
    if labels.is_empty() {
        warn!(component, "controller has no pod template labels, skipping pod listing");
        return Vec::new();
    }
    let selector = label_selector(labels);
    match reader.list_pods(namespace, &selector).await {
        Ok(pods) => pods,
        Err(e) => {
            warn!(component, selector = %selector, error = %e, "failed to list controller pods");
            Vec::new()
        }
    }
}

/// Diagnostics for one pod
pub fn pod_diagnostics(pod: &Pod) -> PodStatusView {
    let status = pod.status.clone().unwrap_or_default();
    let phase = if has_condition(status.conditions.as_deref(), "Ready") {
        PodPhase::Ready
    } else {
        PodPhase::NotReady
    };

    PodStatusView {
        name: pod.name_any(),
        phase,
        host_ip: status.host_ip.unwrap_or_default(),
        reason: status.reason.unwrap_or_default(),
        message: status.message.unwrap_or_default(),
        container_statuses: status
            .container_statuses
            .iter()
            .flatten()
            .map(container_diagnostics)
            .collect(),
    }
}

/// Diagnostics for one container
pub fn container_diagnostics(cs: &ContainerStatus) -> ContainerStatusView {
    let mut view = ContainerStatusView {
        image: cs.image.clone(),
        ready: cs.ready,
        container_id: cs
            .container_id
            .as_deref()
            .map(short_container_id)
            .unwrap_or_default(),
        state: None,
        reason: String::new(),
        message: String::new(),
    };

    if let Some(state) = &cs.state {
        if let Some(terminated) = &state.terminated {
            view.state = Some(ContainerState::Terminated);
            view.reason = terminated.reason.clone().unwrap_or_default();
            view.message = terminated.message.clone().unwrap_or_default();
        } else if let Some(waiting) = &state.waiting {
            view.state = Some(ContainerState::Waiting);
            view.reason = waiting.reason.clone().unwrap_or_default();
            view.message = waiting.message.clone().unwrap_or_default();
        } else if state.running.is_some() {
            view.state = Some(ContainerState::Running);
        }
    }
    view
}

/// Strip the `<runtime>://` prefix and keep at most 8 characters
pub fn short_container_id(id: &str) -> String {
    let id = id.split_once("://").map_or(id, |(_, rest)| rest);
    id.chars().take(CONTAINER_ID_LEN).collect()
}

/// Copy reason and message from the first non-running container of each
/// not-ready pod onto the pod, and from the first one overall onto the
/// component.
///
/// Container order carries no meaning, so the component-level values are a
/// hint rather than a root cause.
pub fn backfill(view: &mut ComponentStatusView) {
    let mut component_hint: Option<(String, String)> = None;

    for pod in view
        .pod_statuses
        .iter_mut()
        .filter(|p| p.phase == PodPhase::NotReady)
    {
        let Some(container) = pod.container_statuses.iter().find(|c| !c.is_running()) else {
            continue;
        };
        pod.reason = container.reason.clone();
        pod.message = container.message.clone();
        if component_hint.is_none() {
            component_hint = Some((container.reason.clone(), container.message.clone()));
        }
    }

    if let Some((reason, message)) = component_hint {
        view.reason = reason;
        view.message = message;
    }
}
