//! Component status as reported to the Status API

use std::fmt;

use serde::{Deserialize, Serialize};

/// Message shown to users when a component's status cannot be computed
pub const SYSTEM_ERROR_MESSAGE: &str = "System error, please contact the community for help";

/// Normalized lifecycle of a component
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentLifecycle {
    /// No controller recorded yet
    Initing,
    /// Controller exists but not all replicas are ready
    Creating,
    /// All desired replicas are ready
    Running,
    /// Status could not be computed
    Failed,
}

impl ComponentLifecycle {
    /// All states, for per-state aggregation
    pub const ALL: [ComponentLifecycle; 4] = [
        ComponentLifecycle::Initing,
        ComponentLifecycle::Creating,
        ComponentLifecycle::Running,
        ComponentLifecycle::Failed,
    ];

    /// `Running` iff `replicas == ready_replicas && replicas > 0`
    pub fn from_replicas(replicas: i32, ready_replicas: i32) -> Self {
        if replicas > 0 && replicas == ready_replicas {
            ComponentLifecycle::Running
        } else {
            ComponentLifecycle::Creating
        }
    }

    /// Label value
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentLifecycle::Initing => "Initing",
            ComponentLifecycle::Creating => "Creating",
            ComponentLifecycle::Running => "Running",
            ComponentLifecycle::Failed => "Failed",
        }
    }
}

impl fmt::Display for ComponentLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one component
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatusView {
    /// Component name
    pub name: String,
    /// Lifecycle state
    pub status: ComponentLifecycle,
    /// Whether this is a priority (init) component
    pub is_init_component: bool,
    /// User-facing message
    #[serde(default)]
    pub message: String,
    /// Detailed machine reason
    #[serde(default)]
    pub reason: String,
    /// Desired replicas
    pub replicas: i32,
    /// Ready replicas
    pub ready_replicas: i32,
    /// Per-pod diagnostics
    #[serde(default)]
    pub pod_statuses: Vec<PodStatusView>,
}

impl ComponentStatusView {
    /// A component whose controller has not been recorded yet
    pub fn initing(name: impl Into<String>, is_init_component: bool) -> Self {
        Self {
            name: name.into(),
            status: ComponentLifecycle::Initing,
            is_init_component,
            message: String::new(),
            reason: String::new(),
            replicas: 0,
            ready_replicas: 0,
            pod_statuses: Vec::new(),
        }
    }

    /// A component whose status could not be computed
    pub fn failed(name: impl Into<String>, is_init_component: bool, reason: String) -> Self {
        Self {
            status: ComponentLifecycle::Failed,
            message: SYSTEM_ERROR_MESSAGE.to_string(),
            reason,
            ..Self::initing(name, is_init_component)
        }
    }
}

/// Pod readiness
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    /// The pod's Ready condition is true
    Ready,
    /// Anything else
    NotReady,
}

/// Diagnostics for one pod
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatusView {
    /// Pod name
    pub name: String,
    /// Readiness
    pub phase: PodPhase,
    /// Node address
    #[serde(rename = "hostIP", default)]
    pub host_ip: String,
    /// Reason, backfilled from a non-running container when not ready
    #[serde(default)]
    pub reason: String,
    /// Message, backfilled from a non-running container when not ready
    #[serde(default)]
    pub message: String,
    /// Per-container diagnostics
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatusView>,
}

/// Runtime state of a container
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    /// Running
    Running,
    /// Waiting to start
    Waiting,
    /// Exited
    Terminated,
}

/// Diagnostics for one container
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatusView {
    /// Image
    pub image: String,
    /// Readiness
    pub ready: bool,
    /// Truncated runtime identifier
    #[serde(rename = "containerID", default)]
    pub container_id: String,
    /// Runtime state, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ContainerState>,
    /// State reason
    #[serde(default)]
    pub reason: String,
    /// State message
    #[serde(default)]
    pub message: String,
}

impl ContainerStatusView {
    /// Whether the container is in the running state
    pub fn is_running(&self) -> bool {
        self.state == Some(ContainerState::Running)
    }
}
