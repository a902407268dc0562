//! Common types for Keel: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod kube_utils;
pub mod metrics;
pub mod telemetry;

pub use error::{Error, NotReady, StepError, StepResult};
pub use events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace the operator and the platform components run in by default
pub const KEEL_SYSTEM_NAMESPACE: &str = "keel-system";

/// Name of the operator, used as service account and `belongTo` label value
pub const KEEL_OPERATOR_NAME: &str = "keel-operator";

/// Label key carrying the component name on every synthesized object
pub const LABEL_NAME: &str = "name";

/// Label key marking objects owned by the operator
pub const LABEL_BELONG_TO: &str = "belongTo";

/// Label key marking priority (init) components
pub const LABEL_PRIORITY_COMPONENT: &str = "priorityComponent";

/// Label selector for priority (init) components
pub const PRIORITY_COMPONENT_SELECTOR: &str = "priorityComponent=true";

/// Requeue interval after a successful reconciliation pass
pub const REQUEUE_SUCCESS_SECS: u64 = 60;

/// Requeue interval after a retryable error
pub const REQUEUE_ERROR_SECS: u64 = 30;

/// Base requeue interval when a dependency is not ready yet
pub const REQUEUE_NOT_READY_SECS: u64 = 10;
