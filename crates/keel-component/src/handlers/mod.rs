//! Component handlers
//!
//! Every managed component has a handler driven through three steps per
//! reconciliation pass:
//!
//! 1. `before` checks preconditions and resolves dependencies. A
//!    [`StepError::Recoverable`](keel_common::StepError::Recoverable) result
//!    skips the pass.
//! 2. `resources` synthesizes the desired-state objects. It performs no
//!    cluster I/O and is deterministic in its inputs.
//! 3. `after` runs once the objects have been applied.

mod chaos;
pub mod common;
mod repo;

use async_trait::async_trait;

use keel_common::{Error, StepResult};

use crate::context::{PassContext, ResolvedPass};
use crate::desired::DesiredObject;
use crate::resolver::{ClusterReader, ResolvedDependencies};

pub use chaos::{ChaosHandler, CHAOS_NAME};
pub use repo::{RepoHandler, REPO_NAME};

/// The per-component handler protocol
#[async_trait]
pub trait ComponentHandler: Send + Sync {
    /// Precondition checks and dependency resolution
    async fn before(
        &self,
        pass: &PassContext,
        reader: &dyn ClusterReader,
    ) -> StepResult<ResolvedDependencies>;

    /// Desired-state objects for the component
    fn resources(&self, pass: &ResolvedPass) -> Result<Vec<DesiredObject>, Error>;

    /// Post-apply step
    async fn after(&self, _pass: &ResolvedPass, _reader: &dyn ClusterReader) -> Result<(), Error> {
        Ok(())
    }
}

/// The components this engine knows how to synthesize
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    /// Fault-injection daemon
    Chaos,
    /// Artifact repository
    Repo,
}

impl ComponentKind {
    /// Look up the kind by component name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            CHAOS_NAME => Some(ComponentKind::Chaos),
            REPO_NAME => Some(ComponentKind::Repo),
            _ => None,
        }
    }

    /// Handler for this kind
    pub fn handler(self) -> &'static dyn ComponentHandler {
        match self {
            ComponentKind::Chaos => &ChaosHandler,
            ComponentKind::Repo => &RepoHandler,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use keel_common::crd::{
        EtcdConfig, ImageHub, KeelCluster, KeelClusterSpec, KeelClusterStatus, KeelComponent,
        KeelComponentSpec, LogLevel,
    };

    use crate::context::PassContext;

    pub fn component(name: &str) -> KeelComponent {
        let mut component = KeelComponent::new(
            name,
            KeelComponentSpec {
                image: format!("keel.me/{}:v1", name),
                log_level: LogLevel::Debug,
                ..Default::default()
            },
        );
        component.metadata.namespace = Some("keel-system".to_string());
        component
    }

    pub fn cluster(tls: bool) -> KeelCluster {
        let mut cluster = KeelCluster::new(
            "keel-cluster",
            KeelClusterSpec {
                gateway_ingress_ips: vec!["10.0.0.10".to_string()],
                image_hub: Some(ImageHub {
                    domain: "keel.me".to_string(),
                    ..Default::default()
                }),
                etcd_config: tls.then(|| EtcdConfig {
                    endpoints: vec![
                        "https://10.0.0.2:2379".to_string(),
                        "https://10.0.0.3:2379".to_string(),
                    ],
                    secret_name: Some("etcd-tls".to_string()),
                }),
                ..Default::default()
            },
        );
        cluster.status = Some(KeelClusterStatus {
            master_role_label: Some("node-role.kubernetes.io/master".to_string()),
        });
        cluster
    }

    pub fn pass(name: &str, tls: bool) -> PassContext {
        PassContext::new(
            Arc::new(component(name)),
            Arc::new(cluster(tls)),
            "keel-system",
            tracing::Span::none(),
        )
    }
}
