//! Component status service consumed by the Status API

use std::collections::HashMap;
use std::sync::Arc;

use kube::{Client, ResourceExt};
use tracing::{error, info};

use keel_common::crd::KeelComponent;
use keel_common::metrics::set_components_by_status;
use keel_common::{Error, PRIORITY_COMPONENT_SELECTOR};

use crate::reader::{KubeStatusReader, StatusReader};
use crate::translate::translate;
use crate::view::{ComponentLifecycle, ComponentStatusView};

/// Component whose status is skipped when the cluster already provides it
pub const METRICS_SERVER_NAME: &str = "metrics-server";
/// Annotation marking an existing metrics API
pub const METRICS_API_EXISTS_ANNOTATION: &str = "v1beta1.metrics.k8s.io.exists";

/// Status queries over the components of one namespace
pub struct ComponentStatusService {
    reader: Arc<dyn StatusReader>,
    namespace: String,
}

impl ComponentStatusService {
    /// Create a service over explicit reads
    pub fn new(reader: Arc<dyn StatusReader>, namespace: impl Into<String>) -> Self {
        Self {
            reader,
            namespace: namespace.into(),
        }
    }

    /// Create a service backed by the Kubernetes API
    pub fn from_client(client: Client, namespace: impl Into<String>) -> Self {
        Self::new(Arc::new(KubeStatusReader::new(client)), namespace)
    }

    /// Status of one component
    pub async fn get(&self, name: &str) -> Result<ComponentStatusView, Error> {
        let component = self.reader.get_component(&self.namespace, name).await?;
        if !has_controller(&component) {
            return Ok(ComponentStatusView::initing(
                component.name_any(),
                component.is_init_component(),
            ));
        }
        translate(self.reader.as_ref(), &component).await
    }

    /// Status of every component, or of the priority components only.
    ///
    /// A component whose translation fails is reported `Failed`; the rest of
    /// the listing is unaffected.
    pub async fn list(&self, is_init: bool) -> Result<Vec<ComponentStatusView>, Error> {
        let selector = if is_init {
            PRIORITY_COMPONENT_SELECTOR
        } else {
            ""
        };
        info!(namespace = %self.namespace, is_init, "listing component statuses");
        let components = self
            .reader
            .list_components(&self.namespace, selector)
            .await
            .inspect_err(|e| error!(error = %e, "failed to list components"))?;

        let mut statuses = Vec::with_capacity(components.len());
        for component in &components {
            if metrics_api_provided(component) {
                continue;
            }
            statuses.push(self.status_or_failed(component).await);
        }

        if !is_init {
            record_status_counts(&statuses);
        }
        Ok(statuses)
    }

    /// Whether every priority component is running
    pub async fn init_components_running(&self) -> Result<bool, Error> {
        let statuses = self.list(true).await?;
        Ok(statuses
            .iter()
            .all(|s| s.status == ComponentLifecycle::Running))
    }

    async fn status_or_failed(&self, component: &KeelComponent) -> ComponentStatusView {
        let name = component.name_any();
        if !has_controller(component) {
            return ComponentStatusView::initing(name, component.is_init_component());
        }
        match translate(self.reader.as_ref(), component).await {
            Ok(view) => view,
            Err(e) => {
                error!(component = %name, error = %e, "failed to get component status");
                ComponentStatusView::failed(
                    name.clone(),
                    component.is_init_component(),
                    format!("get component {} status error: {}", name, e),
                )
            }
        }
    }
}

// No status or no controller name yet: the driver has not applied anything
fn has_controller(component: &KeelComponent) -> bool {
    component
        .status
        .as_ref()
        .is_some_and(|s| !s.controller_name.is_empty())
}

fn metrics_api_provided(component: &KeelComponent) -> bool {
    component.name_any() == METRICS_SERVER_NAME
        && component
            .annotations()
            .get(METRICS_API_EXISTS_ANNOTATION)
            .is_some_and(|v| v == "true")
}

fn record_status_counts(statuses: &[ComponentStatusView]) {
    let mut counts: HashMap<ComponentLifecycle, i64> = HashMap::new();
    for status in statuses {
        *counts.entry(status.status).or_default() += 1;
    }
    for lifecycle in ComponentLifecycle::ALL {
        set_components_by_status(lifecycle.as_str(), counts.get(&lifecycle).copied().unwrap_or(0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MockStatusReader;
    use crate::view::SYSTEM_ERROR_MESSAGE;
    use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec, DaemonSetStatus};
    use k8s_openapi::api::core::v1::PodTemplateSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use keel_common::crd::{ControllerType, KeelComponentSpec, KeelComponentStatus};
    use std::collections::BTreeMap;

    fn component(name: &str, controller_type: Option<ControllerType>) -> KeelComponent {
        let mut component = KeelComponent::new(
            name,
            KeelComponentSpec {
                image: "img:1".to_string(),
                priority_component: true,
                ..Default::default()
            },
        );
        component.metadata.namespace = Some("keel-system".to_string());
        component.status = controller_type.map(|controller_type| KeelComponentStatus {
            controller_type,
            controller_name: name.to_string(),
        });
        component
    }

    fn ready_daemon_set() -> DaemonSet {
        DaemonSet {
            spec: Some(DaemonSetSpec {
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(BTreeMap::from([(
                            "name".to_string(),
                            "keel-repo".to_string(),
                        )])),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            status: Some(DaemonSetStatus {
                desired_number_scheduled: 1,
                number_available: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn service(reader: MockStatusReader) -> ComponentStatusService {
        ComponentStatusService::new(Arc::new(reader), "keel-system")
    }

    /// Story: one component with an unknown controller type is reported
    /// Failed while its siblings are still reported normally
    #[tokio::test]
    async fn story_unsupported_controller_does_not_block_siblings() {
        let mut reader = MockStatusReader::new();
        reader.expect_list_components().returning(|_, _| {
            Ok(vec![
                component("keel-chaos", Some(ControllerType::Unknown("cronjob".to_string()))),
                component("keel-repo", Some(ControllerType::DaemonSet)),
                component("keel-api", None),
            ])
        });
        reader
            .expect_get_daemon_set()
            .returning(|_, _| Ok(ready_daemon_set()));
        reader.expect_list_pods().returning(|_, _| Ok(vec![]));

        let statuses = service(reader).list(false).await.expect("lists");
        assert_eq!(statuses.len(), 3);

        let chaos = &statuses[0];
        assert_eq!(chaos.status, ComponentLifecycle::Failed);
        assert_eq!(chaos.message, SYSTEM_ERROR_MESSAGE);
        assert!(chaos
            .reason
            .starts_with("get component keel-chaos status error:"));
        assert!(chaos.reason.contains("cronjob"));
        assert!(chaos.is_init_component);

        assert_eq!(statuses[1].status, ComponentLifecycle::Running);
        assert_eq!(statuses[2].status, ComponentLifecycle::Initing);
    }

    #[tokio::test]
    async fn init_listing_uses_priority_selector() {
        let mut reader = MockStatusReader::new();
        reader
            .expect_list_components()
            .withf(|ns, selector| ns == "keel-system" && selector == "priorityComponent=true")
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let statuses = service(reader).list(true).await.expect("lists");
        assert!(statuses.is_empty());
    }

    #[tokio::test]
    async fn metrics_server_is_skipped_when_api_exists() {
        let mut reader = MockStatusReader::new();
        reader.expect_list_components().returning(|_, _| {
            let mut provided = component(METRICS_SERVER_NAME, None);
            provided.annotations_mut().insert(
                METRICS_API_EXISTS_ANNOTATION.to_string(),
                "true".to_string(),
            );
            Ok(vec![provided, component("keel-repo", None)])
        });

        let statuses = service(reader).list(false).await.expect("lists");
        let names: Vec<_> = statuses.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["keel-repo"]);
    }

    #[tokio::test]
    async fn list_failure_is_an_error() {
        let mut reader = MockStatusReader::new();
        reader
            .expect_list_components()
            .returning(|_, _| Err(Error::internal("forbidden")));
        assert!(service(reader).list(false).await.is_err());
    }

    #[tokio::test]
    async fn get_translates_one_component() {
        let mut reader = MockStatusReader::new();
        reader
            .expect_get_component()
            .withf(|_, name| name == "keel-repo")
            .returning(|_, name| Ok(component(name, Some(ControllerType::DaemonSet))));
        reader
            .expect_get_daemon_set()
            .returning(|_, _| Ok(ready_daemon_set()));
        reader.expect_list_pods().returning(|_, _| Ok(vec![]));

        let view = service(reader).get("keel-repo").await.expect("gets");
        assert_eq!(view.status, ComponentLifecycle::Running);
        assert_eq!(view.replicas, 1);
    }

    #[tokio::test]
    async fn get_propagates_unsupported_controller() {
        let mut reader = MockStatusReader::new();
        reader.expect_get_component().returning(|_, name| {
            Ok(component(name, Some(ControllerType::Unknown("job".to_string()))))
        });

        let err = service(reader).get("keel-chaos").await.expect_err("unsupported");
        assert!(matches!(err, Error::UnsupportedController { .. }));
    }

    #[tokio::test]
    async fn init_gate_requires_all_priority_components_running() {
        let mut reader = MockStatusReader::new();
        reader.expect_list_components().returning(|_, _| {
            Ok(vec![
                component("keel-repo", Some(ControllerType::DaemonSet)),
                component("keel-chaos", None),
            ])
        });
        reader
            .expect_get_daemon_set()
            .returning(|_, _| Ok(ready_daemon_set()));
        reader.expect_list_pods().returning(|_, _| Ok(vec![]));

        assert!(!service(reader)
            .init_components_running()
            .await
            .expect("checks"));
    }
}
