//! Artifact repository: a per-node controller with node-local storage plus
//! a Service in front of it.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    Container, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use keel_common::{Error, StepResult};

use super::common::{
    control_plane_tolerations, host_path_volume, label_selector, object_meta, volume_mount,
};
use super::ComponentHandler;
use crate::context::{PassContext, ResolvedPass};
use crate::desired::DesiredObject;
use crate::resolver::{ClusterReader, ResolvedDependencies};

/// Component name of the artifact repository
pub const REPO_NAME: &str = "keel-repo";

const DATA_HOST_PATH: &str = "/opt/keel/data/repo";
const DATA_MOUNT_PATH: &str = "/var/opt/jfrog/artifactory";

/// Handler for the artifact repository
pub struct RepoHandler;

#[async_trait]
impl ComponentHandler for RepoHandler {
    async fn before(
        &self,
        _pass: &PassContext,
        _reader: &dyn ClusterReader,
    ) -> StepResult<ResolvedDependencies> {
        Ok(ResolvedDependencies::default())
    }

    fn resources(&self, pass: &ResolvedPass) -> Result<Vec<DesiredObject>, Error> {
        Ok(vec![
            DesiredObject::DaemonSet(Box::new(daemon_set(pass))),
            DesiredObject::Service(Box::new(service(pass))),
        ])
    }
}

fn daemon_set(pass: &ResolvedPass) -> DaemonSet {
    let component = &pass.component;
    DaemonSet {
        metadata: object_meta(REPO_NAME, &pass.namespace, &pass.labels),
        spec: Some(DaemonSetSpec {
            selector: label_selector(&pass.labels),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(REPO_NAME.to_string()),
                    labels: Some(pass.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    termination_grace_period_seconds: Some(0),
                    tolerations: control_plane_tolerations(&pass.cluster),
                    node_selector: pass.cluster.control_plane_node_selector(),
                    containers: vec![Container {
                        name: REPO_NAME.to_string(),
                        image: Some(component.spec.image.clone()),
                        image_pull_policy: Some(
                            component.spec.image_pull_policy.as_str().to_string(),
                        ),
                        volume_mounts: Some(vec![volume_mount("repo-data", DATA_MOUNT_PATH)]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![host_path_volume(
                        "repo-data",
                        DATA_HOST_PATH,
                        "DirectoryOrCreate",
                    )]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn service(pass: &ResolvedPass) -> Service {
    Service {
        metadata: object_meta(REPO_NAME, &pass.namespace, &pass.labels),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: 80,
                ..Default::default()
            }]),
            selector: Some(pass.labels.clone()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::fixtures;
    use crate::resolver::MockClusterReader;

    fn synthesize() -> Vec<DesiredObject> {
        let pass = fixtures::pass(REPO_NAME, false).resolved(ResolvedDependencies::default());
        RepoHandler.resources(&pass).expect("synthesizes")
    }

    #[test]
    fn daemon_set_and_service() {
        let objects = synthesize();
        let kinds: Vec<_> = objects.iter().map(DesiredObject::kind).collect();
        assert_eq!(kinds, vec!["DaemonSet", "Service"]);
        assert!(objects.iter().all(|o| o.name() == REPO_NAME));
    }

    #[test]
    fn data_lives_on_the_node() {
        let objects = synthesize();
        let Some(DesiredObject::DaemonSet(ds)) = objects.first() else {
            panic!("expected a DaemonSet first");
        };
        let spec = ds
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .expect("pod spec");
        let volume = &spec.volumes.as_ref().expect("volumes")[0];
        let host_path = volume.host_path.as_ref().expect("host path");
        assert_eq!(host_path.path, "/opt/keel/data/repo");
        assert_eq!(host_path.type_.as_deref(), Some("DirectoryOrCreate"));
        assert_eq!(
            spec.containers[0].volume_mounts.as_ref().expect("mounts")[0].mount_path,
            "/var/opt/jfrog/artifactory"
        );
        assert_eq!(spec.termination_grace_period_seconds, Some(0));
    }

    #[test]
    fn service_exposes_http_and_selects_pods() {
        let objects = synthesize();
        let Some(DesiredObject::Service(svc)) = objects.get(1) else {
            panic!("expected a Service second");
        };
        let spec = svc.spec.as_ref().expect("spec");
        let port = &spec.ports.as_ref().expect("ports")[0];
        assert_eq!(port.port, 80);
        assert_eq!(port.name.as_deref(), Some("http"));
        assert_eq!(
            spec.selector.as_ref().and_then(|s| s.get("belongTo")).map(String::as_str),
            Some("keel-operator")
        );
    }

    #[test]
    fn synthesis_is_deterministic() {
        assert_eq!(synthesize(), synthesize());
    }

    #[tokio::test]
    async fn before_reads_nothing() {
        let reader = MockClusterReader::new();
        let deps = RepoHandler
            .before(&fixtures::pass(REPO_NAME, false), &reader)
            .await
            .expect("no dependencies");
        assert_eq!(deps, ResolvedDependencies::default());
    }
}
