//! Fault-injection (chaos) daemon
//!
//! Runs on every control-plane node with access to the node's container
//! runtime socket. Needs the region data store and the discovery service.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, ObjectFieldSelector, PodSpec, PodTemplateSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::debug;

use keel_common::{Error, StepResult, KEEL_OPERATOR_NAME};

use super::common::{
    control_plane_tolerations, etcd_endpoints_arg, etcd_ssl_args, etcd_ssl_volume,
    host_path_volume, image_repository_host_aliases, label_selector, object_meta, pvc_volume,
    volume_mount, CACHE_PVC, GRDATA_PVC,
};
use super::ComponentHandler;
use crate::context::{PassContext, ResolvedPass};
use crate::desired::DesiredObject;
use crate::resolver::{
    is_database_reachable, resolve_data_store, resolve_discovery_secret, ClusterReader,
    ResolvedDependencies, DB_NAME,
};

/// Component name of the chaos daemon
pub const CHAOS_NAME: &str = "keel-chaos";

const DOCKER_SOCK: &str = "/var/run/docker.sock";

/// Handler for the chaos daemon
pub struct ChaosHandler;

#[async_trait]
impl ComponentHandler for ChaosHandler {
    async fn before(
        &self,
        pass: &PassContext,
        reader: &dyn ClusterReader,
    ) -> StepResult<ResolvedDependencies> {
        let override_db = pass.cluster.spec.region_database.as_ref();
        let region_db = resolve_data_store(reader, override_db, &pass.namespace, DB_NAME).await?;
        is_database_reachable(reader, &pass.cluster, &pass.namespace).await?;

        let discovery_tls = resolve_discovery_secret(reader, &pass.cluster, &pass.namespace).await?;
        debug!(
            parent: &pass.span,
            db_host = %region_db.host,
            tls = discovery_tls.is_some(),
            "resolved chaos dependencies"
        );

        Ok(ResolvedDependencies {
            region_db: Some(region_db),
            discovery_tls,
        })
    }

    fn resources(&self, pass: &ResolvedPass) -> Result<Vec<DesiredObject>, Error> {
        Ok(vec![DesiredObject::DaemonSet(Box::new(daemon_set(pass)?))])
    }
}

fn daemon_set(pass: &ResolvedPass) -> Result<DaemonSet, Error> {
    let db = pass.deps().region_db.as_ref().ok_or_else(|| {
        Error::internal_with_context("chaos", "region database was not resolved")
    })?;
    let component = &pass.component;

    let mut volume_mounts = vec![
        volume_mount("grdata", "/grdata"),
        volume_mount("dockersock", DOCKER_SOCK),
        volume_mount("cache", "/cache"),
    ];
    let mut volumes = vec![
        pvc_volume("grdata", GRDATA_PVC),
        host_path_volume("dockersock", DOCKER_SOCK, "File"),
        pvc_volume("cache", CACHE_PVC),
    ];
    let mut args = vec![
        "--hostIP=$(POD_IP)".to_string(),
        format!("--log-level={}", component.spec.log_level.as_str()),
        db.data_source_arg(),
        etcd_endpoints_arg(&pass.cluster),
    ];

    if let Some(tls) = &pass.deps().discovery_tls {
        let (volume, mount) = etcd_ssl_volume(tls);
        volumes.push(volume);
        volume_mounts.push(mount);
        args.extend(etcd_ssl_args());
    }

    let container = Container {
        name: CHAOS_NAME.to_string(),
        image: Some(component.spec.image.clone()),
        image_pull_policy: Some(component.spec.image_pull_policy.as_str().to_string()),
        env: Some(vec![
            EnvVar {
                name: "POD_IP".to_string(),
                value_from: Some(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        field_path: "status.podIP".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            EnvVar {
                name: "SOURCE_DIR".to_string(),
                value: Some("/cache/source".to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "CACHE_DIR".to_string(),
                value: Some("/cache".to_string()),
                ..Default::default()
            },
        ]),
        args: Some(args),
        volume_mounts: Some(volume_mounts),
        ..Default::default()
    };

    Ok(DaemonSet {
        metadata: object_meta(CHAOS_NAME, &pass.namespace, &pass.labels),
        spec: Some(DaemonSetSpec {
            selector: label_selector(&pass.labels),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(CHAOS_NAME.to_string()),
                    labels: Some(pass.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    termination_grace_period_seconds: Some(0),
                    node_selector: pass.cluster.control_plane_node_selector(),
                    tolerations: control_plane_tolerations(&pass.cluster),
                    service_account_name: Some(KEEL_OPERATOR_NAME.to_string()),
                    host_aliases: image_repository_host_aliases(&pass.cluster),
                    containers: vec![container],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}
