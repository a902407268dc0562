//! Building blocks shared by the component synthesizers

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    HostAlias, HostPathVolumeSource, PersistentVolumeClaimVolumeSource, SecretVolumeSource,
    Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use keel_common::crd::KeelCluster;

use crate::resolver::DiscoveryTls;

/// Directory the discovery TLS secret is mounted at
pub const ETCD_SSL_PATH: &str = "/run/ssl/etcd";
/// Volume name of the discovery TLS secret
pub const ETCD_SSL_VOLUME: &str = "etcdssl";
/// Shared platform data claim
pub const GRDATA_PVC: &str = "keel-cpt-grdata";
/// Build cache claim
pub const CACHE_PVC: &str = "keel-chaos-cache";

/// Metadata for an object owned by a component
pub fn object_meta(name: &str, namespace: &str, labels: &BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels.clone()),
        ..Default::default()
    }
}

/// Selector matching exactly the component labels
pub fn label_selector(labels: &BTreeMap<String, String>) -> LabelSelector {
    LabelSelector {
        match_labels: Some(labels.clone()),
        ..Default::default()
    }
}

/// Volume and mount exposing the discovery TLS files
pub fn etcd_ssl_volume(tls: &DiscoveryTls) -> (Volume, VolumeMount) {
    let volume = Volume {
        name: ETCD_SSL_VOLUME.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(tls.secret_name.clone()),
            ..Default::default()
        }),
        ..Default::default()
    };
    let mount = VolumeMount {
        name: ETCD_SSL_VOLUME.to_string(),
        mount_path: ETCD_SSL_PATH.to_string(),
        ..Default::default()
    };
    (volume, mount)
}

/// CA, certificate and key arguments pointing into the mounted secret
pub fn etcd_ssl_args() -> Vec<String> {
    vec![
        format!("--etcd-ca={}/ca-file", ETCD_SSL_PATH),
        format!("--etcd-cert={}/cert-file", ETCD_SSL_PATH),
        format!("--etcd-key={}/key-file", ETCD_SSL_PATH),
    ]
}

/// The discovery endpoint argument, emitted with or without TLS
pub fn etcd_endpoints_arg(cluster: &KeelCluster) -> String {
    format!("--etcd-endpoints={}", cluster.etcd_endpoints().join(","))
}

/// Tolerate the control-plane taint, and only that taint
pub fn control_plane_tolerations(cluster: &KeelCluster) -> Option<Vec<Toleration>> {
    cluster.master_role_label().map(|key| {
        vec![Toleration {
            key: Some(key.to_string()),
            effect: Some("NoSchedule".to_string()),
            ..Default::default()
        }]
    })
}

/// Resolve the image repository domain to the gateway address
pub fn image_repository_host_aliases(cluster: &KeelCluster) -> Option<Vec<HostAlias>> {
    cluster.gateway_ingress_ip().map(|ip| {
        vec![HostAlias {
            ip: ip.to_string(),
            hostnames: Some(vec![image_repository_host(cluster)]),
        }]
    })
}

// Host part of the repository reference; a namespace suffix is not a hostname
fn image_repository_host(cluster: &KeelCluster) -> String {
    let repo = cluster.image_repository();
    match repo.split_once('/') {
        Some((host, _)) => host.to_string(),
        None => repo,
    }
}

/// Volume backed by a persistent volume claim
pub fn pvc_volume(name: &str, claim: &str) -> Volume {
    Volume {
        name: name.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Volume backed by a node-local path
pub fn host_path_volume(name: &str, path: &str, type_: &str) -> Volume {
    Volume {
        name: name.to_string(),
        host_path: Some(HostPathVolumeSource {
            path: path.to_string(),
            type_: Some(type_.to_string()),
        }),
        ..Default::default()
    }
}

/// Mount of a named volume
pub fn volume_mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}
