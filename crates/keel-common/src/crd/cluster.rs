//! KeelCluster CRD: cluster-wide configuration of the managed platform
//!
//! A KeelCluster is owned by the cluster administrator and is read-only to
//! the component engine. It carries data-store overrides, the discovery
//! service (etcd) configuration, the gateway address and the image
//! repository source.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Discovery endpoint used when the cluster declares no etcd configuration
pub const DEFAULT_ETCD_ENDPOINT: &str = "http://keel-etcd:2379";

/// Image repository domain used when the cluster declares no image hub
pub const DEFAULT_IMAGE_REPOSITORY: &str = "keel.me";

/// Database name used when a data-store descriptor carries none
pub const DEFAULT_DATABASE_NAME: &str = "region";

/// KeelCluster defines the platform installation on this Kubernetes cluster.
///
/// Example:
/// ```yaml
/// apiVersion: keel.dev/v1alpha1
/// kind: KeelCluster
/// metadata:
///   name: keel-cluster
///   namespace: keel-system
/// spec:
///   gatewayIngressIPs: ["10.0.0.10"]
///   etcdConfig:
///     endpoints: ["https://10.0.0.2:2379"]
///     secretName: etcd-client-tls
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "keel.dev",
    version = "v1alpha1",
    kind = "KeelCluster",
    namespaced,
    status = "KeelClusterStatus",
    shortname = "kc",
    printcolumn = r#"{"name":"Gateway","type":"string","jsonPath":".spec.gatewayIngressIPs[0]"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KeelClusterSpec {
    /// Region data-store override; when set it always wins over the
    /// in-cluster data-store secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_database: Option<Database>,

    /// Console data-store override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_database: Option<Database>,

    /// Discovery service configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd_config: Option<EtcdConfig>,

    /// Gateway ingress addresses
    #[serde(
        default,
        rename = "gatewayIngressIPs",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub gateway_ingress_ips: Vec<String>,

    /// Image repository the platform pulls from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hub: Option<ImageHub>,
}

/// Data-store connection descriptor
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    /// Host name or address
    pub host: String,
    /// Port
    pub port: u16,
    /// User name
    #[serde(default)]
    pub username: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// Database name (defaults to "region")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Database {
    /// Database name, falling back to the region default
    pub fn database_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_DATABASE_NAME)
    }

    /// The whole descriptor serialized into a single invocation argument.
    pub fn data_source_arg(&self) -> String {
        format!(
            "--mysql={}:{}@tcp({}:{})/{}",
            self.username,
            self.password,
            self.host,
            self.port,
            self.database_name()
        )
    }
}

/// Discovery service (etcd) configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EtcdConfig {
    /// Endpoints in `scheme://host:port` form
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Secret holding `ca-file`, `cert-file` and `key-file`; TLS is used
    /// iff this is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

/// Image repository source
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageHub {
    /// Registry domain
    pub domain: String,
    /// Registry namespace (project)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Registry user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Registry password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// KeelCluster status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeelClusterStatus {
    /// Label key identifying control-plane nodes; also the taint key
    /// platform daemons tolerate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_role_label: Option<String>,
}

impl KeelCluster {
    /// Discovery endpoints, defaulting to the in-cluster etcd when none are
    /// configured
    pub fn etcd_endpoints(&self) -> Vec<String> {
        match &self.spec.etcd_config {
            Some(cfg) if !cfg.endpoints.is_empty() => cfg.endpoints.clone(),
            _ => vec![DEFAULT_ETCD_ENDPOINT.to_string()],
        }
    }

    /// Name of the discovery TLS secret, if TLS is configured
    pub fn etcd_secret_name(&self) -> Option<&str> {
        self.spec
            .etcd_config
            .as_ref()
            .and_then(|cfg| cfg.secret_name.as_deref())
            .filter(|name| !name.is_empty())
    }

    /// First gateway ingress address
    pub fn gateway_ingress_ip(&self) -> Option<&str> {
        self.spec
            .gateway_ingress_ips
            .first()
            .map(String::as_str)
            .filter(|ip| !ip.is_empty())
    }

    /// Domain the platform pulls images from
    pub fn image_repository(&self) -> String {
        match &self.spec.image_hub {
            Some(hub) if !hub.domain.is_empty() => match hub.namespace.as_deref() {
                Some(ns) if !ns.is_empty() => format!("{}/{}", hub.domain, ns),
                _ => hub.domain.clone(),
            },
            _ => DEFAULT_IMAGE_REPOSITORY.to_string(),
        }
    }

    /// Control-plane role label key, if observed
    pub fn master_role_label(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.master_role_label.as_deref())
            .filter(|label| !label.is_empty())
    }

    /// Node selector restricting placement to control-plane nodes
    pub fn control_plane_node_selector(&self) -> Option<BTreeMap<String, String>> {
        self.master_role_label()
            .map(|label| BTreeMap::from([(label.to_string(), String::new())]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> KeelCluster {
        serde_yaml::from_str(yaml).expect("cluster yaml should parse")
    }

    #[test]
    fn full_cluster_yaml() {
        let cluster = parse(
            r#"
apiVersion: keel.dev/v1alpha1
kind: KeelCluster
metadata:
  name: keel-cluster
  namespace: keel-system
spec:
  regionDatabase:
    host: mysql.example.com
    port: 3306
    username: admin
    password: s3cret
  etcdConfig:
    endpoints: ["https://10.0.0.2:2379", "https://10.0.0.3:2379"]
    secretName: etcd-client-tls
  gatewayIngressIPs: ["10.0.0.10", "10.0.0.11"]
  imageHub:
    domain: registry.example.com
    namespace: platform
status:
  masterRoleLabel: node-role.kubernetes.io/master
"#,
        );

        let db = cluster.spec.region_database.as_ref().expect("override set");
        assert_eq!(db.host, "mysql.example.com");
        assert_eq!(
            cluster.etcd_endpoints(),
            vec!["https://10.0.0.2:2379", "https://10.0.0.3:2379"]
        );
        assert_eq!(cluster.etcd_secret_name(), Some("etcd-client-tls"));
        assert_eq!(cluster.gateway_ingress_ip(), Some("10.0.0.10"));
        assert_eq!(cluster.image_repository(), "registry.example.com/platform");
        assert_eq!(
            cluster.control_plane_node_selector(),
            Some(BTreeMap::from([(
                "node-role.kubernetes.io/master".to_string(),
                String::new()
            )]))
        );
    }

    #[test]
    fn minimal_cluster_uses_defaults() {
        let cluster = parse(
            r#"
apiVersion: keel.dev/v1alpha1
kind: KeelCluster
metadata:
  name: keel-cluster
spec: {}
"#,
        );

        assert_eq!(cluster.etcd_endpoints(), vec![DEFAULT_ETCD_ENDPOINT]);
        assert_eq!(cluster.etcd_secret_name(), None);
        assert_eq!(cluster.gateway_ingress_ip(), None);
        assert_eq!(cluster.image_repository(), DEFAULT_IMAGE_REPOSITORY);
        assert_eq!(cluster.control_plane_node_selector(), None);
    }

    #[test]
    fn empty_secret_name_means_plaintext() {
        let mut cluster = KeelCluster::new("c", KeelClusterSpec::default());
        cluster.spec.etcd_config = Some(EtcdConfig {
            endpoints: vec!["http://etcd:2379".to_string()],
            secret_name: Some(String::new()),
        });
        assert_eq!(cluster.etcd_secret_name(), None);
        assert_eq!(cluster.etcd_endpoints(), vec!["http://etcd:2379"]);
    }

    #[test]
    fn tls_without_endpoints_falls_back_to_default_endpoint() {
        let cluster = parse(
            r#"
apiVersion: keel.dev/v1alpha1
kind: KeelCluster
metadata:
  name: keel-cluster
spec:
  etcdConfig:
    secretName: etcd-tls
"#,
        );

        assert_eq!(cluster.etcd_endpoints(), vec![DEFAULT_ETCD_ENDPOINT]);
        assert_eq!(cluster.etcd_secret_name(), Some("etcd-tls"));
    }

    #[test]
    fn data_source_is_one_argument() {
        let db = Database {
            host: "keel-db".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: "pw".to_string(),
            name: None,
        };
        assert_eq!(db.data_source_arg(), "--mysql=root:pw@tcp(keel-db:3306)/region");

        let db = Database {
            name: Some("console".to_string()),
            ..db
        };
        assert!(db.data_source_arg().ends_with("/console"));
    }
}
