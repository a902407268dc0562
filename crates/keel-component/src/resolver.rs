//! Dependency resolution for component handlers
//!
//! Locates the shared infrastructure several components need: the region
//! data-store descriptor, the discovery-service TLS secret and the in-cluster
//! data-store endpoints. A dependency that does not exist yet is reported as
//! [`StepError::Recoverable`]; any other read failure is fatal.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, Secret};
use kube::api::{Api, ListParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use keel_common::crd::{Database, KeelCluster};
use keel_common::kube_utils::label_selector;
use keel_common::{
    Error, StepError, StepResult, KEEL_OPERATOR_NAME, LABEL_BELONG_TO, LABEL_NAME,
};

/// Name of the in-cluster data store: service, secret and `name` label
pub const DB_NAME: &str = "keel-db";
/// Port of the in-cluster data store
pub const DB_PORT: u16 = 3306;
/// Secret key holding the data-store user
pub const MYSQL_USER_KEY: &str = "mysql-user";
/// Secret key holding the data-store password
pub const MYSQL_PASSWORD_KEY: &str = "mysql-password";

/// Read access to the cluster state the resolver depends on
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// Get a secret, `None` if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// List endpoints matching a label selector
    async fn list_endpoints(&self, namespace: &str, selector: &str)
        -> Result<Vec<Endpoints>, Error>;

    /// Get the cluster specification, `None` if it does not exist
    async fn get_cluster(&self, namespace: &str, name: &str)
        -> Result<Option<KeelCluster>, Error>;
}

/// [`ClusterReader`] backed by the Kubernetes API
pub struct KubeClusterReader {
    client: Client,
}

impl KubeClusterReader {
    /// Create a reader wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterReader for KubeClusterReader {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_endpoints(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Endpoints>, Error> {
        let api: Api<Endpoints> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default().labels(selector)).await?;
        Ok(list.items)
    }

    async fn get_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<KeelCluster>, Error> {
        let api: Api<KeelCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}

/// Discovery-service TLS material, referenced by secret name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryTls {
    /// Secret holding `ca-file`, `cert-file` and `key-file`
    pub secret_name: String,
}

/// Dependencies resolved by a handler's `before` step
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedDependencies {
    /// Region data-store descriptor
    pub region_db: Option<Database>,
    /// Discovery TLS material; `None` means plaintext discovery
    pub discovery_tls: Option<DiscoveryTls>,
}

/// Resolve the data-store descriptor.
///
/// An explicit override is returned verbatim without touching the cluster.
/// Otherwise the well-known secret `secret_name` provides the credentials and
/// the in-cluster data store provides host and port.
pub async fn resolve_data_store(
    reader: &dyn ClusterReader,
    override_db: Option<&Database>,
    namespace: &str,
    secret_name: &str,
) -> StepResult<Database> {
    if let Some(db) = override_db {
        return Ok(db.clone());
    }

    let secret = match reader.get_secret(namespace, secret_name).await {
        Ok(Some(secret)) => secret,
        Ok(None) => {
            return Err(StepError::not_ready(
                format!("secret {}/{}", namespace, secret_name),
                "data-store secret not found",
            ))
        }
        Err(e) => {
            return Err(Error::dependency(
                format!("secret {}/{}", namespace, secret_name),
                e.to_string(),
            )
            .into())
        }
    };

    Ok(Database {
        host: DB_NAME.to_string(),
        port: DB_PORT,
        username: secret_value(&secret, MYSQL_USER_KEY),
        password: secret_value(&secret, MYSQL_PASSWORD_KEY),
        name: None,
    })
}

/// Resolve the discovery TLS secret.
///
/// No TLS configuration means plaintext discovery. A configured secret that
/// does not exist yet is not-ready; any other read failure is fatal. Neither
/// case falls back to plaintext.
pub async fn resolve_discovery_secret(
    reader: &dyn ClusterReader,
    cluster: &KeelCluster,
    namespace: &str,
) -> StepResult<Option<DiscoveryTls>> {
    let Some(secret_name) = cluster.etcd_secret_name() else {
        return Ok(None);
    };

    match reader.get_secret(namespace, secret_name).await {
        Ok(Some(_)) => Ok(Some(DiscoveryTls {
            secret_name: secret_name.to_string(),
        })),
        Ok(None) => Err(StepError::not_ready(
            format!("secret {}/{}", namespace, secret_name),
            "discovery TLS secret not found",
        )),
        Err(e) => Err(Error::dependency(
            format!("secret {}/{}", namespace, secret_name),
            format!("failed to read discovery TLS secret: {}", e),
        )
        .into()),
    }
}

/// Check that the in-cluster data store has at least one ready address.
///
/// Always succeeds when the cluster points the console at an external data
/// store.
pub async fn is_database_reachable(
    reader: &dyn ClusterReader,
    cluster: &KeelCluster,
    namespace: &str,
) -> StepResult<()> {
    if cluster.spec.ui_database.is_some() {
        return Ok(());
    }

    let selector = label_selector(&db_labels());
    let endpoints = reader
        .list_endpoints(namespace, &selector)
        .await
        .map_err(|e| Error::dependency(format!("endpoints {}", selector), e.to_string()))?;

    let ready = endpoints.iter().any(|ep| {
        ep.subsets.iter().flatten().any(|subset| {
            subset
                .addresses
                .as_ref()
                .is_some_and(|addrs| !addrs.is_empty())
        })
    });

    if ready {
        Ok(())
    } else {
        Err(StepError::not_ready(
            format!("endpoints {}", selector),
            "no ready endpoints for the data store",
        ))
    }
}

fn db_labels() -> std::collections::BTreeMap<String, String> {
    [
        (LABEL_NAME.to_string(), DB_NAME.to_string()),
        (LABEL_BELONG_TO.to_string(), KEEL_OPERATOR_NAME.to_string()),
    ]
    .into()
}

fn secret_value(secret: &Secret, key: &str) -> String {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{EndpointAddress, EndpointSubset};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;
    use keel_common::crd::{EtcdConfig, KeelClusterSpec};
    use std::collections::BTreeMap;

    fn db_secret() -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(DB_NAME.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([
                (MYSQL_USER_KEY.to_string(), ByteString(b"root".to_vec())),
                (MYSQL_PASSWORD_KEY.to_string(), ByteString(b"pw".to_vec())),
            ])),
            ..Default::default()
        }
    }

    fn override_db() -> Database {
        Database {
            host: "mysql.example.com".to_string(),
            port: 13306,
            username: "admin".to_string(),
            password: "secret".to_string(),
            name: Some("region".to_string()),
        }
    }

    fn tls_cluster() -> KeelCluster {
        KeelCluster::new(
            "keel-cluster",
            KeelClusterSpec {
                etcd_config: Some(EtcdConfig {
                    endpoints: vec!["https://10.0.0.2:2379".to_string()],
                    secret_name: Some("etcd-tls".to_string()),
                }),
                ..Default::default()
            },
        )
    }

    fn api_error(code: u16) -> Error {
        Error::from(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "denied".to_string(),
            reason: "Forbidden".to_string(),
            code,
        }))
    }

    /// Story: an explicit override always wins and never reads the cluster
    #[tokio::test]
    async fn story_override_is_returned_without_lookup() {
        let mut reader = MockClusterReader::new();
        reader.expect_get_secret().never();

        let db = override_db();
        let resolved = resolve_data_store(&reader, Some(&db), "keel-system", DB_NAME)
            .await
            .expect("override resolves");
        assert_eq!(resolved, db);
    }

    #[tokio::test]
    async fn secret_provides_credentials_for_in_cluster_db() {
        let mut reader = MockClusterReader::new();
        reader
            .expect_get_secret()
            .withf(|ns, name| ns == "keel-system" && name == DB_NAME)
            .returning(|_, _| Ok(Some(db_secret())));

        let db = resolve_data_store(&reader, None, "keel-system", DB_NAME)
            .await
            .expect("secret resolves");
        assert_eq!(db.host, "keel-db");
        assert_eq!(db.port, 3306);
        assert_eq!(db.username, "root");
        assert_eq!(db.password, "pw");
    }

    #[tokio::test]
    async fn missing_db_secret_is_not_ready() {
        let mut reader = MockClusterReader::new();
        reader.expect_get_secret().returning(|_, _| Ok(None));

        let err = resolve_data_store(&reader, None, "keel-system", DB_NAME)
            .await
            .expect_err("absent secret");
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn forbidden_db_secret_is_fatal() {
        let mut reader = MockClusterReader::new();
        reader
            .expect_get_secret()
            .returning(|_, _| Err(api_error(403)));

        let err = resolve_data_store(&reader, None, "keel-system", DB_NAME)
            .await
            .expect_err("forbidden");
        assert!(matches!(err, StepError::Fatal(Error::Dependency { .. })));
    }

    #[tokio::test]
    async fn no_tls_config_means_plaintext() {
        let mut reader = MockClusterReader::new();
        reader.expect_get_secret().never();

        let cluster = KeelCluster::new("keel-cluster", KeelClusterSpec::default());
        let tls = resolve_discovery_secret(&reader, &cluster, "keel-system")
            .await
            .expect("plaintext");
        assert_eq!(tls, None);
    }

    #[tokio::test]
    async fn configured_tls_secret_resolves() {
        let mut reader = MockClusterReader::new();
        reader
            .expect_get_secret()
            .withf(|_, name| name == "etcd-tls")
            .returning(|_, _| Ok(Some(Secret::default())));

        let tls = resolve_discovery_secret(&reader, &tls_cluster(), "keel-system")
            .await
            .expect("tls resolves");
        assert_eq!(
            tls,
            Some(DiscoveryTls {
                secret_name: "etcd-tls".to_string()
            })
        );
    }

    /// Story: TLS was requested, so a missing secret never downgrades to plaintext
    #[tokio::test]
    async fn story_missing_tls_secret_is_not_ready() {
        let mut reader = MockClusterReader::new();
        reader.expect_get_secret().returning(|_, _| Ok(None));

        let err = resolve_discovery_secret(&reader, &tls_cluster(), "keel-system")
            .await
            .expect_err("missing tls secret");
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn unreadable_tls_secret_is_fatal() {
        let mut reader = MockClusterReader::new();
        reader
            .expect_get_secret()
            .returning(|_, _| Err(api_error(403)));

        let err = resolve_discovery_secret(&reader, &tls_cluster(), "keel-system")
            .await
            .expect_err("forbidden tls secret");
        assert!(!err.is_recoverable());
    }

    fn endpoints(addresses: Option<Vec<EndpointAddress>>) -> Endpoints {
        Endpoints {
            subsets: Some(vec![EndpointSubset {
                addresses,
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn db_with_address_is_reachable() {
        let mut reader = MockClusterReader::new();
        reader
            .expect_list_endpoints()
            .withf(|_, selector| selector == "belongTo=keel-operator,name=keel-db")
            .returning(|_, _| {
                Ok(vec![
                    endpoints(Some(vec![])),
                    endpoints(Some(vec![EndpointAddress {
                        ip: "10.1.0.4".to_string(),
                        ..Default::default()
                    }])),
                ])
            });

        let cluster = KeelCluster::new("keel-cluster", KeelClusterSpec::default());
        is_database_reachable(&reader, &cluster, "keel-system")
            .await
            .expect("reachable");
    }

    #[tokio::test]
    async fn db_without_addresses_is_not_ready() {
        let mut reader = MockClusterReader::new();
        reader
            .expect_list_endpoints()
            .returning(|_, _| Ok(vec![endpoints(None), endpoints(Some(vec![]))]));

        let cluster = KeelCluster::new("keel-cluster", KeelClusterSpec::default());
        let err = is_database_reachable(&reader, &cluster, "keel-system")
            .await
            .expect_err("no addresses");
        assert!(err.is_recoverable());
    }

    /// Story: the console uses an external data store, so the in-cluster
    /// one is never waited for
    #[tokio::test]
    async fn story_external_console_db_skips_endpoint_check() {
        let mut reader = MockClusterReader::new();
        reader.expect_list_endpoints().never();

        let cluster = KeelCluster::new(
            "keel-cluster",
            KeelClusterSpec {
                ui_database: Some(override_db()),
                ..Default::default()
            },
        );
        is_database_reachable(&reader, &cluster, "keel-system")
            .await
            .expect("external console db");
    }

    #[tokio::test]
    async fn region_override_alone_still_checks_endpoints() {
        let mut reader = MockClusterReader::new();
        reader
            .expect_list_endpoints()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let cluster = KeelCluster::new(
            "keel-cluster",
            KeelClusterSpec {
                region_database: Some(override_db()),
                ..Default::default()
            },
        );
        let err = is_database_reachable(&reader, &cluster, "keel-system")
            .await
            .expect_err("in-cluster db not up");
        assert!(err.is_recoverable());
    }
}
