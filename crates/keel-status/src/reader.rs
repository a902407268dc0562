//! Cluster reads needed to compute component status

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

use keel_common::crd::KeelComponent;
use keel_common::Error;

/// Read access for the status translator
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusReader: Send + Sync {
    /// Get one component
    async fn get_component(&self, namespace: &str, name: &str) -> Result<KeelComponent, Error>;

    /// List components; an empty selector lists all of them
    async fn list_components(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<KeelComponent>, Error>;

    /// Get a Deployment
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, Error>;

    /// Get a StatefulSet
    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet, Error>;

    /// Get a DaemonSet
    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSet, Error>;

    /// List pods matching a label selector
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, Error>;
}

/// [`StatusReader`] backed by the Kubernetes API
pub struct KubeStatusReader {
    client: Client,
}

impl KubeStatusReader {
    /// Create a reader wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn list_params(selector: &str) -> ListParams {
    if selector.is_empty() {
        ListParams::default()
    } else {
        ListParams::default().labels(selector)
    }
}

#[async_trait]
impl StatusReader for KubeStatusReader {
    async fn get_component(&self, namespace: &str, name: &str) -> Result<KeelComponent, Error> {
        let api: Api<KeelComponent> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn list_components(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<KeelComponent>, Error> {
        let api: Api<KeelComponent> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&list_params(selector)).await?.items)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, Error> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet, Error> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSet, Error> {
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&list_params(selector)).await?.items)
    }
}
