use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Pod;
use keel_common::crd::KeelComponent;
use keel_common::Error;
use keel_status::reader::StatusReader;
use mockall::mock;

// Local mock for StatusReader since the mockall-generated mock is only
// available within the keel-status crate's test configuration
mock! {
    pub Reader {}

    #[async_trait]
    impl StatusReader for Reader {
        async fn get_component(&self, namespace: &str, name: &str) -> Result<KeelComponent, Error>;
        async fn list_components(&self, namespace: &str, selector: &str) -> Result<Vec<KeelComponent>, Error>;
        async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, Error>;
        async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet, Error>;
        async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSet, Error>;
        async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, Error>;
    }
}
