use std::sync::Arc;

use async_trait::async_trait;
use kube::Client;

use keel_common::Error;
use keel_component::InitGate;
use keel_status::reader::{KubeStatusReader, StatusReader};
use keel_status::ComponentStatusService;

/// [`InitGate`] that asks the status service whether every priority
/// component is running
pub struct StatusInitGate {
    reader: Arc<dyn StatusReader>,
}

impl StatusInitGate {
    /// Create a gate over explicit status reads
    pub fn new(reader: Arc<dyn StatusReader>) -> Self {
        Self { reader }
    }

    /// Create a gate backed by the Kubernetes API
    pub fn from_client(client: Client) -> Self {
        Self::new(Arc::new(KubeStatusReader::new(client)))
    }
}

#[async_trait]
impl InitGate for StatusInitGate {
    async fn init_components_running(&self, namespace: &str) -> Result<bool, Error> {
        ComponentStatusService::new(self.reader.clone(), namespace)
            .init_components_running()
            .await
    }
}
