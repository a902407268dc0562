//! Applying desired-state objects and recording the backing controller

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::Client;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use keel_common::crd::{KeelComponent, KeelComponentStatus};
use keel_common::kube_utils::ApplyBatch;
use keel_common::Error;

use crate::desired::DesiredObject;

/// Field manager for server-side apply
pub const FIELD_MANAGER: &str = "keel-component-controller";

/// Write access used by the orchestration driver
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectApplier: Send + Sync {
    /// Create or update every object, independently of each other.
    ///
    /// Returns the number of objects applied, or the first failure once all
    /// objects have been attempted.
    async fn apply_all(
        &self,
        namespace: &str,
        component: &str,
        objects: &[DesiredObject],
    ) -> Result<usize, Error>;

    /// Record the controller backing a component
    async fn patch_component_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KeelComponentStatus,
    ) -> Result<(), Error>;
}

/// [`ObjectApplier`] backed by server-side apply
pub struct KubeObjectApplier {
    client: Client,
}

impl KubeObjectApplier {
    /// Create an applier wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn live_object(
        &self,
        namespace: &str,
        object: &DesiredObject,
    ) -> Result<Option<serde_json::Value>, Error> {
        let ar = object.api_resource();
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);
        match api.get_opt(&object.name()).await? {
            Some(live) => Ok(Some(
                serde_json::to_value(live)
                    .map_err(|e| Error::serialization_for_kind(object.kind(), e.to_string()))?,
            )),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ObjectApplier for KubeObjectApplier {
    async fn apply_all(
        &self,
        namespace: &str,
        component: &str,
        objects: &[DesiredObject],
    ) -> Result<usize, Error> {
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let mut batch = ApplyBatch::new(self.client.clone(), namespace, &params);

        let mut lookup_errors = Vec::new();
        for object in objects {
            let body = self
                .live_object(namespace, object)
                .await
                .and_then(|live| {
                    if live.is_some() {
                        debug!(kind = object.kind(), name = %object.name(), "updating existing object");
                    }
                    object.apply_body(live.as_ref())
                });
            match body {
                Ok(body) => {
                    batch.push_json(object.kind(), &object.name(), body, &object.api_resource())?
                }
                Err(e) => {
                    warn!(kind = object.kind(), name = %object.name(), error = %e, "failed to read live object");
                    lookup_errors.push(e);
                }
            }
        }

        let applied = batch.run(component).await?;
        match lookup_errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(applied),
        }
    }

    async fn patch_component_status(
        &self,
        namespace: &str,
        name: &str,
        status: &KeelComponentStatus,
    ) -> Result<(), Error> {
        let api: Api<KeelComponent> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({ "status": status });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}
