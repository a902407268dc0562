//! CRD installation utilities
//!
//! The operator installs its own CRDs on startup using server-side apply so
//! the stored schema always matches the running operator.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use keel_common::crd::{KeelCluster, KeelComponent};

/// Field manager for CRD installation
const CRD_FIELD_MANAGER: &str = "keel-operator";

/// CRD definition with name and resource
struct CrdDef {
    name: &'static str,
    crd: CustomResourceDefinition,
}

fn keel_crds() -> Vec<CrdDef> {
    vec![
        CrdDef {
            name: KeelCluster::crd_name(),
            crd: KeelCluster::crd(),
        },
        CrdDef {
            name: KeelComponent::crd_name(),
            crd: KeelComponent::crd(),
        },
    ]
}

/// All Keel CRDs as a multi-document YAML stream
pub fn crd_manifests() -> anyhow::Result<String> {
    let docs = keel_crds()
        .into_iter()
        .map(|def| {
            serde_yaml::to_string(&def.crd)
                .map_err(|e| anyhow::anyhow!("failed to serialize {} CRD: {}", def.name, e))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(docs.join("---\n"))
}

/// Ensure all Keel CRDs are installed
pub async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(CRD_FIELD_MANAGER).force();

    for def in keel_crds() {
        tracing::info!("Installing {} CRD...", def.name);
        crds.patch(def.name, &params, &Patch::Apply(&def.crd))
            .await
            .map_err(|e| anyhow::anyhow!("failed to install {} CRD: {}", def.name, e))?;
    }

    tracing::info!("Keel CRDs installed/updated");
    Ok(())
}
