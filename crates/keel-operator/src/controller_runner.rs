//! Controller runner - builds the component controller future

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use keel_common::crd::KeelComponent;
use keel_component::{error_policy, reconcile, ComponentContext};

use crate::gate::StatusInitGate;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// so the API server closes idle watches before the client times out.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the KeelComponent controller for one namespace
pub fn build_component_controller(
    client: Client,
    namespace: &str,
    cluster_name: String,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let gate = Arc::new(StatusInitGate::from_client(client.clone()));
    let ctx = Arc::new(ComponentContext::from_client(
        client.clone(),
        gate,
        cluster_name,
    ));
    let components: Api<KeelComponent> = Api::namespaced(client, namespace);

    tracing::info!(namespace = %namespace, "- KeelComponent controller");

    Box::pin(
        Controller::new(
            components,
            WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(log_reconcile_result("Component")),
    )
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
