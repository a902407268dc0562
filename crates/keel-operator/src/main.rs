//! Keel Operator - converges the platform components of a Keel installation

use std::sync::Arc;

use clap::Parser;

use keel_common::kube_utils::create_client;
use keel_common::telemetry::{init_telemetry, TelemetryConfig};
use keel_operator::cli::{Cli, Commands};
use keel_operator::controller_runner::build_component_controller;
use keel_operator::startup::{crd_manifests, ensure_crds_installed, start_status_reporter};
use keel_status::ComponentStatusService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Crd = cli.command() {
        println!("{}", crd_manifests()?);
        return Ok(());
    }

    init_telemetry(TelemetryConfig {
        service_name: "keel-operator".to_string(),
        ..Default::default()
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {}", e))?;

    match cli.command() {
        Commands::Controller => run_controller(&cli).await,
        Commands::Status { init, name } => print_status(&cli, *init, name.as_deref()).await,
        Commands::Crd => Ok(()),
    }
}

async fn run_controller(cli: &Cli) -> anyhow::Result<()> {
    let client = create_client(cli.kubeconfig.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("failed to create kube client: {}", e))?;

    ensure_crds_installed(&client).await?;

    start_status_reporter(Arc::new(ComponentStatusService::from_client(
        client.clone(),
        cli.namespace.clone(),
    )));

    tracing::info!(
        namespace = %cli.namespace,
        cluster = %cli.cluster_name,
        "Starting Keel controllers"
    );
    build_component_controller(client, &cli.namespace, cli.cluster_name.clone()).await;

    tracing::info!("Keel controller shutting down");
    Ok(())
}

async fn print_status(cli: &Cli, init: bool, name: Option<&str>) -> anyhow::Result<()> {
    let client = create_client(cli.kubeconfig.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("failed to create kube client: {}", e))?;
    let service = ComponentStatusService::from_client(client, cli.namespace.clone());

    let json = match name {
        Some(name) => serde_json::to_string_pretty(&service.get(name).await?)?,
        None => serde_json::to_string_pretty(&service.list(init).await?)?,
    };
    println!("{json}");
    Ok(())
}
