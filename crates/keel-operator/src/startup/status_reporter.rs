//! Component status reporting background task

use std::sync::Arc;
use std::time::Duration;

use keel_common::Error;
use keel_status::ComponentStatusService;

/// Interval between full status listings
pub const STATUS_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// List every component once; the listing refreshes the status gauge
pub async fn report_component_statuses(service: &ComponentStatusService) -> Result<usize, Error> {
    let statuses = service.list(false).await?;
    Ok(statuses.len())
}

/// Start background status reporting
pub fn start_status_reporter(service: Arc<ComponentStatusService>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATUS_REPORT_INTERVAL);
        loop {
            interval.tick().await;
            match report_component_statuses(&service).await {
                Ok(count) => tracing::debug!(count, "component statuses reported"),
                Err(e) => tracing::warn!(error = %e, "component status report failed"),
            }
        }
    });
}
