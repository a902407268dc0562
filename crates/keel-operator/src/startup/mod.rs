//! Startup utilities for the Keel operator

mod crds;
mod status_reporter;

pub use crds::{crd_manifests, ensure_crds_installed};
pub use status_reporter::{report_component_statuses, start_status_reporter, STATUS_REPORT_INTERVAL};
