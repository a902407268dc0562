//! Metrics registry for Keel observability
//!
//! Provides OpenTelemetry metrics for:
//! - Component reconciliation (duration, errors, not-ready skips)
//! - Desired-state objects applied
//! - Component lifecycle status counts

use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;

/// Global meter for Keel metrics
static METER: Lazy<Meter> = Lazy::new(|| global::meter("keel"));

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Histogram of component reconciliation duration
///
/// Labels:
/// - `component`: component name
/// - `result`: success, not_ready, error
pub static COMPONENT_RECONCILE_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("keel_component_reconcile_duration_seconds")
        .with_description("Duration of component reconciliation in seconds")
        .with_unit("s")
        .build()
});

/// Counter of component reconciliation errors
///
/// Labels:
/// - `component`: component name
/// - `error_type`: transient, permanent
pub static COMPONENT_RECONCILE_ERRORS: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("keel_component_reconcile_errors_total")
        .with_description("Total number of component reconciliation errors")
        .with_unit("{errors}")
        .build()
});

/// Counter of passes skipped because a dependency was not ready
///
/// Labels:
/// - `component`: component name
/// - `dependency`: what was missing
pub static COMPONENT_NOT_READY: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("keel_component_not_ready_total")
        .with_description("Total number of reconciliation passes skipped on a missing dependency")
        .with_unit("{passes}")
        .build()
});

/// Counter of desired-state objects applied
///
/// Labels:
/// - `component`: component name
/// - `kind`: DaemonSet, Service, ...
pub static OBJECTS_APPLIED: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("keel_objects_applied_total")
        .with_description("Total number of desired-state objects applied")
        .with_unit("{objects}")
        .build()
});

// ============================================================================
// Status Metrics
// ============================================================================

/// Gauge tracking components by lifecycle status
///
/// Labels:
/// - `status`: Initing, Creating, Running, Failed
pub static COMPONENTS_BY_STATUS: Lazy<Gauge<i64>> = Lazy::new(|| {
    METER
        .i64_gauge("keel_components_total")
        .with_description("Number of components by lifecycle status")
        .with_unit("{components}")
        .build()
});

// ============================================================================
// Metric Recording Helpers
// ============================================================================

/// Record a component reconciliation with timing
pub struct ReconcileTimer {
    component: String,
    start: std::time::Instant,
}

impl ReconcileTimer {
    /// Start timing a reconciliation
    pub fn start(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            start: std::time::Instant::now(),
        }
    }

    /// Record successful completion
    pub fn success(self) {
        self.record_duration("success");
    }

    /// Record a pass skipped on a missing dependency
    pub fn not_ready(self, dependency: &str) {
        COMPONENT_NOT_READY.add(
            1,
            &[
                KeyValue::new("component", self.component.clone()),
                KeyValue::new("dependency", dependency.to_string()),
            ],
        );
        self.record_duration("not_ready");
    }

    /// Record error completion
    pub fn error(self, error_type: &str) {
        COMPONENT_RECONCILE_ERRORS.add(
            1,
            &[
                KeyValue::new("component", self.component.clone()),
                KeyValue::new("error_type", error_type.to_string()),
            ],
        );
        self.record_duration("error");
    }

    fn record_duration(self, result: &'static str) {
        let duration = self.start.elapsed().as_secs_f64();
        COMPONENT_RECONCILE_DURATION.record(
            duration,
            &[
                KeyValue::new("component", self.component),
                KeyValue::new("result", result),
            ],
        );
    }
}

/// Record objects applied for a component
pub fn record_objects_applied(component: &str, kind: &str, count: u64) {
    OBJECTS_APPLIED.add(
        count,
        &[
            KeyValue::new("component", component.to_string()),
            KeyValue::new("kind", kind.to_string()),
        ],
    );
}

/// Update the component status gauge
pub fn set_components_by_status(status: &str, count: i64) {
    COMPONENTS_BY_STATUS.record(count, &[KeyValue::new("status", status.to_string())]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_timer_outcomes_do_not_panic() {
        let timer = ReconcileTimer::start("keel-chaos");
        assert_eq!(timer.component, "keel-chaos");
        timer.success();

        ReconcileTimer::start("keel-chaos").not_ready("secret keel-db");
        ReconcileTimer::start("keel-chaos").error("transient");
    }

    #[test]
    fn recording_helpers_do_not_panic() {
        record_objects_applied("keel-repo", "DaemonSet", 1);
        set_components_by_status("Running", 2);
    }
}
