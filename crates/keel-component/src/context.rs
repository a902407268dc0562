//! Per-pass reconciliation context
//!
//! A [`PassContext`] is built by the driver for one reconciliation pass of
//! one component. After the handler's `before` step it is sealed together
//! with the resolved dependencies into a [`ResolvedPass`], which `resources`
//! and `after` only read.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::ResourceExt;
use tracing::Span;

use keel_common::crd::{KeelCluster, KeelComponent};

use crate::resolver::ResolvedDependencies;

/// Inputs of one reconciliation pass
#[derive(Clone, Debug)]
pub struct PassContext {
    /// Component being reconciled
    pub component: Arc<KeelComponent>,
    /// Cluster specification
    pub cluster: Arc<KeelCluster>,
    /// Namespace the component lives in
    pub namespace: String,
    /// Labels for every object synthesized in this pass
    pub labels: BTreeMap<String, String>,
    /// Span scoping all logs of this pass
    pub span: Span,
}

impl PassContext {
    /// Create the context for one pass
    pub fn new(
        component: Arc<KeelComponent>,
        cluster: Arc<KeelCluster>,
        namespace: impl Into<String>,
        span: Span,
    ) -> Self {
        let labels = component.component_labels();
        Self {
            component,
            cluster,
            namespace: namespace.into(),
            labels,
            span,
        }
    }

    /// Component name
    pub fn name(&self) -> String {
        self.component.name_any()
    }

    /// Seal the context with the dependencies resolved by `before`
    pub fn resolved(self, deps: ResolvedDependencies) -> ResolvedPass {
        ResolvedPass { pass: self, deps }
    }
}

/// A pass context with its dependencies resolved
#[derive(Clone, Debug)]
pub struct ResolvedPass {
    pass: PassContext,
    deps: ResolvedDependencies,
}

impl ResolvedPass {
    /// The pass inputs
    pub fn pass(&self) -> &PassContext {
        &self.pass
    }

    /// Dependencies resolved by `before`
    pub fn deps(&self) -> &ResolvedDependencies {
        &self.deps
    }
}

impl std::ops::Deref for ResolvedPass {
    type Target = PassContext;

    fn deref(&self) -> &PassContext {
        &self.pass
    }
}
