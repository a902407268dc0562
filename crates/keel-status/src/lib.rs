//! Component status for Keel
//!
//! Translates the native status of the workload controller backing each
//! KeelComponent into a normalized lifecycle with pod and container
//! diagnostics.

#![deny(missing_docs)]

pub mod reader;
pub mod service;
pub mod translate;
pub mod view;

pub use service::ComponentStatusService;
pub use view::{ComponentLifecycle, ComponentStatusView, PodPhase, PodStatusView};
