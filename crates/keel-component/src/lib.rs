//! Component orchestration for Keel
//!
//! Dependency resolution, per-component resource synthesis and the driver
//! that sequences `before → resources → after` for each KeelComponent.

#![deny(missing_docs)]

pub mod apply;
pub mod context;
pub mod controller;
pub mod desired;
pub mod handlers;
pub mod resolver;

pub use controller::{error_policy, reconcile, ComponentContext, InitGate};
pub use handlers::{ComponentHandler, ComponentKind};
