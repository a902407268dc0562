//! Custom Resource Definitions for Keel
//!
//! This module contains all CRD definitions used by the Keel operator.

mod cluster;
mod component;

pub use cluster::{
    Database, EtcdConfig, ImageHub, KeelCluster, KeelClusterSpec, KeelClusterStatus,
    DEFAULT_DATABASE_NAME, DEFAULT_ETCD_ENDPOINT, DEFAULT_IMAGE_REPOSITORY,
};
pub use component::{
    ControllerType, ImagePullPolicy, KeelComponent, KeelComponentSpec, KeelComponentStatus,
    LogLevel,
};
