//! Desired-state objects produced by the component synthesizers

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::Service;
use kube::discovery::ApiResource;
use kube::ResourceExt;
use serde_json::Value;

use keel_common::crd::ControllerType;
use keel_common::Error;

/// One object a component wants to exist in the cluster
#[derive(Clone, Debug, PartialEq)]
pub enum DesiredObject {
    /// Per-node workload controller
    DaemonSet(Box<DaemonSet>),
    /// Stateless workload controller
    Deployment(Box<Deployment>),
    /// Stateful workload controller
    StatefulSet(Box<StatefulSet>),
    /// Network service
    Service(Box<Service>),
}

impl DesiredObject {
    /// Kubernetes kind
    pub fn kind(&self) -> &'static str {
        match self {
            DesiredObject::DaemonSet(_) => "DaemonSet",
            DesiredObject::Deployment(_) => "Deployment",
            DesiredObject::StatefulSet(_) => "StatefulSet",
            DesiredObject::Service(_) => "Service",
        }
    }

    /// Object name
    pub fn name(&self) -> String {
        match self {
            DesiredObject::DaemonSet(o) => o.name_any(),
            DesiredObject::Deployment(o) => o.name_any(),
            DesiredObject::StatefulSet(o) => o.name_any(),
            DesiredObject::Service(o) => o.name_any(),
        }
    }

    /// API resource for dynamic access
    pub fn api_resource(&self) -> ApiResource {
        match self {
            DesiredObject::DaemonSet(_) => ApiResource::erase::<DaemonSet>(&()),
            DesiredObject::Deployment(_) => ApiResource::erase::<Deployment>(&()),
            DesiredObject::StatefulSet(_) => ApiResource::erase::<StatefulSet>(&()),
            DesiredObject::Service(_) => ApiResource::erase::<Service>(&()),
        }
    }

    /// Controller kind recorded on the component, for workload objects
    pub fn controller_type(&self) -> Option<ControllerType> {
        match self {
            DesiredObject::DaemonSet(_) => Some(ControllerType::DaemonSet),
            DesiredObject::Deployment(_) => Some(ControllerType::Deployment),
            DesiredObject::StatefulSet(_) => Some(ControllerType::StatefulSet),
            DesiredObject::Service(_) => None,
        }
    }

    /// JSON pointers to fields the API server refuses to change after creation
    pub fn immutable_fields(&self) -> &'static [&'static str] {
        match self {
            DesiredObject::DaemonSet(_)
            | DesiredObject::Deployment(_)
            | DesiredObject::StatefulSet(_) => &["/spec/selector"],
            DesiredObject::Service(_) => &["/spec/clusterIP", "/spec/clusterIPs"],
        }
    }

    /// Serialize to JSON for server-side apply
    pub fn to_json(&self) -> Result<Value, Error> {
        let json = match self {
            DesiredObject::DaemonSet(o) => serde_json::to_value(o),
            DesiredObject::Deployment(o) => serde_json::to_value(o),
            DesiredObject::StatefulSet(o) => serde_json::to_value(o),
            DesiredObject::Service(o) => serde_json::to_value(o),
        };
        json.map_err(|e| Error::serialization_for_kind(self.kind(), e.to_string()))
    }

    /// Apply body for this object, keeping immutable fields as they are on
    /// the live object (if any)
    pub fn apply_body(&self, live: Option<&Value>) -> Result<Value, Error> {
        let mut body = self.to_json()?;
        if let Some(live) = live {
            preserve_fields(&mut body, live, self.immutable_fields());
        }
        Ok(body)
    }
}

/// Copy each pointer's value from `live` into `desired`, creating parents as
/// needed. Pointers absent from `live` are left as desired.
pub fn preserve_fields(desired: &mut Value, live: &Value, pointers: &[&str]) {
    for pointer in pointers {
        let Some(value) = live.pointer(pointer) else {
            continue;
        };
        let mut target = &mut *desired;
        let mut segments = pointer.trim_start_matches('/').split('/').peekable();
        while let Some(segment) = segments.next() {
            let Some(obj) = { target }.as_object_mut() else {
                break;
            };
            if segments.peek().is_none() {
                obj.insert(segment.to_string(), value.clone());
                break;
            }
            target = obj
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
        }
    }
}
