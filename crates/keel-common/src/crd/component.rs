//! KeelComponent CRD: one managed platform component
//!
//! The spec carries the desired image and runtime knobs. The status records
//! which workload controller backs the component once it has been
//! synthesized and applied.

use std::collections::BTreeMap;
use std::fmt;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, KEEL_OPERATOR_NAME, LABEL_BELONG_TO, LABEL_NAME};

/// KeelComponent defines one deployable unit of the platform.
///
/// Example:
/// ```yaml
/// apiVersion: keel.dev/v1alpha1
/// kind: KeelComponent
/// metadata:
///   name: keel-chaos
///   namespace: keel-system
///   labels:
///     priorityComponent: "true"
/// spec:
///   image: keel.me/keel-chaos:v1.0
///   logLevel: debug
///   priorityComponent: true
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "keel.dev",
    version = "v1alpha1",
    kind = "KeelComponent",
    namespaced,
    status = "KeelComponentStatus",
    shortname = "kcpt",
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Controller","type":"string","jsonPath":".status.controllerType"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KeelComponentSpec {
    /// Container image
    pub image: String,

    /// Image pull policy
    #[serde(default)]
    pub image_pull_policy: ImagePullPolicy,

    /// Log level passed to the component
    #[serde(default)]
    pub log_level: LogLevel,

    /// Whether the component must be running before the rest of the
    /// platform is usable
    #[serde(default)]
    pub priority_component: bool,
}

/// KeelComponent status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeelComponentStatus {
    /// Kind of the workload controller backing the component
    #[serde(default)]
    pub controller_type: ControllerType,

    /// Name of the workload controller backing the component
    #[serde(default)]
    pub controller_name: String,
}

/// Kind of workload controller backing a component.
///
/// Values the operator does not know decode into [`ControllerType::Unknown`]
/// rather than failing, so status translation can report them per component.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ControllerType {
    /// Stateless replica set
    Deployment,
    /// Stateful replica set
    StatefulSet,
    /// One pod per eligible node
    DaemonSet,
    /// Anything else, kept verbatim
    Unknown(String),
}

impl ControllerType {
    /// Value as stored on the resource
    pub fn as_str(&self) -> &str {
        match self {
            ControllerType::Deployment => "deployment",
            ControllerType::StatefulSet => "statefulset",
            ControllerType::DaemonSet => "daemonset",
            ControllerType::Unknown(s) => s,
        }
    }
}

impl Default for ControllerType {
    fn default() -> Self {
        ControllerType::Unknown(String::new())
    }
}

impl From<String> for ControllerType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "deployment" => ControllerType::Deployment,
            "statefulset" => ControllerType::StatefulSet,
            "daemonset" => ControllerType::DaemonSet,
            _ => ControllerType::Unknown(value),
        }
    }
}

impl From<ControllerType> for String {
    fn from(value: ControllerType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for ControllerType {
    fn schema_name() -> String {
        "ControllerType".to_string()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// Image pull policy
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ImagePullPolicy {
    /// Always pull
    Always,
    /// Pull only when the image is missing on the node
    #[default]
    IfNotPresent,
    /// Never pull
    Never,
}

impl ImagePullPolicy {
    /// Value as expected by the pod spec
    pub fn as_str(&self) -> &'static str {
        match self {
            ImagePullPolicy::Always => "Always",
            ImagePullPolicy::IfNotPresent => "IfNotPresent",
            ImagePullPolicy::Never => "Never",
        }
    }
}

/// Component log level
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug
    Debug,
    /// Info
    #[default]
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
}

impl LogLevel {
    /// Value passed on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

impl KeelComponent {
    /// Labels placed on every object synthesized for this component.
    ///
    /// Metadata labels plus the `name`/`belongTo` defaults; the defaults never
    /// override labels already present.
    pub fn component_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.labels().clone();
        labels
            .entry(LABEL_NAME.to_string())
            .or_insert_with(|| self.name_any());
        labels
            .entry(LABEL_BELONG_TO.to_string())
            .or_insert_with(|| KEEL_OPERATOR_NAME.to_string());
        labels
    }

    /// Whether the component is a priority (init) component
    pub fn is_init_component(&self) -> bool {
        self.spec.priority_component
    }

    /// Validate the spec before synthesizing anything from it
    pub fn validate(&self) -> Result<(), Error> {
        if self.spec.image.trim().is_empty() {
            return Err(Error::validation_for_field(
                self.name_any(),
                "spec.image",
                "image must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_yaml_with_defaults() {
        let yaml = r#"
apiVersion: keel.dev/v1alpha1
kind: KeelComponent
metadata:
  name: keel-repo
  namespace: keel-system
spec:
  image: keel.me/keel-repo:v1
"#;
        let component: KeelComponent = serde_yaml::from_str(yaml).expect("should parse");
        assert_eq!(component.spec.image_pull_policy, ImagePullPolicy::IfNotPresent);
        assert_eq!(component.spec.log_level, LogLevel::Info);
        assert!(!component.is_init_component());
        assert!(component.status.is_none());
    }

    #[test]
    fn controller_type_decodes_known_and_unknown_values() {
        let status: KeelComponentStatus =
            serde_json::from_str(r#"{"controllerType":"daemonset","controllerName":"keel-repo"}"#)
                .expect("should parse");
        assert_eq!(status.controller_type, ControllerType::DaemonSet);

        let status: KeelComponentStatus =
            serde_json::from_str(r#"{"controllerType":"cronjob","controllerName":"x"}"#)
                .expect("unknown controller types still decode");
        assert_eq!(
            status.controller_type,
            ControllerType::Unknown("cronjob".to_string())
        );

        let json = serde_json::to_value(&KeelComponentStatus {
            controller_type: ControllerType::StatefulSet,
            controller_name: "db".to_string(),
        })
        .expect("should serialize");
        assert_eq!(json["controllerType"], "statefulset");
    }

    #[test]
    fn labels_get_name_and_owner_defaults() {
        let mut component = KeelComponent::new(
            "keel-chaos",
            KeelComponentSpec {
                image: "chaos:1".to_string(),
                ..Default::default()
            },
        );
        component
            .labels_mut()
            .insert("priorityComponent".to_string(), "true".to_string());

        let labels = component.component_labels();
        assert_eq!(labels.get("name").map(String::as_str), Some("keel-chaos"));
        assert_eq!(labels.get("belongTo").map(String::as_str), Some("keel-operator"));
        assert_eq!(labels.get("priorityComponent").map(String::as_str), Some("true"));
    }

    #[test]
    fn empty_image_fails_validation() {
        let component = KeelComponent::new("keel-repo", KeelComponentSpec::default());
        let err = component.validate().expect_err("empty image is invalid");
        assert!(err.to_string().contains("image must not be empty"));
    }
}
