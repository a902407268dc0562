//! Error types for the Keel operator
//!
//! Errors are structured with fields to aid debugging in production.
//! Each error variant includes contextual information like component names,
//! dependency names, and underlying causes.
//!
//! Reconciliation steps that depend on cluster state return [`StepResult`],
//! which separates a dependency that simply does not exist yet
//! ([`StepError::Recoverable`]) from everything else ([`StepError::Fatal`]).

use std::fmt;

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for Keel operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for CRD specs
    #[error("validation error for {component}: {message}")]
    Validation {
        /// Name of the component with invalid configuration
        component: String,
        /// Description of what's invalid
        message: String,
        /// The invalid field path (e.g., "spec.image")
        field: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// The component's recorded controller type has no status reader
    #[error("unsupported controller type for {component}: {controller_type}")]
    UnsupportedController {
        /// Name of the component
        component: String,
        /// The controller type value as stored on the component
        controller_type: String,
    },

    /// A dependency exists but could not be read or used
    #[error("dependency error [{dependency}]: {message}")]
    Dependency {
        /// Name of the dependency (e.g., "secret keel-system/keel-db")
        dependency: String,
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "driver", "translator")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    ///
    /// For simple validation errors without component context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            component: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with component context and field path
    pub fn validation_for_field(
        component: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            component: component.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an unsupported controller type error
    pub fn unsupported_controller(
        component: impl Into<String>,
        controller_type: impl Into<String>,
    ) -> Self {
        Self::UnsupportedController {
            component: component.into(),
            controller_type: controller_type.into(),
        }
    }

    /// Create a dependency error
    pub fn dependency(dependency: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Dependency {
            dependency: dependency.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation, serialization and unsupported-controller errors are not
    /// retryable (they require a spec change). Kubernetes errors depend on
    /// the error type.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Don't retry on 4xx errors (validation, forbidden, ...)
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Validation { .. } => false,
            Error::Serialization { .. } => false,
            Error::UnsupportedController { .. } => false,
            Error::Dependency { .. } => true,
            Error::Internal { .. } => true,
        }
    }

    /// Get the component name if this error is associated with a specific component
    pub fn component(&self) -> Option<&str> {
        match self {
            Error::Validation { component, .. } => Some(component),
            Error::UnsupportedController { component, .. } => Some(component),
            _ => None,
        }
    }
}

/// A required dependency does not exist in the cluster yet.
///
/// Not an error: the pass is skipped and requeued, previously applied
/// objects stay untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotReady {
    /// What is missing (e.g., "secret keel-system/keel-db")
    pub dependency: String,
    /// Human-readable detail
    pub message: String,
}

impl NotReady {
    /// Create a not-ready condition for the given dependency
    pub fn new(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not ready: {}", self.dependency, self.message)
    }
}

/// Outcome of a reconciliation step that reads cluster state
#[derive(Debug, Error)]
pub enum StepError {
    /// A dependency does not exist yet; skip this pass and requeue
    #[error("{0}")]
    Recoverable(NotReady),

    /// Anything else; the pass aborts
    #[error(transparent)]
    Fatal(#[from] Error),
}

impl StepError {
    /// Create a recoverable not-ready condition
    pub fn not_ready(dependency: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Recoverable(NotReady::new(dependency, msg))
    }

    /// Whether this is a recoverable not-ready condition
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StepError::Recoverable(_))
    }
}

impl From<kube::Error> for StepError {
    fn from(source: kube::Error) -> Self {
        StepError::Fatal(Error::from(source))
    }
}

/// Result of a reconciliation step
pub type StepResult<T> = std::result::Result<T, StepError>;
