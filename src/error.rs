//! Error types for the Kubernetes deployment step.
//!
//! This module provides the error hierarchy for every stage of a deployment
//! run: configuration, manifest decoding, cluster API calls, the command
//! pipeline, and release management.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the deployment step.
#[derive(Debug, Error)]
pub enum KubeDeployError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Manifest input errors.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Cluster API errors.
    #[error("Cluster API error: {0}")]
    Cluster(#[from] ClusterError),

    /// Command pipeline errors.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Release management errors.
    #[error("Release error: {0}")]
    Release(#[from] ReleaseError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The deploy type is not one the step knows how to run.
    #[error("Unknown deploy type: {value}")]
    UnknownDeployType {
        /// The rejected value.
        value: String,
    },

    /// A derived or configured secret name is not usable.
    #[error("Invalid secret name '{name}': {reason}")]
    InvalidSecretName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Credentials could not be resolved into connection parameters.
    #[error("Failed to resolve credentials '{reference}': {message}")]
    CredentialResolution {
        /// The credential reference that failed.
        reference: String,
        /// Description of the failure.
        message: String,
    },
}

/// Manifest input errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A document could not be decoded into resources.
    #[error("Failed to decode manifest {source_name}: {message}")]
    DecodeFailed {
        /// File or stream the document came from.
        source_name: String,
        /// Description of the decode error.
        message: String,
    },

    /// A resource reached the engine without a usable name.
    #[error("No name defined for {kind} resource: {resource}")]
    MissingName {
        /// Kind of the offending resource.
        kind: String,
        /// Compact rendering of the resource for diagnosis.
        resource: String,
    },

    /// The configured file patterns matched nothing.
    #[error("No matching manifest files for pattern '{pattern}' in {root}")]
    NoMatchingFiles {
        /// Comma-separated glob list.
        pattern: String,
        /// Workspace root that was searched.
        root: PathBuf,
    },

    /// A glob pattern could not be compiled.
    #[error("Invalid file pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Description of the error.
        message: String,
    },
}

/// Cluster API errors.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The named object does not exist. Expected on the read path.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Kind of the missing object.
        kind: String,
        /// Name of the missing object.
        name: String,
    },

    /// Any other API response.
    #[error("Cluster API request failed: {status} - {body}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Response body returned by the API server.
        body: String,
    },

    /// Network error.
    #[error("Network error communicating with cluster: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from cluster API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The call was cancelled before it completed.
    #[error("Cluster call interrupted")]
    Interrupted,
}

/// Command pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A command precondition did not hold.
    #[error("Precondition failed: {message}")]
    Precondition {
        /// Description of the failed check.
        message: String,
    },

    /// The transition table has no entry for the requested command.
    #[error("No command registered for '{command}'")]
    MissingCommand {
        /// Identity of the missing command.
        command: String,
    },
}

/// Release management errors.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The release name is already taken in another namespace.
    #[error("Release name has been used in namespace {namespace}")]
    NameInUse {
        /// Namespace currently holding the release.
        namespace: String,
    },

    /// The release backend reported a failure.
    #[error("Release operation '{operation}' failed: {message}")]
    OperationFailed {
        /// Operation that failed.
        operation: String,
        /// Description of the failure.
        message: String,
    },

    /// A `key=value` list could not be converted into values.
    #[error("Invalid set values '{input}': {message}")]
    InvalidValues {
        /// The rejected input.
        input: String,
        /// Description of the error.
        message: String,
    },
}

/// Result type alias for deployment operations.
pub type Result<T> = std::result::Result<T, KubeDeployError>;

impl KubeDeployError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is the cluster's not-found signal.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Cluster(ClusterError::NotFound { .. }))
    }

    /// Returns true if this error came from a cancelled call.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cluster(ClusterError::Interrupted))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl ClusterError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, body: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            body: body.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::ApiRequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl ReleaseError {
    /// Creates an operation failure.
    #[must_use]
    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err: KubeDeployError = ClusterError::NotFound {
            kind: String::from("Service"),
            name: String::from("web"),
        }
        .into();
        assert!(err.is_not_found());

        let err: KubeDeployError = ClusterError::api_error(409, "conflict").into();
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_api_error_display_carries_status_and_body() {
        let err = ClusterError::api_error(422, "{\"reason\":\"Invalid\"}");
        assert_eq!(err.status(), Some(422));
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("Invalid"));
    }

    #[test]
    fn test_release_name_in_use_message() {
        let err = ReleaseError::NameInUse {
            namespace: String::from("staging"),
        };
        assert_eq!(
            err.to_string(),
            "Release name has been used in namespace staging"
        );
    }
}
