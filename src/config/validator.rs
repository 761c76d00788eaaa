//! Configuration validation for deploy-step settings.
//!
//! This module checks a parsed configuration before any cluster call is
//! made, collecting every problem rather than stopping at the first one.

use crate::command::set_values_to_yaml;
use crate::error::{ConfigError, Result};
use crate::naming::{NAME_LENGTH_LIMIT, is_valid_object_name};
use std::path::Path;
use tracing::debug;

use super::spec::{DeployConfig, DeployType, HelmCommandType, HelmConfig};

/// Validator for deploy-step configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a deploy-step configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any rule fails.
    pub fn validate(&self, config: &DeployConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(ConfigError::validation(first_error.message.clone(), first_error.field.clone()).into())
        }
    }

    /// Runs every rule and collects all errors and warnings.
    #[must_use]
    pub fn check(&self, config: &DeployConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_deploy_type(config, &mut result);
        Self::validate_manifests(config, &mut result);
        Self::validate_secret(config, &mut result);
        Self::validate_registries(config, &mut result);
        if config.deploy_type == DeployType::Helm {
            match &config.helm {
                Some(helm) => Self::validate_helm(helm, &mut result),
                None => result.error("helm", "Helm settings are required for deploy type 'helm'"),
            }
        }

        result
    }

    fn validate_deploy_type(config: &DeployConfig, result: &mut ValidationResult) {
        if let DeployType::Unknown(value) = &config.deploy_type {
            result.error(
                "deploy_type",
                format!("Unknown deploy type '{value}'. Expected 'kubernetes' or 'helm'."),
            );
        }
    }

    fn validate_manifests(config: &DeployConfig, result: &mut ValidationResult) {
        if config.deploy_type != DeployType::Helm && config.configs.trim().is_empty() {
            result.error("configs", "At least one manifest pattern is required");
        }

        if config.enable_substitution {
            result.warnings.push(String::from(
                "enable_substitution: variables are substituted by the build host; kcd applies manifests as read",
            ));
        }

        let kubeconfig = config.kubeconfig.trim();
        if !kubeconfig.is_empty() && !Path::new(kubeconfig).exists() {
            result
                .warnings
                .push(format!("kubeconfig: '{kubeconfig}' does not exist yet"));
        }
    }

    fn validate_secret(config: &DeployConfig, result: &mut ValidationResult) {
        let namespace = config.secret_namespace.trim();
        if namespace.is_empty() {
            result.error("secret_namespace", "Secret namespace cannot be empty");
        } else if !is_valid_object_name(namespace) {
            result.error(
                "secret_namespace",
                format!("Secret namespace '{namespace}' is not a valid object name"),
            );
        }

        let name = config.secret_name.trim();
        if name.len() > NAME_LENGTH_LIMIT {
            result.error(
                "secret_name",
                format!("Secret name is longer than {NAME_LENGTH_LIMIT} characters"),
            );
        } else if !name.is_empty() && !name.contains('$') && !is_valid_object_name(name) {
            result.error(
                "secret_name",
                format!("Secret name '{name}' is not a valid object name"),
            );
        }
    }

    fn validate_registries(config: &DeployConfig, result: &mut ValidationResult) {
        for (i, registry) in config.docker_credentials.iter().enumerate() {
            if registry.url.trim().is_empty() {
                result.error(format!("docker_credentials[{i}].url"), "Registry URL cannot be empty");
            }
            if registry.credentials_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
                result.warnings.push(format!(
                    "docker_credentials[{i}]: no credentials_id, '{}' will be skipped",
                    registry.url
                ));
            }
        }
    }

    fn validate_helm(helm: &HelmConfig, result: &mut ValidationResult) {
        if helm.release_name.trim().is_empty() {
            result.error("helm.release_name", "Release name is required");
        }

        match helm.command {
            HelmCommandType::Install => {
                if helm.chart.is_none() {
                    result.error("helm.chart", "A chart location is required to install a release");
                }
                if let Err(e) = set_values_to_yaml(&helm.set_values) {
                    result.error("helm.set_values", e.to_string());
                }
                if helm.timeout_secs == 0 {
                    result.warnings.push(String::from("helm.timeout_secs: 0 disables the operation timeout"));
                }
            }
            HelmCommandType::Rollback => {
                if helm.revision == 0 {
                    result
                        .warnings
                        .push(String::from("helm.revision: 0 rolls back to the previous revision"));
                }
            }
        }
    }
}
