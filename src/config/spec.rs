//! Configuration types for the deploy step.
//!
//! This module defines the structs that map to the `kcd.deploy.yaml` file.
//! The file mirrors the settings a build host collects for one deployment
//! step: where the cluster credentials live, which manifests to apply, and
//! how registry credentials are injected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace used when none is configured for the registry secret or release.
pub const DEFAULT_NAMESPACE: &str = "default";

/// The root configuration structure for one deploy step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployConfig {
    /// What kind of deployment this step performs.
    #[serde(default)]
    pub deploy_type: DeployType,
    /// Kubeconfig path; blank means `~/.kube/config`.
    #[serde(default)]
    pub kubeconfig: String,
    /// Kubeconfig context; the current context when unset.
    #[serde(default)]
    pub context: Option<String>,
    /// Comma-separated manifest globs, relative to the workspace root.
    #[serde(default)]
    pub configs: String,
    /// Whether manifests go through variable substitution before decoding.
    #[serde(default)]
    pub enable_substitution: bool,
    /// Deletes the manifests' resources instead of applying them.
    #[serde(default)]
    pub delete_resource: bool,
    /// Name of the registry credential secret; derived when blank.
    #[serde(default)]
    pub secret_name: String,
    /// Namespace of the registry credential secret.
    #[serde(default = "default_namespace")]
    pub secret_namespace: String,
    /// Registries to create pull credentials for.
    #[serde(default)]
    pub docker_credentials: Vec<DockerCredential>,
    /// Release management settings, used when `deploy_type` is `helm`.
    #[serde(default)]
    pub helm: Option<HelmConfig>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            deploy_type: DeployType::default(),
            kubeconfig: String::new(),
            context: None,
            configs: String::new(),
            enable_substitution: false,
            delete_resource: false,
            secret_name: String::new(),
            secret_namespace: default_namespace(),
            docker_credentials: Vec::new(),
            helm: None,
        }
    }
}

impl DeployConfig {
    /// Registry entries that carry a credentials id.
    pub fn registry_credentials(&self) -> impl Iterator<Item = &DockerCredential> {
        self.docker_credentials
            .iter()
            .filter(|c| c.credentials_id.as_deref().is_some_and(|id| !id.trim().is_empty()))
    }
}

/// Deployment flavour.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeployType {
    /// Apply manifests to the cluster.
    #[default]
    Kubernetes,
    /// Install, upgrade or roll back a packaged release.
    Helm,
    /// Any other value; rejected when the context is configured.
    Unknown(String),
}

impl From<String> for DeployType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "kubernetes" | "" => Self::Kubernetes,
            "helm" => Self::Helm,
            _ => Self::Unknown(value),
        }
    }
}

impl From<DeployType> for String {
    fn from(value: DeployType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DeployType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kubernetes => write!(f, "kubernetes"),
            Self::Helm => write!(f, "helm"),
            Self::Unknown(value) => write!(f, "{value}"),
        }
    }
}

/// One registry to create pull credentials for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockerCredential {
    /// Registry URL; `http://` is assumed without a scheme.
    pub url: String,
    /// Credential reference; entries without one are skipped.
    #[serde(default)]
    pub credentials_id: Option<String>,
}

/// Release management settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelmConfig {
    /// Operation to run.
    #[serde(default)]
    pub command: HelmCommandType,
    /// Release name.
    #[serde(default)]
    pub release_name: String,
    /// Namespace the release lives in.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Chart to install; required for `install`.
    #[serde(default)]
    pub chart: Option<ChartSource>,
    /// Comma-separated `key=value` overrides, dotted keys nest.
    #[serde(default)]
    pub set_values: String,
    /// Operation timeout in seconds.
    #[serde(default = "default_helm_timeout")]
    pub timeout_secs: u64,
    /// Waits for resources to become ready.
    #[serde(default)]
    pub wait: bool,
    /// Revision to roll back to.
    #[serde(default)]
    pub revision: u32,
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            command: HelmCommandType::default(),
            release_name: String::new(),
            namespace: default_namespace(),
            chart: None,
            set_values: String::new(),
            timeout_secs: default_helm_timeout(),
            wait: false,
            revision: 0,
        }
    }
}

/// Release operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HelmCommandType {
    /// Installs, or upgrades an existing release.
    #[default]
    Install,
    /// Rolls back to a previous revision.
    Rollback,
}

/// Where a chart comes from. Loading it is the release manager's job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartSource {
    /// Chart archive location.
    Uri(String),
    /// Chart in a repository.
    Repository {
        /// Chart name.
        name: String,
        /// Chart version.
        version: String,
        /// Repository URL.
        url: String,
    },
}

impl fmt::Display for ChartSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uri(uri) => write!(f, "{uri}"),
            Self::Repository { name, version, url } => write!(f, "{name}-{version} ({url})"),
        }
    }
}

// Default value functions

fn default_namespace() -> String {
    String::from(DEFAULT_NAMESPACE)
}

const fn default_helm_timeout() -> u64 {
    300
}
