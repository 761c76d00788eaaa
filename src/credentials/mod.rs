//! Credential resolution for the cluster and container registries.
//!
//! This module turns opaque credential references into material the rest of
//! the step can use:
//! - Kubeconfig files into cluster connection parameters
//! - Registry credential ids into docker auth tokens
//! - Resolved registry endpoints into a `.dockercfg` payload

mod kubeconfig;
mod registry;

pub use kubeconfig::{ConnectionParams, default_kubeconfig_path, load_connection_params};
pub use registry::{
    DockerConfigBuilder, RegistryToken, ResolvedRegistryEndpoint, normalize_registry_url,
};

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Resolves opaque credential references.
///
/// Resolution failures are fatal preconditions for a deployment.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolves a cluster credential reference into connection parameters.
    async fn resolve_cluster(&self, reference: &str) -> Result<ConnectionParams>;

    /// Resolves a registry credential id into a docker auth token.
    async fn resolve_registry(&self, credentials_id: &str) -> Result<RegistryToken>;
}

/// Resolves credentials from local kubeconfig files and environment variables.
///
/// Cluster references are kubeconfig paths (blank means the default path).
/// Registry ids name a pair of variables `<ID>_USERNAME` and `<ID>_PASSWORD`,
/// where `<ID>` is the id uppercased with non-alphanumerics replaced by `_`.
#[derive(Debug, Clone, Default)]
pub struct LocalCredentialResolver {
    /// Kubeconfig context to use instead of the current one.
    context: Option<String>,
    /// Variables consulted for registry credentials.
    env: HashMap<String, String>,
}

impl LocalCredentialResolver {
    /// Creates a resolver that reads registry credentials from `env`.
    #[must_use]
    pub const fn new(env: HashMap<String, String>) -> Self {
        Self { context: None, env }
    }

    /// Creates a resolver over the process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::new(std::env::vars().collect())
    }

    /// Selects a named kubeconfig context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn env_key(credentials_id: &str, field: &str) -> String {
        let id: String = credentials_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{id}_{field}")
    }

    fn lookup(&self, credentials_id: &str, field: &str) -> Result<String> {
        let key = Self::env_key(credentials_id, field);
        self.env.get(&key).cloned().ok_or_else(|| {
            ConfigError::CredentialResolution {
                reference: credentials_id.to_string(),
                message: format!("variable {key} is not set"),
            }
            .into()
        })
    }
}

#[async_trait]
impl CredentialResolver for LocalCredentialResolver {
    async fn resolve_cluster(&self, reference: &str) -> Result<ConnectionParams> {
        let path = if reference.trim().is_empty() {
            default_kubeconfig_path().ok_or_else(|| ConfigError::CredentialResolution {
                reference: String::from("<default>"),
                message: String::from("home directory is not available"),
            })?
        } else {
            PathBuf::from(reference)
        };

        debug!("Reading kubeconfig from: {}", path.display());
        load_connection_params(&path, self.context.as_deref()).await
    }

    async fn resolve_registry(&self, credentials_id: &str) -> Result<RegistryToken> {
        let username = self.lookup(credentials_id, "USERNAME")?;
        let password = self.lookup(credentials_id, "PASSWORD")?;
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        Ok(RegistryToken {
            email: username,
            token,
        })
    }
}
