//! Kubeconfig loading.
//!
//! Kubeconfig files are read and resolved by `kube`, so every user
//! credential form it supports (embedded or file-based certificates, tokens,
//! token files, exec plugins and auth providers) reaches the cluster client
//! unchanged.

use std::path::{Path, PathBuf};

use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use url::Url;

use crate::error::{ConfigError, Result};

/// Default kubeconfig location relative to the home directory.
const KUBECONFIG_FILE: &str = ".kube/config";

/// Host reported when the server URL cannot be parsed.
const UNKNOWN_HOST: &str = "Unknown";

/// Returns `~/.kube/config`, if a home directory is known.
#[must_use]
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(KUBECONFIG_FILE))
}

/// Everything needed to open a connection to one cluster.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// API server URL as configured.
    pub server: String,
    /// Resolved client configuration; `None` when `server` is not a URI.
    pub config: Option<kube::Config>,
}

impl ConnectionParams {
    /// Creates parameters for an unauthenticated server.
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        let server = server.into();
        let config = server.parse::<http::Uri>().ok().map(kube::Config::new);
        Self { server, config }
    }

    /// Wraps a client configuration resolved from a kubeconfig.
    #[must_use]
    pub fn from_config(config: kube::Config) -> Self {
        Self {
            server: config.cluster_url.to_string(),
            config: Some(config),
        }
    }

    /// Returns the host part of the server URL, or `Unknown`.
    #[must_use]
    pub fn master_host(&self) -> String {
        Url::parse(&self.server)
            .ok()
            .and_then(|url| url.host_str().map(ToString::to_string))
            .unwrap_or_else(|| UNKNOWN_HOST.to_string())
    }
}

/// Loads the kubeconfig at `path` and resolves `context`, or the current
/// context when `None`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, or if the context, its
/// cluster, or its user cannot be resolved.
pub async fn load_connection_params(path: &Path, context: Option<&str>) -> Result<ConnectionParams> {
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| credential_error(path, &e))?;

    let options = KubeConfigOptions {
        context: context.map(ToString::to_string),
        ..KubeConfigOptions::default()
    };

    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
        .await
        .map_err(|e| credential_error(path, &e))?;

    Ok(ConnectionParams::from_config(config))
}

fn credential_error(path: &Path, error: &KubeconfigError) -> ConfigError {
    ConfigError::CredentialResolution {
        reference: path.display().to_string(),
        message: format!("invalid kubeconfig: {error}"),
    }
}
