//! Builds cluster clients from resolved connection parameters.

use std::sync::Arc;

use crate::credentials::ConnectionParams;
use crate::error::Result;

use super::api::ClusterApi;
use super::client::KubeClusterClient;

/// Turns connection parameters into a client handle shared by one batch.
pub trait ClusterConnector: Send + Sync {
    /// Connects to the cluster described by `params`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn ClusterApi>>;
}

/// Connector producing [`KubeClusterClient`]s.
#[derive(Debug, Clone, Copy)]
pub struct KubeConnector {
    timeout_secs: Option<u64>,
}

impl KubeConnector {
    /// Creates a connector using the client's default read timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self { timeout_secs: None }
    }

    /// Overrides the read timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}

impl Default for KubeConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterConnector for KubeConnector {
    fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn ClusterApi>> {
        let client = match self.timeout_secs {
            Some(timeout) => KubeClusterClient::with_timeout(params, timeout)?,
            None => KubeClusterClient::new(params)?,
        };
        Ok(Arc::new(client))
    }
}
