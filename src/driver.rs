//! Reconciliation driver.
//!
//! Applies a batch of manifest documents to the cluster. All `Namespace`
//! resources of the batch are processed first, then every other resource in
//! document order. Resources are dispatched through the kind registry to a
//! manager and a one-shot updater. The first fatal error halts the batch;
//! resources applied before it stay applied.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::cluster::ClusterApi;
use crate::credentials::{DockerConfigBuilder, ResolvedRegistryEndpoint};
use crate::error::{KubeDeployError, Result};
use crate::kinds::{
    ManagerPool, NoopMonitor, ResourceKindRegistry, UpdateMonitor, UpdateOutcome,
};
use crate::manifest::{ManifestDecoder, ManifestResource, ResourceMetadata, YamlManifestDecoder};

/// Secret type used for registry credentials.
pub const DOCKERCFG_SECRET_TYPE: &str = "kubernetes.io/dockercfg";

/// Data key holding the registry credential payload.
pub const DOCKERCFG_KEY: &str = ".dockercfg";

/// One raw manifest document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    /// Where the document came from, used in logs and errors.
    pub source_name: String,
    /// Raw document content, after any external substitution.
    pub content: String,
}

impl ManifestDocument {
    /// Creates a document.
    #[must_use]
    pub fn new(source_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            content: content.into(),
        }
    }
}

/// What happened to one resource of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// The updater ran with this outcome.
    Reconciled(UpdateOutcome),
    /// No registry entry matched the resource.
    Skipped,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconciled(outcome) => write!(f, "{outcome}"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Report line for one resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    /// Document the resource was decoded from.
    pub source: String,
    /// Declared `apiVersion`.
    pub api_version: String,
    /// Declared kind.
    pub kind: String,
    /// Resource name, when set.
    pub name: Option<String>,
    /// Effective namespace, `None` for cluster-scoped or skipped resources.
    pub namespace: Option<String>,
    /// Outcome.
    pub status: ResourceStatus,
}

/// Result of one apply batch.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// When the batch started.
    pub started_at: DateTime<Utc>,
    /// When the batch finished.
    pub finished_at: DateTime<Utc>,
    /// Whether the batch ran in delete mode.
    pub delete_mode: bool,
    /// Resources created.
    pub created: usize,
    /// Existing resources replaced or patched.
    pub applied: usize,
    /// Resources deleted.
    pub deleted: usize,
    /// Deletes that found nothing.
    pub not_found: usize,
    /// Resources with no registry entry.
    pub skipped: usize,
    /// Per-resource outcomes in processing order.
    pub resources: Vec<ResourceReport>,
}

impl ApplyReport {
    fn start(delete_mode: bool) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            delete_mode,
            created: 0,
            applied: 0,
            deleted: 0,
            not_found: 0,
            skipped: 0,
            resources: Vec::new(),
        }
    }

    fn record(&mut self, resource: ResourceReport) {
        match resource.status {
            ResourceStatus::Reconciled(UpdateOutcome::Created) => self.created += 1,
            ResourceStatus::Reconciled(UpdateOutcome::Applied) => self.applied += 1,
            ResourceStatus::Reconciled(UpdateOutcome::Deleted) => self.deleted += 1,
            ResourceStatus::Reconciled(UpdateOutcome::NotFound) => self.not_found += 1,
            ResourceStatus::Skipped => self.skipped += 1,
        }
        self.resources.push(resource);
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Number of resources processed, skipped ones included.
    #[must_use]
    pub fn total(&self) -> usize {
        self.resources.len()
    }

    /// Wall-clock duration of the batch.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.delete_mode {
            write!(
                f,
                "{} resources: {} deleted, {} not found, {} skipped",
                self.total(),
                self.deleted,
                self.not_found,
                self.skipped
            )
        } else {
            write!(
                f,
                "{} resources: {} created, {} applied, {} skipped",
                self.total(),
                self.created,
                self.applied,
                self.skipped
            )
        }
    }
}

/// Applies manifest batches through the kind registry.
pub struct ReconciliationDriver {
    client: Arc<dyn ClusterApi>,
    registry: Arc<ResourceKindRegistry>,
    decoder: Arc<dyn ManifestDecoder>,
    monitor: Arc<dyn UpdateMonitor>,
    pretty: bool,
    delete_mode: bool,
}

impl fmt::Debug for ReconciliationDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconciliationDriver")
            .field("server", &self.client.server())
            .field("kinds", &self.registry.len())
            .field("pretty", &self.pretty)
            .field("delete_mode", &self.delete_mode)
            .finish_non_exhaustive()
    }
}

impl ReconciliationDriver {
    /// Creates a driver that applies with the YAML decoder and no monitor.
    #[must_use]
    pub fn new(client: Arc<dyn ClusterApi>, registry: Arc<ResourceKindRegistry>) -> Self {
        Self {
            client,
            registry,
            decoder: Arc::new(YamlManifestDecoder::new()),
            monitor: Arc::new(NoopMonitor),
            pretty: false,
            delete_mode: false,
        }
    }

    /// Replaces the manifest decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn ManifestDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replaces the update monitor shared by every manager of a batch.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn UpdateMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Sets the pretty-print flag passed on every cluster call.
    #[must_use]
    pub const fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Deletes instead of applying for every batch.
    #[must_use]
    pub const fn with_delete_mode(mut self, delete_mode: bool) -> Self {
        self.delete_mode = delete_mode;
        self
    }

    /// Returns true if batches are deleted rather than applied.
    #[must_use]
    pub const fn delete_mode(&self) -> bool {
        self.delete_mode
    }

    /// Reads manifest files and applies them as one batch.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, or if [`Self::apply`] fails.
    pub async fn apply_files(&self, files: &[PathBuf]) -> Result<ApplyReport> {
        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            let content = fs::read_to_string(file).await?;
            documents.push(ManifestDocument::new(file.display().to_string(), content));
        }
        self.apply(&documents).await
    }

    /// Applies (or deletes) a batch of manifest documents.
    ///
    /// Every document is decoded before the first cluster call, so a decode
    /// error leaves the cluster untouched.
    ///
    /// # Errors
    ///
    /// Returns the first decode error, missing-name error or fatal cluster
    /// error. Resources processed before the failure are not rolled back.
    pub async fn apply(&self, documents: &[ManifestDocument]) -> Result<ApplyReport> {
        let mut decoded = Vec::new();
        for document in documents {
            let resources = self.decoder.decode(&document.source_name, &document.content)?;
            debug!(
                "Decoded {} resources from {}",
                resources.len(),
                document.source_name
            );
            decoded.extend(resources.into_iter().map(|r| (document.source_name.as_str(), r)));
        }

        let (namespaces, others): (Vec<_>, Vec<_>) =
            decoded.into_iter().partition(|(_, r)| r.is_namespace());

        let mut pool = ManagerPool::new(Arc::clone(&self.client), self.pretty, Arc::clone(&self.monitor));
        let mut report = ApplyReport::start(self.delete_mode);

        for (source, resource) in namespaces.into_iter().chain(others) {
            match self.dispatch(&mut pool, source, resource).await {
                Ok(line) => report.record(line),
                Err(e) => {
                    warn!(
                        "Batch halted after {} of its resources: {}",
                        report.total(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        let report = report.finish();
        info!("{report}");
        Ok(report)
    }

    /// Creates or replaces the registry credential secret `name` in
    /// `namespace` from resolved registry endpoints.
    ///
    /// The secret is always created or applied, also in delete mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot be written.
    pub async fn create_or_replace_secrets(
        &self,
        namespace: &str,
        name: &str,
        endpoints: &[ResolvedRegistryEndpoint],
    ) -> Result<UpdateOutcome> {
        let payload = DockerConfigBuilder::new(endpoints).dockercfg_base64();
        let secret = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": name, "namespace": namespace},
            "type": DOCKERCFG_SECRET_TYPE,
            "data": {DOCKERCFG_KEY: payload},
        });
        let resource = ManifestResource::from_value(secret, "registry-credentials")?;

        let entry = *self
            .registry
            .lookup(resource.api_version(), resource.kind())
            .ok_or_else(|| KubeDeployError::internal("registry has no v1 Secret entry"))?;

        let mut pool = ManagerPool::new(Arc::clone(&self.client), self.pretty, Arc::clone(&self.monitor));
        let updater = pool.manager_for(entry.api).updater(&entry, resource)?;
        updater.create_or_apply().await
    }

    async fn dispatch(
        &self,
        pool: &mut ManagerPool,
        source: &str,
        resource: ManifestResource,
    ) -> Result<ResourceReport> {
        let api_version = resource.api_version().to_string();
        let kind = resource.kind().to_string();

        let Some(entry) = self.registry.lookup(&api_version, &kind).copied() else {
            let name = resource.name().map(ToString::to_string);
            warn!(
                "Skipped {api_version} {kind} '{}' from {source}: kind is not supported",
                name.as_deref().unwrap_or_default()
            );
            return Ok(ResourceReport {
                source: source.to_string(),
                api_version,
                kind,
                name,
                namespace: None,
                status: ResourceStatus::Skipped,
            });
        };

        let updater = pool.manager_for(entry.api).updater(&entry, resource)?;
        let outcome = if self.delete_mode {
            updater.delete().await?
        } else {
            updater.create_or_apply().await?
        };

        Ok(ResourceReport {
            source: source.to_string(),
            api_version,
            kind,
            name: Some(updater.name().to_string()),
            namespace: updater.namespace().map(ToString::to_string),
            status: ResourceStatus::Reconciled(outcome),
        })
    }
}
