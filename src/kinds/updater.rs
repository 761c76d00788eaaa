//! Per-resource create-or-apply protocol.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cluster::{ObjectRef, RequestOptions};
use crate::error::{ManifestError, Result};
use crate::manifest::{ManifestResource, ResourceMetadata};

use super::hooks;
use super::manager::ResourceManager;
use super::registry::{KindEntry, UpdateMode};

/// Namespace used when a namespaced resource does not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Longest resource rendering included in a missing-name error.
const MAX_RENDERED_RESOURCE: usize = 200;

/// What an updater did to its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// The object did not exist and was created.
    Created,
    /// The object existed and was replaced or patched.
    Applied,
    /// The object was deleted.
    Deleted,
    /// Delete found nothing to remove.
    NotFound,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Applied => write!(f, "applied"),
            Self::Deleted => write!(f, "deleted"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

/// Binds one manifest resource to its manager for a single operation.
#[derive(Debug)]
pub struct ResourceUpdater<'m> {
    manager: &'m ResourceManager,
    entry: KindEntry,
    desired: Value,
    name: String,
    namespace: Option<String>,
}

impl<'m> ResourceUpdater<'m> {
    pub(crate) fn new(
        manager: &'m ResourceManager,
        entry: KindEntry,
        resource: ManifestResource,
    ) -> Result<Self> {
        let name = resource
            .name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string);

        let Some(name) = name else {
            let rendered = if hooks::redacts_body(entry.kind) {
                String::from("<redacted>")
            } else {
                let mut body = resource.body().to_string();
                if body.len() > MAX_RENDERED_RESOURCE {
                    let mut end = MAX_RENDERED_RESOURCE;
                    while !body.is_char_boundary(end) {
                        end -= 1;
                    }
                    body.truncate(end);
                    body.push_str("...");
                }
                body
            };
            return Err(ManifestError::MissingName {
                kind: entry.kind.to_string(),
                resource: rendered,
            }
            .into());
        };

        let namespace = entry.namespaced.then(|| {
            resource
                .namespace()
                .map(str::trim)
                .filter(|ns| !ns.is_empty())
                .unwrap_or(DEFAULT_NAMESPACE)
                .to_string()
        });

        Ok(Self {
            manager,
            entry,
            desired: resource.into_body(),
            name,
            namespace,
        })
    }

    /// Name of the bound resource.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace of the bound resource, `None` for cluster-scoped kinds.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Address of the bound resource.
    #[must_use]
    pub fn target(&self) -> ObjectRef {
        ObjectRef {
            kind: self.entry.kind.to_string(),
            group: self.entry.api.group.to_string(),
            version: self.entry.api.version.to_string(),
            plural: self.entry.plural.to_string(),
            namespace: self.namespace.clone(),
            name: Some(self.name.clone()),
        }
    }

    /// Creates the object if it is absent, otherwise updates it, then
    /// notifies the manager's monitor once.
    ///
    /// # Errors
    ///
    /// Returns an error on any remote failure other than not-found on read.
    pub async fn create_or_apply(&self) -> Result<UpdateOutcome> {
        let target = self.target();
        let options = self.manager.options();
        let client = self.manager.client();

        let deployed = self
            .manager
            .fatal_except_not_found(&target, client.get(&target, options).await)?;

        let (outcome, updated) = match &deployed {
            Some(deployed) => {
                let updated = self.apply(&target, deployed, options).await?;
                (UpdateOutcome::Applied, updated)
            }
            None => {
                let updated = self
                    .manager
                    .fatal(&target, client.create(&target, &self.desired, options).await)?;
                (UpdateOutcome::Created, updated)
            }
        };

        self.log_outcome(outcome, Some(&updated));
        self.manager
            .monitor()
            .on_kind_update(self.entry.kind, deployed.as_ref(), &updated);
        Ok(outcome)
    }

    /// Deletes the object. A missing object counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error on any remote failure other than not-found.
    pub async fn delete(&self) -> Result<UpdateOutcome> {
        let target = self.target();
        let mut options = self.manager.options();
        if let Some(policy) = hooks::delete_propagation(self.entry.kind) {
            options = options.with_propagation(policy);
        }

        let status = self
            .manager
            .fatal_except_not_found(&target, self.manager.client().delete(&target, options).await)?;

        let outcome = if status.is_some() {
            UpdateOutcome::Deleted
        } else {
            UpdateOutcome::NotFound
        };
        self.log_outcome(outcome, status.as_ref());
        Ok(outcome)
    }

    async fn apply(&self, target: &ObjectRef, deployed: &Value, options: RequestOptions) -> Result<Value> {
        let client = self.manager.client();
        match self.entry.update_mode {
            UpdateMode::Replace => {
                let mut body = self.desired.clone();
                hooks::prepare_replace(self.entry.kind, &mut body, deployed);
                self.manager
                    .fatal(target, client.replace(target, &body, options).await)
            }
            UpdateMode::StrategicMergePatch => self
                .manager
                .fatal(target, client.patch(target, &self.desired, options).await),
            UpdateMode::DryRunReplace => {
                let request = hooks::dry_run_request(&self.desired, &self.name, self.namespace());
                let mut body = self.manager.fatal(
                    target,
                    client
                        .create(target, &request, options.with_dry_run())
                        .await,
                )?;
                hooks::recover_after_dry_run(
                    self.entry.kind,
                    &mut body,
                    deployed,
                    &self.desired,
                    &self.name,
                );
                self.manager
                    .fatal(target, client.replace(target, &body, options).await)
            }
        }
    }

    fn log_outcome(&self, outcome: UpdateOutcome, body: Option<&Value>) {
        let kind = self.entry.kind;
        if hooks::redacts_body(kind) {
            info!("{kind} {outcome}: name: {}", self.name);
            return;
        }

        match outcome {
            UpdateOutcome::NotFound => {
                info!("{kind} '{}' resource not found, nothing to delete", self.name);
            }
            _ => info!("{kind} {outcome}: {}", self.target()),
        }
        if let Some(body) = body {
            debug!("{kind} '{}': {body}", self.name);
        }
    }
}
