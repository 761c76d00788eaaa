//! Resource managers.
//!
//! A [`ResourceManager`] is bound to one API group/version. It holds the
//! cluster client handle, the pretty-print flag passed on every call and the
//! update monitor, and builds the [`ResourceUpdater`]s for its kinds.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error};

use crate::cluster::{ClusterApi, ObjectRef, RequestOptions};
use crate::error::{ClusterError, KubeDeployError, Result};
use crate::manifest::ManifestResource;

use super::monitor::{NoopMonitor, UpdateMonitor};
use super::registry::{ApiGroupVersion, KindEntry};
use super::updater::ResourceUpdater;

/// Manager for the kinds of one API group/version.
#[derive(Clone)]
pub struct ResourceManager {
    client: Arc<dyn ClusterApi>,
    api: ApiGroupVersion,
    pretty: bool,
    monitor: Arc<dyn UpdateMonitor>,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("server", &self.client.server())
            .field("api", &self.api)
            .field("pretty", &self.pretty)
            .finish_non_exhaustive()
    }
}

impl ResourceManager {
    /// Creates a manager with a no-op monitor.
    #[must_use]
    pub fn new(client: Arc<dyn ClusterApi>, api: ApiGroupVersion, pretty: bool) -> Self {
        Self {
            client,
            api,
            pretty,
            monitor: Arc::new(NoopMonitor),
        }
    }

    /// Replaces the update monitor.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<dyn UpdateMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Group/version this manager serves.
    #[must_use]
    pub const fn api(&self) -> ApiGroupVersion {
        self.api
    }

    /// Base options for every call made by this manager.
    #[must_use]
    pub const fn options(&self) -> RequestOptions {
        RequestOptions::new(self.pretty)
    }

    pub(crate) fn client(&self) -> &dyn ClusterApi {
        self.client.as_ref()
    }

    pub(crate) fn monitor(&self) -> &dyn UpdateMonitor {
        self.monitor.as_ref()
    }

    /// Binds an updater to one resource of a kind served by this manager.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource has no name, or if the entry belongs
    /// to another group/version.
    pub fn updater(&self, entry: &KindEntry, resource: ManifestResource) -> Result<ResourceUpdater<'_>> {
        if entry.api != self.api {
            return Err(KubeDeployError::internal(format!(
                "{} is served by {}, not {}",
                entry.kind, entry.api, self.api
            )));
        }
        ResourceUpdater::new(self, *entry, resource)
    }

    /// Logs and returns any error. Used on write paths.
    ///
    /// # Errors
    ///
    /// Returns the error carried by `result`.
    pub fn fatal<T>(&self, target: &ObjectRef, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            Self::log_failure(target, &e);
            e
        })
    }

    /// Like [`Self::fatal`], but maps not-found to `Ok(None)`. Used on read
    /// and delete paths.
    ///
    /// # Errors
    ///
    /// Returns the error carried by `result` unless it is not-found.
    pub fn fatal_except_not_found<T>(&self, target: &ObjectRef, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => {
                debug!("{target} not found");
                Ok(None)
            }
            Err(e) => {
                Self::log_failure(target, &e);
                Err(e)
            }
        }
    }

    fn log_failure(target: &ObjectRef, err: &KubeDeployError) {
        match err {
            KubeDeployError::Cluster(ClusterError::ApiRequestFailed { status, body }) => {
                error!("Cluster API call for {target} failed with code {status}: {body}");
            }
            other => error!("Cluster API call for {target} failed: {other}"),
        }
    }
}

/// Managers created on demand for one apply batch.
///
/// Every manager shares the batch's client handle. The pool is dropped with
/// the batch; nothing is reused across batches.
pub struct ManagerPool {
    client: Arc<dyn ClusterApi>,
    pretty: bool,
    monitor: Arc<dyn UpdateMonitor>,
    managers: HashMap<ApiGroupVersion, ResourceManager>,
}

impl ManagerPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(client: Arc<dyn ClusterApi>, pretty: bool, monitor: Arc<dyn UpdateMonitor>) -> Self {
        Self {
            client,
            pretty,
            monitor,
            managers: HashMap::new(),
        }
    }

    /// Returns the manager for `api`, creating it on first use.
    pub fn manager_for(&mut self, api: ApiGroupVersion) -> &ResourceManager {
        let client = &self.client;
        let monitor = &self.monitor;
        let pretty = self.pretty;
        self.managers.entry(api).or_insert_with(|| {
            debug!("Creating resource manager for {api}");
            ResourceManager::new(Arc::clone(client), api, pretty).with_monitor(Arc::clone(monitor))
        })
    }

    /// Number of managers created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Returns true if no manager has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::memory::MemoryCluster;

    fn target() -> ObjectRef {
        ObjectRef {
            kind: String::from("ConfigMap"),
            group: String::new(),
            version: String::from("v1"),
            plural: String::from("configmaps"),
            namespace: Some(String::from("default")),
            name: Some(String::from("cfg")),
        }
    }

    fn manager() -> ResourceManager {
        ResourceManager::new(Arc::new(MemoryCluster::new()), ApiGroupVersion::core("v1"), true)
    }

    #[test]
    fn test_fatal_except_not_found() {
        let manager = manager();
        let not_found: Result<()> = Err(ClusterError::NotFound {
            kind: String::from("ConfigMap"),
            name: String::from("cfg"),
        }
        .into());
        assert!(matches!(manager.fatal_except_not_found(&target(), not_found), Ok(None)));

        let conflict: Result<()> = Err(ClusterError::api_error(409, "conflict").into());
        assert!(manager.fatal_except_not_found(&target(), conflict).is_err());
    }

    #[test]
    fn test_fatal_rejects_not_found() {
        let manager = manager();
        let not_found: Result<()> = Err(ClusterError::NotFound {
            kind: String::from("ConfigMap"),
            name: String::from("cfg"),
        }
        .into());
        assert!(manager.fatal(&target(), not_found).is_err());
        assert_eq!(manager.fatal(&target(), Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_options_carry_pretty_flag() {
        assert!(manager().options().pretty);
        assert_eq!(manager().api(), ApiGroupVersion::core("v1"));
    }

    #[test]
    fn test_pool_creates_one_manager_per_group_version() {
        let mut pool = ManagerPool::new(Arc::new(MemoryCluster::new()), false, Arc::new(NoopMonitor));
        assert!(pool.is_empty());
        pool.manager_for(ApiGroupVersion::core("v1"));
        pool.manager_for(ApiGroupVersion::new("apps", "v1"));
        pool.manager_for(ApiGroupVersion::core("v1"));
        assert_eq!(pool.len(), 2);
        assert!(format!("{:?}", pool.manager_for(ApiGroupVersion::core("v1"))).contains("memory"));
    }
}
