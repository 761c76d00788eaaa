//! Resource kind registry.
//!
//! Maps a manifest's `(apiVersion, kind)` to the API group/version whose
//! manager handles it and to the kind tag that selects its update hooks.
//! The table is built once and injected; it is not extensible at runtime.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{ConfigError, Result};

use super::kind::ResourceKind;

/// An API group and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ApiGroupVersion {
    /// API group; empty for the core group.
    pub group: &'static str,
    /// API version.
    pub version: &'static str,
}

impl ApiGroupVersion {
    /// Creates a group/version pair.
    #[must_use]
    pub const fn new(group: &'static str, version: &'static str) -> Self {
        Self { group, version }
    }

    /// The core (`v1`) group.
    #[must_use]
    pub const fn core(version: &'static str) -> Self {
        Self::new("", version)
    }

    /// Returns the value of `apiVersion` for this group/version.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for ApiGroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api_version())
    }
}

/// How an existing object is updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateMode {
    /// Full replace with the desired body.
    Replace,
    /// Strategic merge patch with the desired body.
    StrategicMergePatch,
    /// Replace with a body defaulted by a server-side dry-run create, with
    /// identity metadata recovered from the deployed object.
    DryRunReplace,
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace => write!(f, "replace"),
            Self::StrategicMergePatch => write!(f, "patch"),
            Self::DryRunReplace => write!(f, "dry-run replace"),
        }
    }
}

/// One registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KindEntry {
    /// Kind tag selecting update hooks.
    pub kind: ResourceKind,
    /// Group/version of the managing API.
    pub api: ApiGroupVersion,
    /// Plural resource name used in request paths.
    pub plural: &'static str,
    /// Whether objects of this kind live in a namespace.
    pub namespaced: bool,
    /// How existing objects are updated.
    pub update_mode: UpdateMode,
}

impl KindEntry {
    const fn namespaced(kind: ResourceKind, api: ApiGroupVersion, plural: &'static str) -> Self {
        Self {
            kind,
            api,
            plural,
            namespaced: true,
            update_mode: UpdateMode::Replace,
        }
    }

    const fn cluster_scoped(mut self) -> Self {
        self.namespaced = false;
        self
    }

    const fn with_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }
}

const CORE_V1: ApiGroupVersion = ApiGroupVersion::core("v1");
const APPS_V1: ApiGroupVersion = ApiGroupVersion::new("apps", "v1");
const APPS_V1BETA1: ApiGroupVersion = ApiGroupVersion::new("apps", "v1beta1");
const APPS_V1BETA2: ApiGroupVersion = ApiGroupVersion::new("apps", "v1beta2");
const BATCH_V1: ApiGroupVersion = ApiGroupVersion::new("batch", "v1");
const BATCH_V1BETA1: ApiGroupVersion = ApiGroupVersion::new("batch", "v1beta1");
const BATCH_V2ALPHA1: ApiGroupVersion = ApiGroupVersion::new("batch", "v2alpha1");
const AUTOSCALING_V1: ApiGroupVersion = ApiGroupVersion::new("autoscaling", "v1");
const AUTOSCALING_V2: ApiGroupVersion = ApiGroupVersion::new("autoscaling", "v2");
const AUTOSCALING_V2BETA1: ApiGroupVersion = ApiGroupVersion::new("autoscaling", "v2beta1");
const AUTOSCALING_V2BETA2: ApiGroupVersion = ApiGroupVersion::new("autoscaling", "v2beta2");
const EXTENSIONS_V1BETA1: ApiGroupVersion = ApiGroupVersion::new("extensions", "v1beta1");
const NETWORKING_V1: ApiGroupVersion = ApiGroupVersion::new("networking.k8s.io", "v1");
const NETWORKING_V1BETA1: ApiGroupVersion = ApiGroupVersion::new("networking.k8s.io", "v1beta1");

/// Returns the built-in registry table.
#[must_use]
pub fn builtin_entries() -> Vec<KindEntry> {
    use ResourceKind as K;
    use UpdateMode::{DryRunReplace, StrategicMergePatch};

    vec![
        // core/v1
        KindEntry::namespaced(K::Namespace, CORE_V1, "namespaces").cluster_scoped(),
        KindEntry::namespaced(K::Service, CORE_V1, "services"),
        KindEntry::namespaced(K::ReplicationController, CORE_V1, "replicationcontrollers"),
        KindEntry::namespaced(K::Pod, CORE_V1, "pods").with_mode(DryRunReplace),
        KindEntry::namespaced(K::Secret, CORE_V1, "secrets"),
        KindEntry::namespaced(K::ConfigMap, CORE_V1, "configmaps"),
        KindEntry::namespaced(K::PersistentVolumeClaim, CORE_V1, "persistentvolumeclaims"),
        KindEntry::namespaced(K::PersistentVolume, CORE_V1, "persistentvolumes").cluster_scoped(),
        // apps/v1
        KindEntry::namespaced(K::Deployment, APPS_V1, "deployments"),
        KindEntry::namespaced(K::DaemonSet, APPS_V1, "daemonsets"),
        KindEntry::namespaced(K::ReplicaSet, APPS_V1, "replicasets"),
        KindEntry::namespaced(K::StatefulSet, APPS_V1, "statefulsets").with_mode(DryRunReplace),
        // apps/v1beta1
        KindEntry::namespaced(K::Deployment, APPS_V1BETA1, "deployments"),
        KindEntry::namespaced(K::StatefulSet, APPS_V1BETA1, "statefulsets"),
        // apps/v1beta2 only supports updates through patch
        KindEntry::namespaced(K::Deployment, APPS_V1BETA2, "deployments").with_mode(StrategicMergePatch),
        KindEntry::namespaced(K::DaemonSet, APPS_V1BETA2, "daemonsets").with_mode(StrategicMergePatch),
        KindEntry::namespaced(K::ReplicaSet, APPS_V1BETA2, "replicasets").with_mode(StrategicMergePatch),
        KindEntry::namespaced(K::StatefulSet, APPS_V1BETA2, "statefulsets").with_mode(StrategicMergePatch),
        // batch
        KindEntry::namespaced(K::Job, BATCH_V1, "jobs").with_mode(DryRunReplace),
        KindEntry::namespaced(K::CronJob, BATCH_V1, "cronjobs"),
        KindEntry::namespaced(K::CronJob, BATCH_V1BETA1, "cronjobs"),
        KindEntry::namespaced(K::CronJob, BATCH_V2ALPHA1, "cronjobs"),
        // autoscaling
        KindEntry::namespaced(K::HorizontalPodAutoscaler, AUTOSCALING_V1, "horizontalpodautoscalers"),
        KindEntry::namespaced(K::HorizontalPodAutoscaler, AUTOSCALING_V2, "horizontalpodautoscalers"),
        KindEntry::namespaced(K::HorizontalPodAutoscaler, AUTOSCALING_V2BETA1, "horizontalpodautoscalers"),
        KindEntry::namespaced(K::HorizontalPodAutoscaler, AUTOSCALING_V2BETA2, "horizontalpodautoscalers"),
        // extensions/v1beta1
        KindEntry::namespaced(K::Deployment, EXTENSIONS_V1BETA1, "deployments"),
        KindEntry::namespaced(K::DaemonSet, EXTENSIONS_V1BETA1, "daemonsets"),
        KindEntry::namespaced(K::ReplicaSet, EXTENSIONS_V1BETA1, "replicasets"),
        KindEntry::namespaced(K::Ingress, EXTENSIONS_V1BETA1, "ingresses"),
        // networking.k8s.io
        KindEntry::namespaced(K::NetworkPolicy, NETWORKING_V1, "networkpolicies"),
        KindEntry::namespaced(K::Ingress, NETWORKING_V1, "ingresses"),
        KindEntry::namespaced(K::Ingress, NETWORKING_V1BETA1, "ingresses"),
    ]
}

/// Read-only lookup table from `(apiVersion, kind)` to a [`KindEntry`].
#[derive(Debug, Clone)]
pub struct ResourceKindRegistry {
    entries: HashMap<(String, String), KindEntry>,
}

impl ResourceKindRegistry {
    /// Builds a registry from a table.
    ///
    /// # Errors
    ///
    /// Returns an error if two entries share an `(apiVersion, kind)`.
    pub fn from_entries(table: impl IntoIterator<Item = KindEntry>) -> Result<Self> {
        let mut entries = HashMap::new();
        for entry in table {
            let key = (entry.api.api_version(), entry.kind.as_str().to_string());
            if entries.insert(key, entry).is_some() {
                return Err(ConfigError::validation_general(format!(
                    "Duplicate registry entry for {}/{}",
                    entry.api, entry.kind
                ))
                .into());
            }
        }
        debug!("Resource kind registry built with {} entries", entries.len());
        Ok(Self { entries })
    }

    /// Builds the registry from [`builtin_entries`].
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in table contains duplicates.
    pub fn builtin() -> Result<Self> {
        Self::from_entries(builtin_entries())
    }

    /// Looks up the entry for a manifest's `apiVersion` and `kind`.
    #[must_use]
    pub fn lookup(&self, api_version: &str, kind: &str) -> Option<&KindEntry> {
        self.entries
            .get(&(api_version.to_string(), kind.to_string()))
    }

    /// Returns all entries, ordered by API group/version then kind.
    #[must_use]
    pub fn entries(&self) -> Vec<&KindEntry> {
        let mut entries: Vec<&KindEntry> = self.entries.values().collect();
        entries.sort_by_key(|e| (e.api, e.kind));
        entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the registry has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
