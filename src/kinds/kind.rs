//! Supported resource kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of resource kinds the engine knows how to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// `Namespace`.
    Namespace,
    /// `Deployment`.
    Deployment,
    /// `Service`.
    Service,
    /// `ReplicationController`.
    ReplicationController,
    /// `DaemonSet`.
    DaemonSet,
    /// `Job`.
    Job,
    /// `CronJob`.
    CronJob,
    /// `Pod`.
    Pod,
    /// `HorizontalPodAutoscaler`.
    HorizontalPodAutoscaler,
    /// `Secret`.
    Secret,
    /// `ConfigMap`.
    ConfigMap,
    /// `ReplicaSet`.
    ReplicaSet,
    /// `StatefulSet`.
    StatefulSet,
    /// `PersistentVolumeClaim`.
    PersistentVolumeClaim,
    /// `PersistentVolume`.
    PersistentVolume,
    /// `NetworkPolicy`.
    NetworkPolicy,
    /// `Ingress`.
    Ingress,
}

impl ResourceKind {
    /// Returns the kind as written in manifests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Namespace => "Namespace",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::ReplicationController => "ReplicationController",
            Self::DaemonSet => "DaemonSet",
            Self::Job => "Job",
            Self::CronJob => "CronJob",
            Self::Pod => "Pod",
            Self::HorizontalPodAutoscaler => "HorizontalPodAutoscaler",
            Self::Secret => "Secret",
            Self::ConfigMap => "ConfigMap",
            Self::ReplicaSet => "ReplicaSet",
            Self::StatefulSet => "StatefulSet",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::PersistentVolume => "PersistentVolume",
            Self::NetworkPolicy => "NetworkPolicy",
            Self::Ingress => "Ingress",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
