//! Cluster API access.
//!
//! This module defines the transport seam used by resource managers, the
//! `kube`-backed implementation that talks to a real API server, and the
//! connector that builds one from resolved credentials.

mod api;
mod client;
mod connector;
#[cfg(test)]
pub(crate) mod memory;

pub use api::{ClusterApi, ObjectRef, PropagationPolicy, RequestOptions};
pub use client::KubeClusterClient;
pub use connector::{ClusterConnector, KubeConnector};
