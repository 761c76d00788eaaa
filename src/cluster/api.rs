//! Cluster API seam.
//!
//! Every remote call made by the reconciliation engine goes through
//! [`ClusterApi`], addressed by an [`ObjectRef`] and shaped by
//! [`RequestOptions`]. Bodies are the cluster's own JSON object model.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Deletion propagation policy for dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropagationPolicy {
    /// Delete dependents in the background.
    Background,
    /// Delete dependents before the owner.
    Foreground,
    /// Leave dependents behind.
    Orphan,
}

impl fmt::Display for PropagationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Background => write!(f, "Background"),
            Self::Foreground => write!(f, "Foreground"),
            Self::Orphan => write!(f, "Orphan"),
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Ask the server to pretty-print its response.
    pub pretty: bool,
    /// Validate and default the request without persisting it.
    pub dry_run: bool,
    /// Propagation policy for deletes.
    pub propagation_policy: Option<PropagationPolicy>,
}

impl RequestOptions {
    /// Creates options with the given pretty flag.
    #[must_use]
    pub const fn new(pretty: bool) -> Self {
        Self {
            pretty,
            dry_run: false,
            propagation_policy: None,
        }
    }

    /// Marks the call as a server-side dry run.
    #[must_use]
    pub const fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Sets the delete propagation policy.
    #[must_use]
    pub const fn with_propagation(mut self, policy: PropagationPolicy) -> Self {
        self.propagation_policy = Some(policy);
        self
    }
}

/// Address of one object, or of a collection when `name` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    /// Kind, used in diagnostics.
    pub kind: String,
    /// API group; empty for the core group.
    pub group: String,
    /// API version.
    pub version: String,
    /// Plural resource name.
    pub plural: String,
    /// Namespace for namespaced kinds.
    pub namespace: Option<String>,
    /// Object name.
    pub name: Option<String>,
}

impl ObjectRef {
    /// Returns the address of the collection this object belongs to.
    #[must_use]
    pub fn collection(&self) -> Self {
        Self {
            name: None,
            ..self.clone()
        }
    }

    /// Returns the request path relative to the API server root.
    #[must_use]
    pub fn path(&self) -> String {
        let mut path = if self.group.is_empty() {
            format!("/api/{}", self.version)
        } else {
            format!("/apis/{}/{}", self.group, self.version)
        };
        if let Some(namespace) = &self.namespace {
            path.push_str("/namespaces/");
            path.push_str(namespace);
        }
        path.push('/');
        path.push_str(&self.plural);
        if let Some(name) = &self.name {
            path.push('/');
            path.push_str(name);
        }
        path
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.namespace, &self.name) {
            (Some(ns), Some(name)) => write!(f, "{} {ns}/{name}", self.kind),
            (None, Some(name)) => write!(f, "{} {name}", self.kind),
            (_, None) => write!(f, "{} collection", self.kind),
        }
    }
}

/// Remote cluster-management API.
///
/// A missing object is reported as
/// [`ClusterError::NotFound`](crate::error::ClusterError::NotFound); every
/// other non-success response as
/// [`ClusterError::ApiRequestFailed`](crate::error::ClusterError::ApiRequestFailed).
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Reads one object.
    async fn get(&self, target: &ObjectRef, options: RequestOptions) -> Result<Value>;

    /// Creates an object in the collection addressed by `target`.
    async fn create(&self, target: &ObjectRef, body: &Value, options: RequestOptions)
    -> Result<Value>;

    /// Replaces one object.
    async fn replace(&self, target: &ObjectRef, body: &Value, options: RequestOptions)
    -> Result<Value>;

    /// Applies a strategic merge patch to one object.
    async fn patch(&self, target: &ObjectRef, body: &Value, options: RequestOptions)
    -> Result<Value>;

    /// Deletes one object and returns the server's status object.
    async fn delete(&self, target: &ObjectRef, options: RequestOptions) -> Result<Value>;

    /// Returns the API server URL.
    fn server(&self) -> &str;
}

#[async_trait]
impl<T: ClusterApi + ?Sized> ClusterApi for Arc<T> {
    async fn get(&self, target: &ObjectRef, options: RequestOptions) -> Result<Value> {
        (**self).get(target, options).await
    }

    async fn create(
        &self,
        target: &ObjectRef,
        body: &Value,
        options: RequestOptions,
    ) -> Result<Value> {
        (**self).create(target, body, options).await
    }

    async fn replace(
        &self,
        target: &ObjectRef,
        body: &Value,
        options: RequestOptions,
    ) -> Result<Value> {
        (**self).replace(target, body, options).await
    }

    async fn patch(
        &self,
        target: &ObjectRef,
        body: &Value,
        options: RequestOptions,
    ) -> Result<Value> {
        (**self).patch(target, body, options).await
    }

    async fn delete(&self, target: &ObjectRef, options: RequestOptions) -> Result<Value> {
        (**self).delete(target, options).await
    }

    fn server(&self) -> &str {
        (**self).server()
    }
}
