//! Cluster API client backed by `kube`.

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{ApiResource, DeleteParams, DynamicObject, GetParams, Patch, PatchParams, PostParams};
use kube::core::Request;
use kube::{Client, Resource};
use serde_json::Value;
use tracing::{debug, trace};

use crate::credentials::ConnectionParams;
use crate::error::{ClusterError, KubeDeployError, Result};

use super::api::{ClusterApi, ObjectRef, PropagationPolicy, RequestOptions};

/// Default read timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Cluster API client over a `kube::Client`.
#[derive(Clone)]
pub struct KubeClusterClient {
    /// Underlying client; carries TLS, auth and refresh of exec tokens.
    client: Client,
    /// API server URL.
    server: String,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient")
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Creates a client from resolved connection parameters.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid, or if the TLS or auth
    /// material cannot be loaded.
    pub fn new(params: &ConnectionParams) -> Result<Self> {
        Self::with_timeout(params, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom read timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid, or if the TLS or auth
    /// material cannot be loaded.
    pub fn with_timeout(params: &ConnectionParams, timeout_secs: u64) -> Result<Self> {
        let mut config = params.config.clone().ok_or_else(|| {
            ClusterError::network(format!("Invalid cluster URL: {}", params.server))
        })?;
        config.read_timeout = Some(Duration::from_secs(timeout_secs));

        let client = Client::try_from(config)
            .map_err(|e| ClusterError::network(format!("Failed to create cluster client: {e}")))?;

        Ok(Self {
            client,
            server: params.server.clone(),
        })
    }

    /// Builds the request helper for the collection `target` belongs to.
    fn resource_request(target: &ObjectRef) -> Request {
        let api_version = if target.group.is_empty() {
            target.version.clone()
        } else {
            format!("{}/{}", target.group, target.version)
        };
        let resource = ApiResource {
            group: target.group.clone(),
            version: target.version.clone(),
            api_version,
            kind: target.kind.clone(),
            plural: target.plural.clone(),
        };
        Request::new(DynamicObject::url_path(&resource, target.namespace.as_deref()))
    }

    fn name(target: &ObjectRef) -> &str {
        target.name.as_deref().unwrap_or_default()
    }

    /// Sends a built request and maps the outcome onto the error taxonomy.
    async fn send(
        &self,
        request: std::result::Result<http::Request<Vec<u8>>, kube::core::request::Error>,
        target: &ObjectRef,
        options: RequestOptions,
    ) -> Result<Value> {
        let mut request = request.map_err(|e| {
            KubeDeployError::Cluster(ClusterError::InvalidResponse {
                message: format!("Failed to build request for {target}: {e}"),
            })
        })?;
        append_pretty(&mut request, options.pretty)?;

        trace!("Sending {} {}", request.method(), request.uri());

        self.client
            .request::<Value>(request)
            .await
            .map_err(|e| Self::map_error(e, target))
    }

    fn map_error(error: kube::Error, target: &ObjectRef) -> KubeDeployError {
        match error {
            kube::Error::Api(response) if response.code == 404 => {
                debug!("{target} not found");
                ClusterError::NotFound {
                    kind: target.kind.clone(),
                    name: Self::name(target).to_string(),
                }
                .into()
            }
            kube::Error::Api(response) => {
                let code = response.code;
                let body = serde_json::to_string(&response).unwrap_or(response.message);
                ClusterError::api_error(code, body).into()
            }
            kube::Error::SerdeError(e) => ClusterError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            }
            .into(),
            other => ClusterError::network(format!("Request failed: {other}")).into(),
        }
    }
}

/// Adds the `pretty` query parameter the API server formats responses by.
fn append_pretty(request: &mut http::Request<Vec<u8>>, pretty: bool) -> Result<()> {
    let uri = request.uri().to_string();
    let separator = if uri.ends_with('?') {
        ""
    } else if uri.contains('?') {
        "&"
    } else {
        "?"
    };
    *request.uri_mut() = format!("{uri}{separator}pretty={pretty}")
        .parse::<http::Uri>()
        .map_err(|e| ClusterError::InvalidResponse {
            message: format!("Invalid request URI {uri}: {e}"),
        })?;
    Ok(())
}

fn post_params(options: RequestOptions) -> PostParams {
    PostParams {
        dry_run: options.dry_run,
        ..PostParams::default()
    }
}

fn delete_params(options: RequestOptions) -> DeleteParams {
    let mut params = match options.propagation_policy {
        Some(PropagationPolicy::Background) => DeleteParams::background(),
        Some(PropagationPolicy::Foreground) => DeleteParams::foreground(),
        Some(PropagationPolicy::Orphan) => DeleteParams::orphan(),
        None => DeleteParams::default(),
    };
    params.dry_run = options.dry_run;
    params
}

fn to_bytes(body: &Value) -> Result<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| KubeDeployError::Internal(format!("Failed to encode body: {e}")))
}

#[async_trait]
impl ClusterApi for KubeClusterClient {
    async fn get(&self, target: &ObjectRef, options: RequestOptions) -> Result<Value> {
        let request = Self::resource_request(target).get(Self::name(target), &GetParams::default());
        self.send(request, target, options).await
    }

    async fn create(
        &self,
        target: &ObjectRef,
        body: &Value,
        options: RequestOptions,
    ) -> Result<Value> {
        let request = Self::resource_request(target).create(&post_params(options), to_bytes(body)?);
        self.send(request, target, options).await
    }

    async fn replace(
        &self,
        target: &ObjectRef,
        body: &Value,
        options: RequestOptions,
    ) -> Result<Value> {
        let request = Self::resource_request(target).replace(
            Self::name(target),
            &post_params(options),
            to_bytes(body)?,
        );
        self.send(request, target, options).await
    }

    async fn patch(
        &self,
        target: &ObjectRef,
        body: &Value,
        options: RequestOptions,
    ) -> Result<Value> {
        let params = PatchParams {
            dry_run: options.dry_run,
            ..PatchParams::default()
        };
        let request = Self::resource_request(target).patch(
            Self::name(target),
            &params,
            &Patch::Strategic(body),
        );
        self.send(request, target, options).await
    }

    async fn delete(&self, target: &ObjectRef, options: RequestOptions) -> Result<Value> {
        let request = Self::resource_request(target).delete(Self::name(target), &delete_params(options));
        self.send(request, target, options).await
    }

    fn server(&self) -> &str {
        &self.server
    }
}
