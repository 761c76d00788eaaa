//! Container registry credentials.

use std::sync::LazyLock;

use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use url::Url;

use crate::error::{ConfigError, Result};

static URI_SCHEME_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.\-]*://").ok());

/// Scheme assumed for registry URLs given without one.
const DEFAULT_SCHEME: &str = "http://";

/// Docker auth material for one registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryToken {
    /// Email or user name recorded with the auth.
    pub email: String,
    /// Base64 `user:password` token.
    pub token: String,
}

/// A registry URL paired with its resolved token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRegistryEndpoint {
    /// Normalized registry URL.
    pub url: String,
    /// Resolved auth token.
    pub token: RegistryToken,
}

impl ResolvedRegistryEndpoint {
    /// Pairs a registry URL with a token, normalizing the URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid.
    pub fn new(url: &str, token: RegistryToken) -> Result<Self> {
        Ok(Self {
            url: normalize_registry_url(url)?,
            token,
        })
    }
}

/// Prepends `http://` to URLs without a scheme and checks the result parses.
///
/// # Errors
///
/// Returns an error if the URL is not valid after normalization.
pub fn normalize_registry_url(url: &str) -> Result<String> {
    let url = url.trim();
    let has_scheme = URI_SCHEME_PREFIX
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(url));
    let normalized = if has_scheme {
        url.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{url}")
    };

    Url::parse(&normalized).map_err(|e| {
        ConfigError::validation(format!("Invalid registry URL '{url}': {e}"), "docker_credentials")
    })?;
    Ok(normalized)
}

/// Builds docker configuration for private registry authentication.
#[derive(Debug, Clone)]
pub struct DockerConfigBuilder<'a> {
    endpoints: &'a [ResolvedRegistryEndpoint],
}

impl<'a> DockerConfigBuilder<'a> {
    /// Creates a builder over resolved endpoints.
    #[must_use]
    pub const fn new(endpoints: &'a [ResolvedRegistryEndpoint]) -> Self {
        Self { endpoints }
    }

    /// Builds the `{ "<url>": { "email": ..., "auth": ... } }` object.
    #[must_use]
    pub fn auths(&self) -> Value {
        let auths: Map<String, Value> = self
            .endpoints
            .iter()
            .map(|endpoint| {
                (
                    endpoint.url.clone(),
                    json!({ "email": endpoint.token.email, "auth": endpoint.token.token }),
                )
            })
            .collect();
        Value::Object(auths)
    }

    /// Returns the auths object as base64, the `.dockercfg` secret payload.
    #[must_use]
    pub fn dockercfg_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.auths().to_string())
    }
}
