//! Decoded manifest resources.

use std::fmt;

use serde_json::Value;

use crate::error::{ManifestError, Result};

/// Read access to the identifying metadata of a resource.
pub trait ResourceMetadata {
    /// Declared kind.
    fn kind(&self) -> &str;

    /// `metadata.name`, if present.
    fn name(&self) -> Option<&str>;

    /// `metadata.namespace`, if present.
    fn namespace(&self) -> Option<&str>;
}

/// One decoded declarative object.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestResource {
    api_version: String,
    kind: String,
    body: Value,
}

impl ManifestResource {
    /// Wraps a decoded object, which must carry `apiVersion` and `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object or lacks either field.
    pub fn from_value(body: Value, source_name: &str) -> Result<Self> {
        if !body.is_object() {
            return Err(Self::decode_error(source_name, "document is not an object"));
        }
        let api_version = body["apiVersion"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Self::decode_error(source_name, "missing apiVersion"))?
            .to_string();
        let kind = body["kind"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Self::decode_error(source_name, "missing kind"))?
            .to_string();

        Ok(Self {
            api_version,
            kind,
            body,
        })
    }

    /// Declared `apiVersion`.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Full object body.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Consumes the resource and returns its body.
    #[must_use]
    pub fn into_body(self) -> Value {
        self.body
    }

    /// Returns true for `Namespace` objects.
    #[must_use]
    pub fn is_namespace(&self) -> bool {
        self.kind == "Namespace"
    }

    fn decode_error(source_name: &str, message: &str) -> crate::error::KubeDeployError {
        ManifestError::DecodeFailed {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
        .into()
    }
}

impl ResourceMetadata for ManifestResource {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn name(&self) -> Option<&str> {
        self.body["metadata"]["name"].as_str()
    }

    fn namespace(&self) -> Option<&str> {
        self.body["metadata"]["namespace"].as_str()
    }
}

impl fmt::Display for ManifestResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}",
            self.api_version,
            self.kind,
            self.name().unwrap_or("<unnamed>")
        )
    }
}
