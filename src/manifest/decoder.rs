//! Manifest document decoding.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ManifestError, Result};

use super::resource::ManifestResource;

/// Decodes raw manifest documents into resources.
pub trait ManifestDecoder: Send + Sync {
    /// Decodes one document (possibly multi-part) into an ordered sequence
    /// of resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be decoded; the whole
    /// document is rejected.
    fn decode(&self, source_name: &str, content: &str) -> Result<Vec<ManifestResource>>;
}

/// Decodes `---` separated YAML (or JSON) documents.
///
/// Empty documents are skipped and `List` objects are flattened into their
/// items.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlManifestDecoder;

impl YamlManifestDecoder {
    /// Creates a decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn push_value(
        value: Value,
        source_name: &str,
        resources: &mut Vec<ManifestResource>,
    ) -> Result<()> {
        let is_list = value["kind"].as_str().is_some_and(|kind| kind == "List")
            && value["items"].is_array();
        if is_list {
            if let Value::Object(mut map) = value {
                if let Some(Value::Array(items)) = map.remove("items") {
                    for item in items {
                        Self::push_value(item, source_name, resources)?;
                    }
                }
            }
            return Ok(());
        }
        resources.push(ManifestResource::from_value(value, source_name)?);
        Ok(())
    }
}

impl ManifestDecoder for YamlManifestDecoder {
    fn decode(&self, source_name: &str, content: &str) -> Result<Vec<ManifestResource>> {
        let mut resources = Vec::new();

        for document in serde_yaml::Deserializer::from_str(content) {
            let yaml = serde_yaml::Value::deserialize(document).map_err(|e| {
                ManifestError::DecodeFailed {
                    source_name: source_name.to_string(),
                    message: format!("YAML parse error: {e}"),
                }
            })?;
            if yaml.is_null() {
                continue;
            }

            let value = serde_json::to_value(yaml).map_err(|e| ManifestError::DecodeFailed {
                source_name: source_name.to_string(),
                message: format!("unsupported document structure: {e}"),
            })?;
            Self::push_value(value, source_name, &mut resources)?;
        }

        debug!("Decoded {} resources from {source_name}", resources.len());
        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ResourceMetadata;

    #[test]
    fn test_multi_document() {
        let content = r"
apiVersion: v1
kind: Namespace
metadata:
  name: apps
---
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: apps
";
        let resources = YamlManifestDecoder::new().decode("app.yaml", content).unwrap();
        assert_eq!(resources.len(), 2);
        assert!(resources[0].is_namespace());
        assert_eq!(resources[1].name(), Some("web"));
    }

    #[test]
    fn test_empty_document() {
        let resources = YamlManifestDecoder::new().decode("empty.yaml", "").unwrap();
        assert!(resources.is_empty());
        let resources = YamlManifestDecoder::new().decode("comments.yaml", "# nothing\n").unwrap();
        assert!(resources.is_empty());
    }

    #[test]
    fn test_list_is_flattened() {
        let content = r#"{"apiVersion": "v1", "kind": "List", "items": [
            {"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}},
            {"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "b"}}
        ]}"#;
        let resources = YamlManifestDecoder::new().decode("list.json", content).unwrap();
        let kinds: Vec<&str> = resources.iter().map(ResourceMetadata::kind).collect();
        assert_eq!(kinds, vec!["ConfigMap", "Secret"]);
    }

    #[test]
    fn test_invalid_yaml_rejects_document() {
        let content = "apiVersion: v1\nkind: [unterminated\n";
        let err = YamlManifestDecoder::new().decode("bad.yaml", content).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }
}
