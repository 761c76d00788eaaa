//! Manifest input.
//!
//! This module covers everything between files in the workspace and the
//! resources handed to the reconciliation engine:
//! - Locating manifest files by glob
//! - Decoding documents into resources
//! - Reading identifying metadata from a resource

mod decoder;
mod resource;
mod workspace;

pub use decoder::{ManifestDecoder, YamlManifestDecoder};
pub use resource::{ManifestResource, ResourceMetadata};
pub use workspace::list_manifest_files;
