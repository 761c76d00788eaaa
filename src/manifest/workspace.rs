//! Manifest file discovery inside a workspace.
//!
//! Patterns are comma-separated Ant-style globs relative to the workspace
//! root: `**` crosses directories, `*` and `?` stay within one path segment.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ManifestError, Result};

/// Compiles one Ant-style glob into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut regex = String::from("^");
    let mut chars = pattern.trim_start_matches("./").chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    regex.push_str("(?:.*/)?");
                } else {
                    regex.push_str(".*");
                }
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            '\\' => regex.push('/'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');

    Regex::new(&regex).map_err(|e| {
        ManifestError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Lists files under `root` matching any of the comma-separated `patterns`.
///
/// Results are sorted and deduplicated.
///
/// # Errors
///
/// Returns an error if a pattern is invalid or nothing matches.
pub fn list_manifest_files(root: &Path, patterns: &str) -> Result<Vec<PathBuf>> {
    let compiled: Vec<Regex> = patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(glob_to_regex)
        .collect::<Result<_>>()?;

    let mut matches = BTreeSet::new();
    if !compiled.is_empty() {
        for entry in WalkDir::new(root).into_iter().filter_map(std::result::Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if compiled.iter().any(|regex| regex.is_match(&relative)) {
                matches.insert(entry.path().to_path_buf());
            }
        }
    }

    if matches.is_empty() {
        return Err(ManifestError::NoMatchingFiles {
            pattern: patterns.to_string(),
            root: root.to_path_buf(),
        }
        .into());
    }

    debug!("Matched {} manifest files for '{patterns}'", matches.len());
    Ok(matches.into_iter().collect())
}
