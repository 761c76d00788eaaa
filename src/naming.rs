//! Cluster object naming rules.
//!
//! Kubernetes object names are DNS subdomains: lowercase alphanumerics, `-`
//! and `.`, at most [`NAME_LENGTH_LIMIT`] characters. The registry secret
//! created for a deployment must satisfy the same rules whether the name was
//! configured or derived.

use std::collections::HashMap;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Maximum length of a cluster object name.
pub const NAME_LENGTH_LIMIT: usize = 253;

/// Prefix for derived registry secret names.
pub const SECRET_NAME_PREFIX: &str = "acs-plugin-";

/// Maximum length of the random suffix appended to derived names.
const RANDOM_SUFFIX_LENGTH: usize = 8;

/// Characters used for random suffixes.
const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

static OBJECT_NAME_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").ok()
});

static ENV_REFERENCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").ok()
});

/// Returns true if `name` is a valid cluster object name.
#[must_use]
pub fn is_valid_object_name(name: &str) -> bool {
    name.len() <= NAME_LENGTH_LIMIT
        && OBJECT_NAME_PATTERN
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(name))
}

/// Expands `$VAR` and `${VAR}` references from `env`.
///
/// Unknown references are left untouched.
#[must_use]
pub fn expand_env(input: &str, env: &HashMap<String, String>) -> String {
    let Some(pattern) = ENV_REFERENCE.as_ref() else {
        return input.to_string();
    };

    pattern
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let key = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            env.get(key)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Works out the name of the registry secret for a deployment.
///
/// A configured name (after env expansion) is used verbatim once it passes
/// the object-name rules. Otherwise a name is derived from `default_name`,
/// or from a random UUID when that is blank, prefixed with
/// [`SECRET_NAME_PREFIX`] and suffixed with random characters.
///
/// # Errors
///
/// Returns an error if the configured name is too long or does not match the
/// object-name pattern.
pub fn prepare_secret_name(
    name_cfg: &str,
    default_name: &str,
    env: &HashMap<String, String>,
) -> Result<String> {
    let name = expand_env(name_cfg, env).trim().to_string();
    if name.len() > NAME_LENGTH_LIMIT {
        return Err(ConfigError::InvalidSecretName {
            name,
            reason: format!("longer than {NAME_LENGTH_LIMIT} characters"),
        }
        .into());
    }

    if !name.is_empty() {
        if !is_valid_object_name(&name) {
            return Err(ConfigError::InvalidSecretName {
                name,
                reason: String::from("must consist of lowercase alphanumerics, '-' or '.'"),
            }
            .into());
        }
        return Ok(name);
    }

    let base = if default_name.trim().is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        default_name.to_string()
    };

    let sanitized: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();

    let mut derived = format!("{SECRET_NAME_PREFIX}{sanitized}");
    derived.truncate(NAME_LENGTH_LIMIT);

    let suffix_length = (NAME_LENGTH_LIMIT - derived.len()).min(RANDOM_SUFFIX_LENGTH);
    derived.push_str(&random_suffix(suffix_length));

    if derived.ends_with('-') {
        derived.pop();
        derived.push('a');
    }

    debug!("Derived secret name: {derived}");
    Ok(derived)
}

fn random_suffix(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_valid_object_names() {
        assert!(is_valid_object_name("web"));
        assert!(is_valid_object_name("my-secret.v2"));
        assert!(is_valid_object_name("0abc"));
        assert!(!is_valid_object_name(""));
        assert!(!is_valid_object_name("Web"));
        assert!(!is_valid_object_name("web-"));
        assert!(!is_valid_object_name("under_score"));
        assert!(!is_valid_object_name(&"a".repeat(NAME_LENGTH_LIMIT + 1)));
    }

    #[test]
    fn test_expand_env() {
        let vars = env(&[("BUILD_NUMBER", "42"), ("JOB", "web")]);
        assert_eq!(expand_env("$JOB-${BUILD_NUMBER}", &vars), "web-42");
        assert_eq!(expand_env("${MISSING}-x", &vars), "${MISSING}-x");
        assert_eq!(expand_env("plain", &vars), "plain");
    }

    #[test]
    fn test_configured_name_used_verbatim() {
        let vars = env(&[("BUILD_NUMBER", "7")]);
        let name = prepare_secret_name(" registry-$BUILD_NUMBER ", "ignored", &vars);
        assert_eq!(name.unwrap(), "registry-7");
    }

    #[test]
    fn test_configured_name_rejected() {
        let vars = HashMap::new();
        assert!(prepare_secret_name("Bad_Name", "", &vars).is_err());
        assert!(prepare_secret_name(&"a".repeat(254), "", &vars).is_err());
    }

    #[test]
    fn test_derived_name_from_default() {
        let name = prepare_secret_name("", "#12 Build", &HashMap::new()).unwrap();
        assert!(name.starts_with("acs-plugin--12-build"));
        assert_eq!(name.len(), "acs-plugin--12-build".len() + RANDOM_SUFFIX_LENGTH);
        assert!(is_valid_object_name(&name));
    }

    #[test]
    fn test_derived_name_from_blank_default() {
        for _ in 0..20 {
            let name = prepare_secret_name("  ", "", &HashMap::new()).unwrap();
            assert!(!name.trim().is_empty());
            assert!(name.starts_with(SECRET_NAME_PREFIX));
            assert!(name.len() <= NAME_LENGTH_LIMIT);
            assert!(is_valid_object_name(&name));
        }
    }

    #[test]
    fn test_derived_name_respects_length_limit() {
        let long_default = "x".repeat(400);
        let name = prepare_secret_name("", &long_default, &HashMap::new()).unwrap();
        assert_eq!(name.len(), NAME_LENGTH_LIMIT);
        assert!(is_valid_object_name(&name));
    }

    #[test]
    fn test_trailing_dash_replaced() {
        let default = format!("{}!", "y".repeat(NAME_LENGTH_LIMIT - SECRET_NAME_PREFIX.len() - 1));
        let name = prepare_secret_name("", &default, &HashMap::new()).unwrap();
        assert_eq!(name.len(), NAME_LENGTH_LIMIT);
        assert!(name.ends_with('a'));
        assert!(is_valid_object_name(&name));
    }
}
