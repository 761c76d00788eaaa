//! Configuration parser for loading deploy-step configuration.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{ConfigError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{DeployConfig, DeployType};

/// Prefix of environment variables overriding configuration fields.
pub const ENV_PREFIX: &str = "KCD_";

/// Configuration parser for loading deploy-step configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DeployConfig> {
        debug!("Parsing YAML configuration");

        let config: DeployConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            }
        })?;

        debug!("Parsed configuration for deploy type: {}", config.deploy_type);
        Ok(config)
    }

    /// Loads configuration with overrides from the process environment.
    ///
    /// Variables use the form `KCD_<FIELD>` (e.g. `KCD_SECRET_NAMESPACE`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<DeployConfig> {
        let mut config = self.load_file(path)?;
        let env: HashMap<String, String> = std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        Self::apply_env_overrides(&mut config, &env);
        Ok(config)
    }

    /// Applies `KCD_<FIELD>` overrides from `env` to the configuration.
    pub fn apply_env_overrides(config: &mut DeployConfig, env: &HashMap<String, String>) {
        let var = |field: &str| env.get(&format!("{ENV_PREFIX}{field}")).cloned();

        if let Some(value) = var("DEPLOY_TYPE") {
            debug!("Overriding deploy_type from environment");
            config.deploy_type = DeployType::from(value);
        }
        if let Some(value) = var("KUBECONFIG") {
            debug!("Overriding kubeconfig from environment");
            config.kubeconfig = value;
        }
        if let Some(value) = var("CONTEXT") {
            debug!("Overriding context from environment");
            config.context = Some(value);
        }
        if let Some(value) = var("CONFIGS") {
            debug!("Overriding configs from environment");
            config.configs = value;
        }
        if let Some(value) = var("DELETE_RESOURCE") {
            debug!("Overriding delete_resource from environment");
            config.delete_resource = parse_flag(&value);
        }
        if let Some(value) = var("ENABLE_SUBSTITUTION") {
            debug!("Overriding enable_substitution from environment");
            config.enable_substitution = parse_flag(&value);
        }
        if let Some(value) = var("SECRET_NAME") {
            debug!("Overriding secret_name from environment");
            config.secret_name = value;
        }
        if let Some(value) = var("SECRET_NAMESPACE") {
            debug!("Overriding secret_namespace from environment");
            config.secret_namespace = value;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["kcd.deploy.yaml", "kcd.deploy.yml"];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::{ChartSource, HelmCommandType};
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
configs: k8s/**/*.yaml
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();
        assert_eq!(config.configs, "k8s/**/*.yaml");
        assert_eq!(config.deploy_type, DeployType::Kubernetes);
        assert_eq!(config.secret_namespace, "default");
        assert!(config.docker_credentials.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
deploy_type: helm
kubeconfig: /etc/kcd/kubeconfig
context: staging
configs: "deploy/*.yaml, services/**/*.yml"
delete_resource: false
secret_name: "${BUILD_TAG}-pull"
secret_namespace: apps
docker_credentials:
  - url: registry.example.com
    credentials_id: acr
  - url: https://public.example.com
helm:
  command: install
  release_name: web
  namespace: apps
  chart:
    repository:
      name: web
      version: 2.1.0
      url: https://charts.example.com
  set_values: "image.tag=1.4,replicas=2"
  wait: true
"#;
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();
        assert_eq!(config.deploy_type, DeployType::Helm);
        assert_eq!(config.context.as_deref(), Some("staging"));
        assert_eq!(config.docker_credentials.len(), 2);
        assert_eq!(config.registry_credentials().count(), 1);

        let helm = config.helm.unwrap();
        assert_eq!(helm.command, HelmCommandType::Install);
        assert_eq!(helm.timeout_secs, 300);
        assert!(matches!(helm.chart, Some(ChartSource::Repository { .. })));
    }

    #[test]
    fn test_invalid_yaml_reports_location() {
        let err = ConfigParser::new()
            .parse_yaml("configs: [", Some(Path::new("kcd.deploy.yaml")))
            .unwrap_err();
        assert!(err.to_string().contains("YAML parse error"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = DeployConfig::default();
        let env: HashMap<String, String> = [
            ("KCD_SECRET_NAMESPACE", "ops"),
            ("KCD_DELETE_RESOURCE", "true"),
            ("KCD_DEPLOY_TYPE", "helm"),
            ("KCD_CONFIGS", "all/*.yaml"),
            ("SECRET_NAMESPACE", "ignored"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        ConfigParser::apply_env_overrides(&mut config, &env);

        assert_eq!(config.secret_namespace, "ops");
        assert!(config.delete_resource);
        assert_eq!(config.deploy_type, DeployType::Helm);
        assert_eq!(config.configs, "all/*.yaml");
    }

    #[test]
    fn test_find_config_file_searches_parents() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("kcd.deploy.yaml"), "configs: '*.yaml'\n").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("kcd.deploy.yaml"));

        let config = ConfigParser::new().load_with_env(&found).unwrap();
        assert_eq!(config.configs, "*.yaml");
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ConfigParser::new()
            .load_file(dir.path().join("absent.yaml"))
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_dotenv_without_file() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigParser::new().with_base_path(dir.path()).load_dotenv().is_ok());
    }
}
