//! Configuration module for the deploy step.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `kcd.deploy.yaml`
//! - Applying `KCD_*` environment overrides
//! - Validation of configuration values

mod parser;
mod spec;
mod validator;

pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, ENV_PREFIX, find_config_file};
pub use spec::{
    ChartSource, DEFAULT_NAMESPACE, DeployConfig, DeployType, DockerCredential, HelmCommandType,
    HelmConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
