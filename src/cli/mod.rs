//! CLI module for the `kcd` deployment step.
//!
//! This module provides the command-line interface for deploying
//! workspace manifests to a cluster.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat};
pub use output::{DeploymentSummary, OutputFormatter};
