//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kcd - Kubernetes manifest deployment step.
#[derive(Parser, Debug)]
#[command(name = "kcd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "KCD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log line format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Workspace root manifest patterns are resolved against.
    #[arg(short, long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    /// Display name of the host run.
    #[arg(long, global = true, env = "KCD_RUN_NAME")]
    pub run_name: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for the configured deploy type.
    Deploy {
        /// Use the cluster API's pretty-printed responses.
        #[arg(long)]
        pretty: bool,
    },

    /// Delete the resources described by the workspace manifests.
    Delete {
        /// Use the cluster API's pretty-printed responses.
        #[arg(long)]
        pretty: bool,
    },

    /// Validate the deployment configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// List the supported resource kinds.
    Kinds,

    /// Print the registry secret name a deployment would use.
    SecretName {
        /// Configured name; may reference `$VAR` or `${VAR}`.
        #[arg(default_value = "")]
        name: String,

        /// Fallback used when the configured name is blank.
        #[arg(short, long)]
        default: Option<String>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Log line format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
