//! kcd CLI entrypoint.
//!
//! This is the main entrypoint for the kcd command-line tool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use kubernetes_cd::cli::{Cli, Commands, DeploymentSummary, LogFormat, OutputFormatter};
use kubernetes_cd::command::{CommandContext, InterruptHandle};
use kubernetes_cd::config::{ConfigParser, ConfigValidator, DeployConfig, find_config_file};
use kubernetes_cd::context::{DeploymentContext, DeploymentServices};
use kubernetes_cd::credentials::LocalCredentialResolver;
use kubernetes_cd::error::Result;
use kubernetes_cd::kinds::ResourceKindRegistry;
use kubernetes_cd::naming::prepare_secret_name;

use chrono::Utc;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Main async entry point. Returns false when the command failed.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);

    match &cli.command {
        Commands::Deploy { pretty } => cmd_deploy(&cli, false, *pretty, &formatter).await,
        Commands::Delete { pretty } => cmd_deploy(&cli, true, *pretty, &formatter).await,
        Commands::Validate { warnings } => cmd_validate(&cli, *warnings, &formatter),
        Commands::Kinds => cmd_kinds(&formatter),
        Commands::SecretName { name, default } => {
            cmd_secret_name(&cli, name, default.as_deref(), &formatter)
        }
    }
}

/// Run the pipeline for the configured deploy type.
async fn cmd_deploy(
    cli: &Cli,
    delete: bool,
    pretty: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let mut config = load_config(cli)?;
    if delete {
        config.delete_resource = true;
    }

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    let mut resolver = LocalCredentialResolver::from_process_env();
    if let Some(context) = config.context.as_deref().filter(|c| !c.trim().is_empty()) {
        resolver = resolver.with_context(context);
    }
    let registry = Arc::new(ResourceKindRegistry::builtin()?);

    let interrupt = InterruptHandle::new();
    spawn_interrupt_listener(interrupt.clone());

    let services = DeploymentServices::new(Arc::new(resolver), registry)
        .with_interrupt(interrupt)
        .with_pretty(pretty);

    let run_name = run_display_name(cli);
    info!(
        "Running {} step '{}' in {}",
        config.deploy_type,
        run_name,
        cli.workspace.display()
    );

    let mut context = DeploymentContext::new(config, &cli.workspace, run_name);
    let success = context.run(&services).await;

    let summary = DeploymentSummary {
        success,
        state: context.state(),
        last_error: context.last_error(),
        extra_env: context.extra_env_vars(),
        report: context.report(),
    };
    println!("{}", formatter.format_deployment(&summary));

    if !success {
        if let Some(reason) = context.last_error() {
            eprintln!("Error: {reason}");
        }
    }

    Ok(success)
}

/// Validate configuration.
fn cmd_validate(cli: &Cli, show_warnings: bool, formatter: &OutputFormatter) -> Result<bool> {
    let config = load_config(cli)?;
    let result = ConfigValidator::new().check(&config);

    println!("{}", formatter.format_validation(&result, show_warnings));

    Ok(result.errors.is_empty())
}

/// List supported kinds.
fn cmd_kinds(formatter: &OutputFormatter) -> Result<bool> {
    let registry = ResourceKindRegistry::builtin()?;
    println!("{}", formatter.format_kinds(&registry.entries()));
    Ok(true)
}

/// Print the derived registry secret name.
fn cmd_secret_name(
    cli: &Cli,
    name: &str,
    default: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let env: HashMap<String, String> = std::env::vars().collect();
    let default_name = default.map_or_else(|| run_display_name(cli), str::to_string);

    let secret_name = prepare_secret_name(name, &default_name, &env)?;
    println!("{}", formatter.format_secret_name(&secret_name));

    Ok(true)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(cli: &Cli) -> Result<PathBuf> {
    cli.config
        .as_ref()
        .map_or_else(|| find_config_file(&cli.workspace), |path| Ok(path.clone()))
}

/// Loads `.env` and the configuration file with env overrides applied.
fn load_config(cli: &Cli) -> Result<DeployConfig> {
    let config_file = resolve_config_path(cli)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new()
        .with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;

    parser.load_with_env(&config_file)
}

/// Display name of the host run.
fn run_display_name(cli: &Cli) -> String {
    cli.run_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("kcd-{}", Utc::now().format("%Y%m%d%H%M%S")))
}

/// Interrupts the pipeline on Ctrl-C.
fn spawn_interrupt_listener(interrupt: InterruptHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling in-flight cluster calls");
            interrupt.interrupt();
        }
    });
}
