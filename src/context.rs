//! Deployment context.
//!
//! A [`DeploymentContext`] carries everything one pipeline run reads and
//! writes: the step configuration, the workspace, the host's environment,
//! variables exported back to the host, the outcome state and the last
//! error line. It is owned by exactly one run.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::cluster::{ClusterConnector, KubeConnector};
use crate::command::{
    CommandContext, CommandId, CommandService, DeploymentCommand, DeploymentState,
    HelmInstallCommand, HelmRollbackCommand, InterruptHandle, ReleaseManager, TransitionInfo,
    TransitionTable,
};
use crate::config::{DeployConfig, DeployType, HelmCommandType};
use crate::credentials::CredentialResolver;
use crate::driver::ApplyReport;
use crate::error::{ConfigError, Result};
use crate::kinds::ResourceKindRegistry;

/// Collaborators the pipeline's commands are built from.
#[derive(Clone)]
pub struct DeploymentServices {
    /// Resolves cluster and registry credentials.
    pub resolver: Arc<dyn CredentialResolver>,
    /// Builds cluster clients.
    pub connector: Arc<dyn ClusterConnector>,
    /// Supported resource kinds.
    pub registry: Arc<ResourceKindRegistry>,
    /// Release backend; required for the `helm` deploy type.
    pub release_manager: Option<Arc<dyn ReleaseManager>>,
    /// Cancellation shared with the caller.
    pub interrupt: InterruptHandle,
    /// Pretty-print flag passed on every cluster call.
    pub pretty: bool,
}

impl fmt::Debug for DeploymentServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentServices")
            .field("kinds", &self.registry.len())
            .field("release_manager", &self.release_manager.is_some())
            .field("pretty", &self.pretty)
            .finish_non_exhaustive()
    }
}

impl DeploymentServices {
    /// Creates services connecting through `kube`, with no release backend.
    #[must_use]
    pub fn new(resolver: Arc<dyn CredentialResolver>, registry: Arc<ResourceKindRegistry>) -> Self {
        Self {
            resolver,
            connector: Arc::new(KubeConnector::new()),
            registry,
            release_manager: None,
            interrupt: InterruptHandle::new(),
            pretty: false,
        }
    }

    /// Replaces the cluster connector.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn ClusterConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Sets the release backend.
    #[must_use]
    pub fn with_release_manager(mut self, manager: Arc<dyn ReleaseManager>) -> Self {
        self.release_manager = Some(manager);
        self
    }

    /// Shares an interrupt handle.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: InterruptHandle) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Sets the pretty-print flag.
    #[must_use]
    pub const fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// State of one deployment run.
#[derive(Debug)]
pub struct DeploymentContext {
    config: DeployConfig,
    workspace: PathBuf,
    run_display_name: String,
    env: HashMap<String, String>,
    extra_env_vars: BTreeMap<String, String>,
    state: DeploymentState,
    last_error: Option<String>,
    report: Option<ApplyReport>,
}

impl DeploymentContext {
    /// Creates a context over the process environment.
    #[must_use]
    pub fn new(
        config: DeployConfig,
        workspace: impl Into<PathBuf>,
        run_display_name: impl Into<String>,
    ) -> Self {
        Self {
            config,
            workspace: workspace.into(),
            run_display_name: run_display_name.into(),
            env: std::env::vars().collect(),
            extra_env_vars: BTreeMap::new(),
            state: DeploymentState::Unknown,
            last_error: None,
            report: None,
        }
    }

    /// Replaces the environment used for `$VAR` expansion.
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Step configuration.
    #[must_use]
    pub const fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Workspace root manifest patterns are resolved against.
    #[must_use]
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Display name of the host run, the default registry secret name.
    #[must_use]
    pub fn run_display_name(&self) -> &str {
        &self.run_display_name
    }

    /// Host environment.
    #[must_use]
    pub const fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Variables exported back to the host.
    #[must_use]
    pub const fn extra_env_vars(&self) -> &BTreeMap<String, String> {
        &self.extra_env_vars
    }

    /// Exports a variable back to the host.
    pub fn set_extra_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extra_env_vars.insert(key.into(), value.into());
    }

    /// Last error line, the top-level failure reason of a failed run.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Report of the last apply batch.
    #[must_use]
    pub const fn report(&self) -> Option<&ApplyReport> {
        self.report.as_ref()
    }

    /// Records the report of an apply batch.
    pub fn set_report(&mut self, report: ApplyReport) {
        self.report = Some(report);
    }

    /// Builds the transition table for the configured deploy type.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown deploy type, or for `helm` without
    /// release settings or a release backend.
    pub fn configure(&self, services: &DeploymentServices) -> Result<TransitionTable<Self>> {
        let mut table = TransitionTable::new();

        match &self.config.deploy_type {
            DeployType::Kubernetes => {
                let command = DeploymentCommand::new(
                    Arc::clone(&services.resolver),
                    Arc::clone(&services.connector),
                    Arc::clone(&services.registry),
                )
                .with_interrupt(services.interrupt.clone())
                .with_pretty(services.pretty);
                table.insert(CommandId::Deploy, TransitionInfo::new(Arc::new(command)));
                table.set_start(CommandId::Deploy);
            }
            DeployType::Helm => {
                let manager = services.release_manager.clone().ok_or_else(|| {
                    ConfigError::validation("No release manager is configured", "helm")
                })?;
                let settings = self.config.helm.clone().ok_or_else(|| {
                    ConfigError::validation("Helm settings are required for deploy type 'helm'", "helm")
                })?;
                match settings.command {
                    HelmCommandType::Install => {
                        let command = HelmInstallCommand::new(manager, settings);
                        table.insert(CommandId::HelmInstall, TransitionInfo::new(Arc::new(command)));
                        table.set_start(CommandId::HelmInstall);
                    }
                    HelmCommandType::Rollback => {
                        let command =
                            HelmRollbackCommand::new(manager, settings.release_name, settings.revision);
                        table.insert(CommandId::HelmRollback, TransitionInfo::new(Arc::new(command)));
                        table.set_start(CommandId::HelmRollback);
                    }
                }
            }
            DeployType::Unknown(value) => {
                return Err(ConfigError::UnknownDeployType {
                    value: value.clone(),
                }
                .into());
            }
        }

        Ok(table)
    }

    /// Configures and runs the pipeline. Returns true on success.
    pub async fn run(&mut self, services: &DeploymentServices) -> bool {
        let table = match self.configure(services) {
            Ok(table) => table,
            Err(e) => {
                self.log_error(&e.to_string());
                return false;
            }
        };
        CommandService::new().execute_commands(&table, self).await
    }
}

impl CommandContext for DeploymentContext {
    fn state(&self) -> DeploymentState {
        self.state
    }

    fn set_state(&mut self, state: DeploymentState) {
        self.state = state;
    }

    fn log_status(&mut self, message: &str) {
        info!("{message}");
    }

    fn log_error(&mut self, message: &str) {
        error!("{message}");
        self.last_error = Some(message.to_string());
        self.state = DeploymentState::HasError;
    }
}
