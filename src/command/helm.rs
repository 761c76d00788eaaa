//! Release management commands.
//!
//! Chart loading and the release backend are external: this module only
//! drives a [`ReleaseManager`] and decides between install and upgrade.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::config::{ChartSource, HelmConfig};
use crate::error::{ConfigError, ReleaseError, Result};

use super::pipeline::{Command, CommandContext};
use super::state::DeploymentState;

/// Status of a release as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
    /// Installed and current.
    Deployed,
    /// The last operation failed.
    Failed,
    /// Replaced by a newer revision.
    Superseded,
    /// Uninstalled with history kept.
    Deleted,
    /// An operation is in progress.
    Pending,
    /// Anything else.
    Unknown,
}

impl ReleaseStatus {
    /// Whether an existing release in this status is upgraded in place.
    #[must_use]
    pub const fn is_upgradable(self) -> bool {
        matches!(self, Self::Deployed | Self::Failed)
    }
}

/// A release known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Release name.
    pub name: String,
    /// Namespace the release lives in.
    pub namespace: String,
    /// Current status.
    pub status: ReleaseStatus,
    /// Current revision.
    pub revision: u32,
}

impl fmt::Display for ReleaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} revision {} ({:?})",
            self.namespace, self.name, self.revision, self.status
        )
    }
}

/// Parameters of a fresh install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Release name.
    pub release_name: String,
    /// Target namespace.
    pub namespace: String,
    /// Chart to install.
    pub chart: ChartSource,
    /// Values as a YAML document; empty for none.
    pub values: String,
    /// Operation timeout in seconds.
    pub timeout_secs: u64,
    /// Waits for resources to become ready.
    pub wait: bool,
}

/// Parameters of an upgrade of an existing release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeRequest {
    /// Install parameters reused for the upgrade.
    pub install: InstallRequest,
    /// Replaces resources that cannot be patched.
    pub force: bool,
    /// Restarts pods of the release.
    pub recreate: bool,
}

/// Release backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseManager: Send + Sync {
    /// Finds a release by name in any namespace.
    async fn find_release(&self, name: &str) -> Result<Option<ReleaseInfo>>;

    /// Installs a new release.
    async fn install(&self, request: &InstallRequest) -> Result<ReleaseInfo>;

    /// Upgrades an existing release.
    async fn upgrade(&self, request: &UpgradeRequest) -> Result<ReleaseInfo>;

    /// Rolls a release back to `revision` (0 for the previous one).
    async fn rollback(&self, name: &str, revision: u32) -> Result<ReleaseInfo>;
}

/// Converts `a=b,c.d=e` overrides into a nested YAML document.
///
/// Scalars keep their YAML type (`true`, `3`), everything else stays a
/// string. Blank input yields an empty document.
///
/// # Errors
///
/// Returns an error for an entry without `=`, an empty key, or a key that
/// is both a scalar and a parent of another key.
pub fn set_values_to_yaml(input: &str) -> Result<String> {
    let invalid = |message: String| ReleaseError::InvalidValues {
        input: input.to_string(),
        message,
    };

    let mut root = Mapping::new();
    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, raw) = entry
            .split_once('=')
            .ok_or_else(|| invalid(format!("'{entry}' is not a key=value pair")))?;
        let path: Vec<&str> = key.trim().split('.').map(str::trim).collect();
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(invalid(format!("'{key}' is not a valid key")).into());
        }

        let mut current = &mut root;
        for segment in &path[..path.len() - 1] {
            let slot = current
                .entry(Value::from(*segment))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            current = slot
                .as_mapping_mut()
                .ok_or_else(|| invalid(format!("'{segment}' is already set to a scalar")))?;
        }
        current.insert(Value::from(path[path.len() - 1]), scalar(raw.trim()));
    }

    if root.is_empty() {
        return Ok(String::new());
    }
    serde_yaml::to_string(&root).map_err(|e| invalid(e.to_string()).into())
}

fn scalar(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_))) => value,
        _ => Value::from(raw),
    }
}

/// Installs a release, or upgrades it when it already exists in a state
/// that allows it.
pub struct HelmInstallCommand {
    manager: Arc<dyn ReleaseManager>,
    settings: HelmConfig,
}

impl fmt::Debug for HelmInstallCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelmInstallCommand")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl HelmInstallCommand {
    /// Creates the command.
    #[must_use]
    pub fn new(manager: Arc<dyn ReleaseManager>, settings: HelmConfig) -> Self {
        Self { manager, settings }
    }

    async fn run(&self) -> Result<ReleaseInfo> {
        let chart = self
            .settings
            .chart
            .clone()
            .ok_or_else(|| ConfigError::validation("A chart location is required", "helm.chart"))?;
        let install = InstallRequest {
            release_name: self.settings.release_name.clone(),
            namespace: self.settings.namespace.clone(),
            chart,
            values: set_values_to_yaml(&self.settings.set_values)?,
            timeout_secs: self.settings.timeout_secs,
            wait: self.settings.wait,
        };

        let existing = self.manager.find_release(&install.release_name).await?;
        match existing {
            Some(release) if release.namespace != install.namespace => Err(ReleaseError::NameInUse {
                namespace: release.namespace,
            }
            .into()),
            Some(release) if release.status.is_upgradable() => {
                debug!("Upgrading existing release {release}");
                let request = UpgradeRequest {
                    install,
                    force: true,
                    recreate: true,
                };
                completed("upgrade", self.manager.upgrade(&request).await?)
            }
            _ => {
                debug!("Installing release {} from {}", install.release_name, install.chart);
                completed("install", self.manager.install(&install).await?)
            }
        }
    }
}

/// Rejects a release the backend reports as failed after `operation`.
fn completed(operation: &str, release: ReleaseInfo) -> Result<ReleaseInfo> {
    if release.status == ReleaseStatus::Failed {
        return Err(ReleaseError::operation(operation, format!("release {release} ended in a failed state")).into());
    }
    Ok(release)
}

#[async_trait]
impl<C: CommandContext> Command<C> for HelmInstallCommand {
    async fn execute(&self, context: &mut C) {
        match self.run().await {
            Ok(release) => {
                info!(event = "HelmDeployed", release = %release.name, revision = release.revision);
                context.log_status(&format!("Release {release} deployed"));
                context.set_state(DeploymentState::Success);
            }
            Err(e) => context.log_error(&e.to_string()),
        }
    }
}

/// Rolls a release back to a given revision.
pub struct HelmRollbackCommand {
    manager: Arc<dyn ReleaseManager>,
    release_name: String,
    revision: u32,
}

impl fmt::Debug for HelmRollbackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelmRollbackCommand")
            .field("release_name", &self.release_name)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl HelmRollbackCommand {
    /// Creates the command.
    #[must_use]
    pub fn new(manager: Arc<dyn ReleaseManager>, release_name: impl Into<String>, revision: u32) -> Self {
        Self {
            manager,
            release_name: release_name.into(),
            revision,
        }
    }
}

#[async_trait]
impl<C: CommandContext> Command<C> for HelmRollbackCommand {
    async fn execute(&self, context: &mut C) {
        let result = self
            .manager
            .rollback(&self.release_name, self.revision)
            .await
            .and_then(|release| completed("rollback", release));
        match result {
            Ok(release) => {
                context.log_status(&format!("Release {release} rolled back"));
                context.set_state(DeploymentState::Success);
            }
            Err(e) => context.log_error(&format!("Rollback of {} failed: {e}", self.release_name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        state: DeploymentState,
        lines: Vec<String>,
    }

    impl CommandContext for Recorder {
        fn state(&self) -> DeploymentState {
            self.state
        }

        fn set_state(&mut self, state: DeploymentState) {
            self.state = state;
        }

        fn log_status(&mut self, message: &str) {
            self.lines.push(message.to_string());
        }

        fn log_error(&mut self, message: &str) {
            self.lines.push(message.to_string());
            self.state = DeploymentState::HasError;
        }
    }

    fn settings() -> HelmConfig {
        HelmConfig {
            release_name: String::from("web"),
            namespace: String::from("apps"),
            chart: Some(ChartSource::Uri(String::from("charts/web-1.0.0.tgz"))),
            set_values: String::from("image.tag=1.4,replicas=2"),
            ..HelmConfig::default()
        }
    }

    fn release(namespace: &str, status: ReleaseStatus) -> ReleaseInfo {
        ReleaseInfo {
            name: String::from("web"),
            namespace: namespace.to_string(),
            status,
            revision: 4,
        }
    }

    #[test]
    fn test_set_values_nesting() {
        let yaml = set_values_to_yaml("image.repository=nginx, image.tag=1.25,replicas=3,debug=true").unwrap();
        let value: Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(value["image"]["repository"], Value::from("nginx"));
        assert_eq!(value["image"]["tag"], Value::from(1.25));
        assert_eq!(value["replicas"], Value::from(3));
        assert_eq!(value["debug"], Value::from(true));
        assert_eq!(set_values_to_yaml("  ").unwrap(), "");
    }

    #[test]
    fn test_set_values_errors() {
        assert!(set_values_to_yaml("novalue").is_err());
        assert!(set_values_to_yaml("a..b=1").is_err());
        let err = set_values_to_yaml("a=1,a.b=2").unwrap_err();
        assert!(err.to_string().contains("already set"));
    }

    #[tokio::test]
    async fn test_install_when_release_absent() {
        let mut manager = MockReleaseManager::new();
        manager
            .expect_find_release()
            .withf(|name| name == "web")
            .returning(|_| Ok(None));
        manager
            .expect_install()
            .withf(|req| req.namespace == "apps" && req.values.contains("tag"))
            .times(1)
            .returning(|req| Ok(release(&req.namespace, ReleaseStatus::Deployed)));
        manager.expect_upgrade().never();

        let command = HelmInstallCommand::new(Arc::new(manager), settings());
        let mut context = Recorder::default();
        command.execute(&mut context).await;
        assert_eq!(context.state, DeploymentState::Success);
    }

    #[tokio::test]
    async fn test_upgrade_deployed_release_with_force() {
        let mut manager = MockReleaseManager::new();
        manager
            .expect_find_release()
            .returning(|_| Ok(Some(release("apps", ReleaseStatus::Failed))));
        manager
            .expect_upgrade()
            .withf(|req| req.force && req.recreate && req.install.release_name == "web")
            .times(1)
            .returning(|_| Ok(release("apps", ReleaseStatus::Deployed)));
        manager.expect_install().never();

        let command = HelmInstallCommand::new(Arc::new(manager), settings());
        let mut context = Recorder::default();
        command.execute(&mut context).await;
        assert_eq!(context.state, DeploymentState::Success);
        assert!(format!("{command:?}").contains("web"));
    }

    #[tokio::test]
    async fn test_superseded_release_is_installed() {
        let mut manager = MockReleaseManager::new();
        manager
            .expect_find_release()
            .returning(|_| Ok(Some(release("apps", ReleaseStatus::Superseded))));
        manager
            .expect_install()
            .times(1)
            .returning(|_| Err(ReleaseError::operation("install", "cannot re-use a name that is still in use").into()));

        let command = HelmInstallCommand::new(Arc::new(manager), settings());
        let mut context = Recorder::default();
        command.execute(&mut context).await;
        assert_eq!(context.state, DeploymentState::HasError);
        assert!(context.lines[0].contains("still in use"));
    }

    #[tokio::test]
    async fn test_name_in_other_namespace_is_error() {
        let mut manager = MockReleaseManager::new();
        manager
            .expect_find_release()
            .returning(|_| Ok(Some(release("other", ReleaseStatus::Deployed))));
        manager.expect_install().never();
        manager.expect_upgrade().never();

        let command = HelmInstallCommand::new(Arc::new(manager), settings());
        let mut context = Recorder::default();
        command.execute(&mut context).await;
        assert_eq!(context.state, DeploymentState::HasError);
        assert!(context.lines[0].contains("Release name has been used in namespace other"));
    }

    #[tokio::test]
    async fn test_rollback() {
        let mut manager = MockReleaseManager::new();
        manager
            .expect_rollback()
            .withf(|name, revision| name == "web" && *revision == 2)
            .times(1)
            .returning(|_, _| Ok(release("apps", ReleaseStatus::Deployed)));

        let command = HelmRollbackCommand::new(Arc::new(manager), "web", 2);
        let mut context = Recorder::default();
        command.execute(&mut context).await;
        assert_eq!(context.state, DeploymentState::Success);
        assert!(format!("{command:?}").contains("revision: 2"));
    }

    #[tokio::test]
    async fn test_rollback_failure() {
        let mut manager = MockReleaseManager::new();
        manager
            .expect_rollback()
            .returning(|_, _| Err(ReleaseError::operation("rollback", "no revision 9").into()));

        let command = HelmRollbackCommand::new(Arc::new(manager), "web", 9);
        let mut context = Recorder::default();
        command.execute(&mut context).await;
        assert!(context.state.is_error());
    }

    #[tokio::test]
    async fn test_install_ending_failed_is_error() {
        let mut manager = MockReleaseManager::new();
        manager.expect_find_release().returning(|_| Ok(None));
        manager
            .expect_install()
            .times(1)
            .returning(|req| Ok(release(&req.namespace, ReleaseStatus::Failed)));

        let command = HelmInstallCommand::new(Arc::new(manager), settings());
        let mut context = Recorder::default();
        command.execute(&mut context).await;
        assert_eq!(context.state, DeploymentState::HasError);
        assert!(context.lines[0].contains("Release operation 'install' failed"));
        assert!(context.lines[0].contains("apps/web revision 4"));
    }

    #[tokio::test]
    async fn test_rollback_ending_failed_is_error() {
        let mut manager = MockReleaseManager::new();
        manager
            .expect_rollback()
            .returning(|_, _| Ok(release("apps", ReleaseStatus::Failed)));

        let command = HelmRollbackCommand::new(Arc::new(manager), "web", 3);
        let mut context = Recorder::default();
        command.execute(&mut context).await;
        assert!(context.state.is_error());
        assert!(context.lines[0].contains("Release operation 'rollback' failed"));
    }
}
