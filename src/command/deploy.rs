//! The manifest deployment command.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::cluster::ClusterConnector;
use crate::context::DeploymentContext;
use crate::credentials::{CredentialResolver, ResolvedRegistryEndpoint};
use crate::driver::{ApplyReport, ReconciliationDriver};
use crate::error::{ClusterError, KubeDeployError, PipelineError, Result};
use crate::kinds::{LoggingMonitor, ResourceKindRegistry};
use crate::manifest::list_manifest_files;
use crate::naming::prepare_secret_name;

use super::interrupt::InterruptHandle;
use super::pipeline::{Command, CommandContext};
use super::state::DeploymentState;

/// Variable exported with the name of the registry credential secret.
pub const SECRET_NAME_ENV: &str = "KUBERNETES_SECRET_NAME";

/// Resolves credentials, injects registry secrets and applies the
/// workspace manifests.
pub struct DeploymentCommand {
    resolver: Arc<dyn CredentialResolver>,
    connector: Arc<dyn ClusterConnector>,
    registry: Arc<ResourceKindRegistry>,
    interrupt: InterruptHandle,
    pretty: bool,
}

impl fmt::Debug for DeploymentCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentCommand")
            .field("kinds", &self.registry.len())
            .field("interrupted", &self.interrupt.is_interrupted())
            .field("pretty", &self.pretty)
            .finish_non_exhaustive()
    }
}

impl DeploymentCommand {
    /// Creates the command with its own interrupt handle.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn CredentialResolver>,
        connector: Arc<dyn ClusterConnector>,
        registry: Arc<ResourceKindRegistry>,
    ) -> Self {
        Self {
            resolver,
            connector,
            registry,
            interrupt: InterruptHandle::new(),
            pretty: false,
        }
    }

    /// Shares an interrupt handle with the caller.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: InterruptHandle) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Sets the pretty-print flag passed on every cluster call.
    #[must_use]
    pub const fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    async fn deploy(
        &self,
        context: &mut DeploymentContext,
        master_host: &mut Option<String>,
    ) -> Result<ApplyReport> {
        let config = context.config().clone();
        if config.secret_namespace.trim().is_empty() {
            return Err(PipelineError::Precondition {
                message: String::from("Namespace must not be blank"),
            }
            .into());
        }
        if config.configs.trim().is_empty() {
            return Err(PipelineError::Precondition {
                message: String::from("Manifest patterns must not be blank"),
            }
            .into());
        }

        let params = self.resolver.resolve_cluster(&config.kubeconfig).await?;
        let host = params.master_host();
        context.log_status(&format!("Kubernetes master host: {host}"));
        *master_host = Some(host);

        let client = self.connector.connect(&params)?;
        let files = list_manifest_files(context.workspace(), &config.configs)?;
        context.log_status(&format!("Found {} manifest file(s)", files.len()));

        let driver = ReconciliationDriver::new(client, Arc::clone(&self.registry))
            .with_monitor(Arc::new(LoggingMonitor))
            .with_pretty(self.pretty)
            .with_delete_mode(config.delete_resource);

        let mut endpoints = Vec::new();
        for entry in config.registry_credentials() {
            let id = entry.credentials_id.as_deref().unwrap_or_default();
            let token = self.resolver.resolve_registry(id).await?;
            endpoints.push(ResolvedRegistryEndpoint::new(&entry.url, token)?);
        }

        if !endpoints.is_empty() {
            let name = prepare_secret_name(&config.secret_name, context.run_display_name(), context.env())?;
            driver
                .create_or_replace_secrets(&config.secret_namespace, &name, &endpoints)
                .await?;
            context.log_status(&format!(
                "Registry credentials stored in secret {}/{name}",
                config.secret_namespace
            ));
            context.set_extra_env(SECRET_NAME_ENV, name);
        }

        driver.apply_files(&files).await
    }
}

/// Hex SHA-256 of the master host, safe to put in telemetry.
fn host_fingerprint(host: Option<&str>) -> String {
    host.map(|h| hex::encode(Sha256::digest(h.as_bytes())))
        .unwrap_or_default()
}

#[async_trait]
impl Command<DeploymentContext> for DeploymentCommand {
    async fn execute(&self, context: &mut DeploymentContext) {
        let mut master_host = None;
        let outcome = tokio::select! {
            biased;
            () = self.interrupt.interrupted() => Err(KubeDeployError::from(ClusterError::Interrupted)),
            result = self.deploy(context, &mut master_host) => result,
        };
        let fingerprint = host_fingerprint(master_host.as_deref());

        match outcome {
            Ok(report) => {
                info!(event = "Deployed", master_host = %fingerprint, "{report}");
                context.log_status(&format!("Deployment finished: {report}"));
                context.set_report(report);
                context.set_state(DeploymentState::Success);
            }
            Err(e) => {
                info!(event = "DeployFailed", master_host = %fingerprint);
                if e.is_interrupted() {
                    debug!("Deployment interrupted, keeping the interrupt flag set");
                    self.interrupt.interrupt();
                }
                context.log_error(&format!("Deployment failed: {e}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use super::*;
    use crate::cluster::ClusterApi;
    use crate::cluster::memory::MemoryCluster;
    use crate::config::{DeployConfig, DockerCredential};
    use crate::credentials::{ConnectionParams, RegistryToken};
    use crate::error::ConfigError;
    use crate::naming::SECRET_NAME_PREFIX;
    use mockall::mock;
    use tempfile::TempDir;

    mock! {
        Resolver {}

        #[async_trait]
        impl CredentialResolver for Resolver {
            async fn resolve_cluster(&self, reference: &str) -> Result<ConnectionParams>;
            async fn resolve_registry(&self, credentials_id: &str) -> Result<RegistryToken>;
        }
    }

    struct MemoryConnector(Arc<MemoryCluster>);

    impl ClusterConnector for MemoryConnector {
        fn connect(&self, _params: &ConnectionParams) -> Result<Arc<dyn ClusterApi>> {
            Ok(self.0.clone())
        }
    }

    const MANIFEST: &str = r"
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
  namespace: apps
---
apiVersion: v1
kind: Namespace
metadata:
  name: apps
";

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("k8s")).unwrap();
        std::fs::write(dir.path().join("k8s").join("app.yaml"), MANIFEST).unwrap();
        dir
    }

    fn config() -> DeployConfig {
        DeployConfig {
            configs: String::from("k8s/*.yaml"),
            docker_credentials: vec![
                DockerCredential {
                    url: String::from("registry.example.com"),
                    credentials_id: Some(String::from("acr")),
                },
                DockerCredential {
                    url: String::from("anonymous.example.com"),
                    credentials_id: None,
                },
            ],
            ..DeployConfig::default()
        }
    }

    fn resolver() -> MockResolver {
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve_cluster()
            .returning(|_| Ok(ConnectionParams::new("https://k8s.example.com:6443")));
        resolver
            .expect_resolve_registry()
            .withf(|id| id == "acr")
            .times(1)
            .returning(|_| {
                Ok(RegistryToken {
                    email: String::from("ci"),
                    token: String::from("Y2k6c2VjcmV0"),
                })
            });
        resolver
    }

    fn command(resolver: MockResolver, cluster: &Arc<MemoryCluster>) -> DeploymentCommand {
        DeploymentCommand::new(
            Arc::new(resolver),
            Arc::new(MemoryConnector(cluster.clone())),
            Arc::new(ResourceKindRegistry::builtin().unwrap()),
        )
    }

    fn deploy_context(config: DeployConfig, root: &Path) -> DeploymentContext {
        DeploymentContext::new(config, root, "Build #12").with_env(HashMap::new())
    }

    #[tokio::test]
    async fn test_deploy_injects_secret_and_applies() {
        let dir = workspace();
        let cluster = Arc::new(MemoryCluster::new());
        let mut context = deploy_context(config(), dir.path());

        command(resolver(), &cluster).execute(&mut context).await;

        assert_eq!(context.state(), DeploymentState::Success);
        let secret_name = context.extra_env_vars().get(SECRET_NAME_ENV).unwrap().clone();
        assert!(secret_name.starts_with(&format!("{SECRET_NAME_PREFIX}build--12")));

        assert!(cluster.contains_path(&format!("/api/v1/namespaces/default/secrets/{secret_name}")));
        assert_eq!(
            cluster.writes(),
            vec![
                "POST /api/v1/namespaces/default/secrets",
                "POST /api/v1/namespaces",
                "POST /api/v1/namespaces/apps/configmaps",
            ]
        );

        let report = context.report().unwrap();
        assert_eq!(report.created, 2);
    }

    #[tokio::test]
    async fn test_configured_secret_name_is_expanded() {
        let dir = workspace();
        let cluster = Arc::new(MemoryCluster::new());
        let config = DeployConfig {
            secret_name: String::from("${TEAM}-pull"),
            secret_namespace: String::from("apps"),
            ..config()
        };
        let mut context = DeploymentContext::new(config, dir.path(), "ignored")
            .with_env(HashMap::from([(String::from("TEAM"), String::from("web"))]));

        command(resolver(), &cluster).execute(&mut context).await;

        assert_eq!(context.state(), DeploymentState::Success);
        assert_eq!(
            context.extra_env_vars().get(SECRET_NAME_ENV).map(String::as_str),
            Some("web-pull")
        );
        assert!(cluster.contains_path("/api/v1/namespaces/apps/secrets/web-pull"));
    }

    #[tokio::test]
    async fn test_blank_configs_fail_before_resolving() {
        let dir = workspace();
        let cluster = Arc::new(MemoryCluster::new());
        let mut resolver = MockResolver::new();
        resolver.expect_resolve_cluster().never();
        let config = DeployConfig {
            configs: String::from("  "),
            ..config()
        };
        let mut context = deploy_context(config, dir.path());

        command(resolver, &cluster).execute(&mut context).await;

        assert_eq!(context.state(), DeploymentState::HasError);
        assert!(context.last_error().unwrap().contains("Manifest patterns"));
    }

    #[tokio::test]
    async fn test_credential_failure_is_reported() {
        let dir = workspace();
        let cluster = Arc::new(MemoryCluster::new());
        let mut resolver = MockResolver::new();
        resolver.expect_resolve_cluster().returning(|reference| {
            Err(ConfigError::CredentialResolution {
                reference: reference.to_string(),
                message: String::from("no such kubeconfig"),
            }
            .into())
        });
        let mut context = deploy_context(config(), dir.path());

        command(resolver, &cluster).execute(&mut context).await;

        assert!(context.state().is_error());
        assert!(context.last_error().unwrap().contains("no such kubeconfig"));
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_matching_files() {
        let dir = TempDir::new().unwrap();
        let cluster = Arc::new(MemoryCluster::new());
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve_cluster()
            .returning(|_| Ok(ConnectionParams::new("not a url")));
        let mut context = deploy_context(config(), dir.path());

        command(resolver, &cluster).execute(&mut context).await;

        assert!(context.state().is_error());
        assert!(context.last_error().unwrap().contains("No matching manifest files"));
    }

    #[tokio::test]
    async fn test_interrupt_stops_deployment() {
        let dir = workspace();
        let cluster = Arc::new(MemoryCluster::new());
        let interrupt = InterruptHandle::new();
        interrupt.interrupt();
        let mut resolver = MockResolver::new();
        resolver.expect_resolve_cluster().never();
        let command = command(resolver, &cluster).with_interrupt(interrupt.clone());
        let mut context = deploy_context(config(), dir.path());

        command.execute(&mut context).await;

        assert!(context.state().is_error());
        assert!(context.last_error().unwrap().contains("interrupted"));
        assert!(interrupt.is_interrupted());
        assert!(cluster.calls().is_empty());
        assert!(format!("{command:?}").contains("interrupted: true"));
    }

    #[tokio::test]
    async fn test_delete_mode() {
        let dir = workspace();
        let cluster = Arc::new(MemoryCluster::new());
        let mut context = deploy_context(config(), dir.path());
        command(resolver(), &cluster).execute(&mut context).await;

        let delete = DeployConfig {
            delete_resource: true,
            docker_credentials: Vec::new(),
            ..config()
        };
        let mut context = deploy_context(delete, dir.path());
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve_cluster()
            .returning(|_| Ok(ConnectionParams::new("https://k8s.example.com")));
        command(resolver, &cluster).with_pretty(true).execute(&mut context).await;

        assert_eq!(context.state(), DeploymentState::Success);
        assert_eq!(context.report().unwrap().deleted, 2);
        assert!(context.extra_env_vars().is_empty());
    }

    #[test]
    fn test_host_fingerprint() {
        assert_eq!(host_fingerprint(None), "");
        assert_eq!(
            host_fingerprint(Some("k8s.example.com")),
            hex::encode(Sha256::digest(b"k8s.example.com"))
        );
        assert_eq!(host_fingerprint(Some("a")).len(), 64);
    }
}
