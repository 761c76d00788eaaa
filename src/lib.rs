// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # kubernetes_cd
//!
//! A continuous-deployment step that applies Kubernetes manifests from a build
//! workspace and drives packaged releases.
//!
//! ## Overview
//!
//! One run of the step:
//!
//! - Resolves cluster credentials from a kubeconfig
//! - Creates a docker registry secret when registry credentials are configured
//! - Reconciles every manifest resource against the cluster, or deletes it
//! - Exports the secret name back to the build host
//!
//! ## Architecture
//!
//! Two pieces carry the work:
//!
//! 1. **Reconciliation engine**: every supported `(apiVersion, kind)` pair maps
//!    to a registry entry, and each resource goes through the same
//!    read, create-or-replace, notify protocol with per-kind hooks
//! 2. **Command pipeline**: a small state machine that sequences side-effecting
//!    commands and halts on the first error
//!
//! ## Modules
//!
//! - [`config`]: Deploy-step configuration parsing and validation
//! - [`naming`]: Secret name derivation
//! - [`credentials`]: Kubeconfig and registry credential resolution
//! - [`cluster`]: Cluster API transport
//! - [`manifest`]: Manifest decoding and workspace listing
//! - [`kinds`]: Kind registry, resource managers and updaters
//! - [`driver`]: Manifest batch reconciliation
//! - [`command`]: Command pipeline, deployment and release commands
//! - [`context`]: Per-run deployment context
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! deploy_type: kubernetes
//! configs: "k8s/**/*.yaml"
//! secret_namespace: apps
//! docker_credentials:
//!   - url: registry.example.com
//!     credentials_id: ci-registry
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod cluster;
pub mod command;
pub mod config;
pub mod context;
pub mod credentials;
pub mod driver;
pub mod error;
pub mod kinds;
pub mod manifest;
pub mod naming;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use cluster::{ClusterApi, ClusterConnector, KubeClusterClient};
pub use command::{Command, CommandService, DeploymentCommand, DeploymentState, TransitionInfo};
pub use config::{ConfigParser, ConfigValidator, DeployConfig};
pub use context::{DeploymentContext, DeploymentServices};
pub use credentials::{CredentialResolver, LocalCredentialResolver};
pub use driver::{ApplyReport, ReconciliationDriver};
pub use error::{KubeDeployError, Result};
pub use kinds::{ResourceKindRegistry, ResourceManager, ResourceUpdater, UpdateMonitor};
pub use manifest::{ManifestDecoder, ManifestResource};
