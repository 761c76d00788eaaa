//! Command pipeline.
//!
//! Deployment work is split into [`Command`]s sequenced by a
//! [`TransitionTable`]. Each command reads and writes one shared
//! [`CommandContext`] and reports its outcome as a [`DeploymentState`]:
//! - [`DeploymentCommand`] applies workspace manifests
//! - [`HelmInstallCommand`] and [`HelmRollbackCommand`] drive a
//!   [`ReleaseManager`]

mod deploy;
mod helm;
mod interrupt;
mod pipeline;
mod state;

pub use deploy::{DeploymentCommand, SECRET_NAME_ENV};
pub use helm::{
    HelmInstallCommand, HelmRollbackCommand, InstallRequest, ReleaseInfo, ReleaseManager,
    ReleaseStatus, UpgradeRequest, set_values_to_yaml,
};
pub use interrupt::InterruptHandle;
pub use pipeline::{
    Command, CommandContext, CommandId, CommandService, Transition, TransitionInfo,
    TransitionTable,
};
pub use state::DeploymentState;

#[cfg(test)]
pub(crate) use helm::MockReleaseManager;
