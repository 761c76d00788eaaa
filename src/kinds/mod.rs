//! Resource kinds and the reconciliation engine.
//!
//! The [`ResourceKindRegistry`] maps a manifest's `(apiVersion, kind)` to a
//! [`KindEntry`]. The entry's group/version selects the [`ResourceManager`]
//! and its kind tag selects the update hooks applied by the
//! [`ResourceUpdater`].

pub mod hooks;
mod kind;
mod manager;
pub(crate) mod monitor;
mod registry;
mod updater;

pub use kind::ResourceKind;
pub use manager::{ManagerPool, ResourceManager};
pub use monitor::{LoggingMonitor, NoopMonitor, UpdateMonitor};
pub use registry::{ApiGroupVersion, KindEntry, ResourceKindRegistry, UpdateMode, builtin_entries};
pub use updater::{DEFAULT_NAMESPACE, ResourceUpdater, UpdateOutcome};
