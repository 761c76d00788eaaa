//! Observers notified after each successful mutation.

use serde_json::Value;
use tracing::debug;

use super::kind::ResourceKind;

/// Observer invoked once per mutated resource.
///
/// `original` is the object found on the cluster before the change, or
/// `None` when the object was created.
pub trait UpdateMonitor: Send + Sync {
    /// Called after a resource of `kind` was created or updated.
    fn on_kind_update(&self, kind: ResourceKind, original: Option<&Value>, updated: &Value);
}

/// Monitor that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl UpdateMonitor for NoopMonitor {
    fn on_kind_update(&self, _kind: ResourceKind, _original: Option<&Value>, _updated: &Value) {}
}

/// Monitor that emits a debug event per notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMonitor;

impl UpdateMonitor for LoggingMonitor {
    fn on_kind_update(&self, kind: ResourceKind, original: Option<&Value>, updated: &Value) {
        let name = updated["metadata"]["name"].as_str().unwrap_or_default();
        let version = updated["metadata"]["resourceVersion"].as_str().unwrap_or_default();
        if original.is_some() {
            debug!(kind = %kind, name, version, "Resource updated");
        } else {
            debug!(kind = %kind, name, version, "Resource created");
        }
    }
}
