//! # Lifecycle Events
//!
//! Synchronous notifications the lifecycle engine sends to presentation
//! layers after a transaction commits. The engine defines the trait; the UI
//! (or a test) implements it, so the engine never depends on its consumers.

use serde::{Deserialize, Serialize};

/// A committed state change observers may react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A component was attached through the scan pipeline.
    ComponentScanned {
        order_id: String,
        package_id: String,
        component_id: String,
    },
    /// A package moved to `completed`.
    PackageCompleted {
        order_id: String,
        package_id: String,
    },
    /// Components went back to `pending` (detach, package delete, undo).
    ComponentsDetached {
        order_id: String,
        component_ids: Vec<String>,
    },
}

impl LifecycleEvent {
    pub fn order_id(&self) -> &str {
        match self {
            LifecycleEvent::ComponentScanned { order_id, .. }
            | LifecycleEvent::PackageCompleted { order_id, .. }
            | LifecycleEvent::ComponentsDetached { order_id, .. } => order_id,
        }
    }
}

/// Receives lifecycle events. Called inline on the mutating task, so
/// implementations must return quickly and must not call back into the engine.
pub trait LifecycleObserver: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}
