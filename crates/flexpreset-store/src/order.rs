//! Panel order tracker.
//!
//! Remembers the user-arranged field order for the active preset,
//! independent of on-disk order. Process lifetime only; never persisted.
//! When empty, callers fall back to on-disk order.

use tokio::sync::RwLock;

/// In-memory record of user-intended field ordering.
#[derive(Debug, Default)]
pub struct PanelOrderTracker {
    order: RwLock<Vec<String>>,
}

impl PanelOrderTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current order, oldest arrangement first.
    pub async fn get(&self) -> Vec<String> {
        self.order.read().await.clone()
    }

    /// Replace the order wholesale with an authoritative new arrangement.
    pub async fn set(&self, order: Vec<String>) {
        *self.order.write().await = order;
    }

    /// Replace `old` with `new` at the same position. No-op if `old` is
    /// not tracked.
    pub async fn rename_in_place(&self, old: &str, new: &str) {
        let mut order = self.order.write().await;
        if let Some(slot) = order.iter_mut().find(|name| name.as_str() == old) {
            *slot = new.to_string();
        }
    }

    /// Drop a field from the order. Returns whether it was present.
    pub async fn remove(&self, name: &str) -> bool {
        let mut order = self.order.write().await;
        let before = order.len();
        order.retain(|n| n != name);
        order.len() != before
    }

    /// Forget the arrangement entirely.
    pub async fn clear(&self) {
        self.order.write().await.clear();
    }
}
