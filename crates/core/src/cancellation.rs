//! Per-operation cancellation
//!
//! Each logical operation (a screen load, a search, a form submit) gets an
//! [`OperationHandle`]. Starting a new operation under the same key cancels
//! the previous one, so superseded calls stop retrying and leave the refresh
//! queue instead of completing late.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Cancellation handle for one logical operation
#[derive(Debug, Clone)]
pub struct OperationHandle {
    id: Uuid,
    key: Option<String>,
    token: CancellationToken,
}

impl OperationHandle {
    /// Handle not tracked by any registry
    pub fn detached() -> Self {
        Self { id: Uuid::new_v4(), key: None, token: CancellationToken::new() }
    }

    /// Unique id of this operation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Registry key, `None` for detached handles.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Underlying token, for `select!` and child tokens.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Abort the operation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the operation was aborted.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for OperationHandle {
    fn default() -> Self {
        Self::detached()
    }
}

/// Tracks the live operation for each key.
#[derive(Debug)]
pub struct CancellationRegistry {
    root: CancellationToken,
    active: Mutex<HashMap<String, OperationHandle>>,
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationRegistry {
    /// Empty registry with a fresh root token.
    pub fn new() -> Self {
        Self { root: CancellationToken::new(), active: Mutex::new(HashMap::new()) }
    }

    /// Start an operation under `key`, cancelling the one it supersedes.
    pub fn begin(&self, key: impl Into<String>) -> OperationHandle {
        let key = key.into();
        let handle = OperationHandle {
            id: Uuid::new_v4(),
            key: Some(key.clone()),
            token: self.root.child_token(),
        };
        if let Some(previous) = self.active.lock().insert(key.clone(), handle.clone()) {
            debug!(key = %key, superseded = %previous.id, "cancelling superseded operation");
            previous.cancel();
        }
        handle
    }

    /// Forget a finished operation. A newer operation under the same key is
    /// left alone.
    pub fn finish(&self, handle: &OperationHandle) {
        let Some(key) = handle.key() else {
            return;
        };
        let mut active = self.active.lock();
        if active.get(key).is_some_and(|current| current.id == handle.id) {
            active.remove(key);
        }
    }

    /// Cancel every tracked operation. Handles issued afterwards are born
    /// cancelled.
    pub fn cancel_all(&self) {
        self.root.cancel();
        self.active.lock().clear();
    }

    /// Number of keyed operations still running.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_operation_cancels_previous_with_same_key() {
        let registry = CancellationRegistry::new();
        let first = registry.begin("search");
        let other = registry.begin("profile");
        let second = registry.begin("search");

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!other.is_cancelled());
        assert_eq!(registry.active_count(), 2);
    }

    #[test]
    fn finish_ignores_superseded_handles() {
        let registry = CancellationRegistry::new();
        let first = registry.begin("search");
        let second = registry.begin("search");

        registry.finish(&first);
        assert_eq!(registry.active_count(), 1);
        registry.finish(&second);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn cancel_all_reaches_every_handle() {
        let registry = CancellationRegistry::new();
        let a = registry.begin("a");
        let b = registry.begin("b");

        registry.cancel_all();
        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(registry.begin("c").is_cancelled());
    }
}
