use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

/// Tracks temporary `blob:` handles created while in-memory sources are
/// being decoded.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    live: Arc<Mutex<HashSet<String>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle that stays registered until the guard is dropped.
    pub fn register(&self) -> TempHandle {
        let id = format!("blob:{}", uuid::Uuid::new_v4());
        self.live.lock().insert(id.clone());
        TempHandle {
            id,
            live: Arc::clone(&self.live),
        }
    }

    /// Number of handles not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.lock().len()
    }
}

/// Guard for one registered handle; releasing happens on drop.
#[derive(Debug)]
pub struct TempHandle {
    id: String,
    live: Arc<Mutex<HashSet<String>>>,
}

impl TempHandle {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for TempHandle {
    fn drop(&mut self) {
        self.live.lock().remove(&self.id);
        log::debug!("Released {}", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_release_on_drop() {
        let registry = HandleRegistry::new();
        let a = registry.register();
        let b = registry.register();
        assert!(a.id().starts_with("blob:"));
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.live_handles(), 2);

        drop(a);
        assert_eq!(registry.live_handles(), 1);
        drop(b);
        assert_eq!(registry.live_handles(), 0);
    }
}
