//! Window identity registry.
//!
//! The engine addresses windows solely by integer id, with no pointer or
//! handle continuity, and may reuse an id after the window it named is
//! destroyed. This module is the single source of truth for "does this
//! window still exist": every native event dispatch resolves its id here,
//! and handle destruction must pass through [`WindowRegistry::remove`]
//! before a new window can safely claim the same id.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use crate::window::Window;

/// Native-assigned window identity. Non-zero by construction; the raw
/// value `0` is the engine's "no window" / global scope sentinel and never
/// names a live window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(NonZeroU32);

impl WindowId {
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("window id {0} is already mapped to a different live window")]
    DuplicateId(WindowId),
}

/// Authoritative id-to-handle mapping, serialized with a mutex because
/// native-thread dispatch and host-thread creation/destruction interleave.
/// No caching beyond the direct map: id reuse makes anything else stale.
#[derive(Default)]
pub struct WindowRegistry {
    windows: Mutex<HashMap<WindowId, Window>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `id` to `window`. Re-inserting the same handle under its own id
    /// is accepted; mapping an id that still names a *different* live
    /// handle is refused.
    pub fn insert(&self, id: WindowId, window: Window) -> Result<(), RegistryError> {
        let mut windows = self.lock();
        if let Some(existing) = windows.get(&id) {
            if !Window::same_handle(existing, &window) {
                return Err(RegistryError::DuplicateId(id));
            }
        }
        windows.insert(id, window);
        debug!(target: "registry", %id, "window registered");
        Ok(())
    }

    /// Detach the mapping. No-op when absent.
    pub fn remove(&self, id: WindowId) -> Option<Window> {
        let removed = self.lock().remove(&id);
        if removed.is_some() {
            debug!(target: "registry", %id, "window removed");
        }
        removed
    }

    pub fn lookup(&self, id: WindowId) -> Option<Window> {
        self.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn all(&self) -> Vec<Window> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<WindowId, Window>> {
        match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_window_id() {
        assert!(WindowId::new(0).is_none());
        assert_eq!(WindowId::new(7).map(WindowId::get), Some(7));
    }
}
