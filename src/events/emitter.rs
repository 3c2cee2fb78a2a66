//! Generic per-object publish/subscribe.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, error};

use crate::bridge::decode::FileDropData;
use crate::registry::WindowId;

/// Arguments delivered to listeners, one variant per native event shape.
#[derive(Debug, Clone, Default)]
pub enum EventPayload {
    #[default]
    None,
    Text(String),
    PageLoad {
        url: String,
        status: String,
    },
    FileDrop(FileDropData),
    Window(WindowId),
    Json(Value),
}

impl EventPayload {
    /// Text view of the payload for listeners that only care about the
    /// simple-notification shape.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Handle for removing a specific listener. Identity-based removal:
/// the id names the registration, not the closure, so the same closure
/// registered twice yields two independently removable entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&EventPayload) + Send + Sync>;

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    callback: Listener,
    once: bool,
}

#[derive(Default)]
struct EmitterState {
    // Insertion order inside each Vec is fan-out order.
    listeners: HashMap<String, Vec<ListenerEntry>>,
    next_id: u64,
}

/// Listener registration, removal and firing with one-shot support.
///
/// `emit` iterates a snapshot of the listener list taken before the first
/// invocation: listeners registered or removed mid-emission affect the
/// next emit, never the one in flight. A listener that panics is caught
/// and logged; its siblings still run.
#[derive(Default)]
pub struct EventEmitter {
    state: Mutex<EmitterState>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `event`; returns its removal handle.
    pub fn on<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.add(event, Arc::new(callback), false)
    }

    /// Like [`EventEmitter::on`], but the listener is removed after its
    /// first successful invocation.
    pub fn once<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.add(event, Arc::new(callback), true)
    }

    fn add(&self, event: &str, callback: Listener, once: bool) -> ListenerId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(ListenerEntry { id, callback, once });
        debug!(target: "events", event, once, "listener registered");
        id
    }

    /// Remove one listener by its handle. Returns whether it was present.
    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut state = self.lock();
        let Some(entries) = state.listeners.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        before != entries.len()
    }

    /// Clear all listeners for `event`, or for every event when `None`.
    pub fn remove_all(&self, event: Option<&str>) {
        let mut state = self.lock();
        match event {
            Some(event) => {
                state.listeners.remove(event);
            }
            None => state.listeners.clear(),
        }
    }

    /// Invoke every listener registered for `event` at the moment of the
    /// call, in registration order. Returns true iff at least one listener
    /// was invoked.
    pub fn emit(&self, event: &str, payload: &EventPayload) -> bool {
        let snapshot: Vec<ListenerEntry> = {
            let state = self.lock();
            match state.listeners.get(event) {
                Some(entries) if !entries.is_empty() => entries.clone(),
                _ => return false,
            }
        };

        let mut spent = Vec::new();
        for entry in &snapshot {
            let callback = Arc::clone(&entry.callback);
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(payload)));
            match outcome {
                Ok(()) => {
                    if entry.once {
                        spent.push(entry.id);
                    }
                }
                Err(_) => {
                    error!(target: "events", event, "listener panicked during emit");
                }
            }
        }

        if !spent.is_empty() {
            let mut state = self.lock();
            if let Some(entries) = state.listeners.get_mut(event) {
                entries.retain(|entry| !spent.contains(&entry.id));
            }
        }
        true
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().listeners.get(event).map_or(0, Vec::len)
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    /// Names of all events that currently have listeners.
    pub fn event_names(&self) -> Vec<String> {
        self.lock()
            .listeners
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EmitterState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&EventPayload) + Send + Sync) {
        let count = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&count);
        (count, move |_: &EventPayload| {
            probe.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn emit_reaches_listeners_in_registration_order() {
        let emitter = EventEmitter::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            emitter.on("ping", move |_| order.lock().unwrap().push(label));
        }
        assert!(emitter.emit("ping", &EventPayload::None));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn emit_without_listeners_returns_false() {
        let emitter = EventEmitter::new();
        assert!(!emitter.emit("nobody-home", &EventPayload::None));
    }

    #[test]
    fn once_listener_fires_exactly_once() {
        let emitter = EventEmitter::new();
        let (count, probe) = counter();
        emitter.once("ping", probe);
        assert!(emitter.emit("ping", &EventPayload::None));
        assert!(!emitter.emit("ping", &EventPayload::None));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_removes_only_the_named_listener() {
        let emitter = EventEmitter::new();
        let (kept_count, kept) = counter();
        let (removed_count, removed) = counter();
        emitter.on("ping", kept);
        let id = emitter.on("ping", removed);
        assert!(emitter.off("ping", id));
        assert!(!emitter.off("ping", id));
        emitter.emit("ping", &EventPayload::None);
        assert_eq!(kept_count.load(Ordering::SeqCst), 1);
        assert_eq!(removed_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panicking_listener_does_not_suppress_siblings() {
        let emitter = EventEmitter::new();
        emitter.on("ping", |_| panic!("listener failure"));
        let (count, probe) = counter();
        emitter.on("ping", probe);
        assert!(emitter.emit("ping", &EventPayload::None));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_added_during_emit_waits_for_next_emit() {
        let emitter = Arc::new(EventEmitter::new());
        let (count, probe) = counter();
        let outer = Arc::clone(&emitter);
        let probe = Arc::new(probe);
        emitter.on("ping", move |_| {
            let probe = Arc::clone(&probe);
            outer.on("ping", move |payload| (*probe)(payload));
        });
        emitter.emit("ping", &EventPayload::None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        emitter.emit("ping", &EventPayload::None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn introspection_tracks_live_listeners() {
        let emitter = EventEmitter::new();
        assert!(!emitter.has_listeners("ping"));
        let (_, probe) = counter();
        emitter.on("ping", probe);
        assert_eq!(emitter.listener_count("ping"), 1);
        assert_eq!(emitter.event_names(), vec!["ping".to_string()]);
        emitter.remove_all(Some("ping"));
        assert!(!emitter.has_listeners("ping"));
    }
}
