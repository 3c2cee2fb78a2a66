//! Process-wide named events, layered on the callback bridge.
//!
//! Lifecycle signals like `app-ready` or `window-all-closed` are not tied
//! to any window; the engine delivers them through the same registration
//! primitive with window id 0. This manager enforces at most one native
//! registration per event name: re-registering replaces the previous
//! handler rather than stacking. Fan-out to multiple application
//! listeners is the caller's business, typically by pointing the handler
//! at an [`crate::events::emitter::EventEmitter`] it owns.

use std::sync::Arc;

use tracing::warn;

use crate::bridge::{decode, BridgeError, CallbackBridge, NativeReply};
use crate::engine::EngineTable;
use crate::events::emitter::EventPayload;

pub struct GlobalEventManager {
    bridge: CallbackBridge,
}

impl GlobalEventManager {
    pub fn new(engine: Arc<dyn EngineTable>) -> Self {
        Self {
            bridge: CallbackBridge::new(engine),
        }
    }

    /// Register `handler` for the named global event.
    ///
    /// A previous registration under the same name is unregistered first;
    /// replacement is deliberate but easy to hit by accident, so it is
    /// logged.
    pub fn register<F>(&self, event: &str, handler: F) -> Result<(), BridgeError>
    where
        F: Fn(u32, &EventPayload) + Send + Sync + 'static,
    {
        if self.bridge.is_registered(event) {
            warn!(target: "events", event, "replacing existing global event registration");
            self.bridge.unregister(event);
        }
        self.bridge.register(
            event,
            Box::new(move |window_id, bytes| {
                let payload = if bytes.is_empty() {
                    EventPayload::None
                } else {
                    EventPayload::Text(decode::text_lossy(bytes))
                };
                handler(window_id, &payload);
                NativeReply::handled()
            }),
        )
    }

    /// Inverse of [`GlobalEventManager::register`]; idempotent.
    pub fn unregister(&self, event: &str) {
        self.bridge.unregister(event);
    }

    /// Names currently registered with the engine.
    pub fn list_events(&self) -> Vec<String> {
        self.bridge.registered_events()
    }
}
