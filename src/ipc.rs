//! IPC router: string-keyed message dispatch between embedded content and
//! host handlers, with responses delivered back into a specific window.
//!
//! Each channel has at most one handler, process-wide; the last
//! registration wins. Inbound messages arrive through the bridge as a
//! `channel NUL payload` frame on the `ipc-message` event and are
//! dispatched in native-delivery order, the router adds no reordering or
//! batching. A handler's return value is the *synchronous* acknowledgment
//! to the native call; pushing data to a window afterwards is what
//! [`IpcRouter::send`] is for.
//!
//! By convention (not enforced here), content-initiated round trips reply
//! on `<channel>:response`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, warn};

use crate::bridge::{decode, BridgeError, CallbackBridge, NativeReply};
use crate::engine::{EngineError, EngineTable};
use crate::events::names;
use crate::registry::{WindowId, WindowRegistry};

/// Suffix convention for client-initiated round trips.
pub const RESPONSE_SUFFIX: &str = ":response";

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("window {0} is not registered")]
    UnknownWindow(WindowId),
    #[error("no handler registered for channel `{0}`")]
    UnhandledChannel(String),
    #[error("engine rejected message delivery: {0}")]
    Engine(#[from] EngineError),
}

/// Synchronous result of an IPC handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpcResponse {
    /// Reply string forwarded to the native caller.
    Handled(String),
    /// Handled, nothing to say.
    Empty,
}

type IpcHandler = Arc<dyn Fn(WindowId, &str) -> IpcResponse + Send + Sync>;

pub struct IpcRouter {
    engine: Arc<dyn EngineTable>,
    registry: Arc<WindowRegistry>,
    handlers: Mutex<HashMap<String, IpcHandler>>,
}

impl IpcRouter {
    pub fn new(engine: Arc<dyn EngineTable>, registry: Arc<WindowRegistry>) -> Self {
        Self {
            engine,
            registry,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Register `handler` for `channel`, replacing any prior handler.
    pub fn on<F>(&self, channel: &str, handler: F)
    where
        F: Fn(WindowId, &str) -> IpcResponse + Send + Sync + 'static,
    {
        let previous = self
            .lock()
            .insert(channel.to_string(), Arc::new(handler));
        if previous.is_some() {
            warn!(target: "ipc", channel, "replacing existing channel handler");
        } else {
            debug!(target: "ipc", channel, "channel handler registered");
        }
    }

    /// Remove the handler for `channel`; later messages on it are dropped
    /// with a diagnostic.
    pub fn off(&self, channel: &str) {
        if self.lock().remove(channel).is_some() {
            debug!(target: "ipc", channel, "channel handler removed");
        }
    }

    pub fn channels(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Dispatch one inbound message to its channel handler.
    ///
    /// The handler runs outside the router lock, so it may freely register
    /// or remove channels and send messages.
    pub fn dispatch(
        &self,
        window_id: WindowId,
        channel: &str,
        payload: &str,
    ) -> Result<IpcResponse, IpcError> {
        let handler = self.lock().get(channel).cloned();
        let Some(handler) = handler else {
            warn!(target: "ipc", channel, %window_id, "message on unhandled channel dropped");
            return Err(IpcError::UnhandledChannel(channel.to_string()));
        };
        Ok(handler(window_id, payload))
    }

    /// Push a message from host to a specific still-live window. The
    /// registry is consulted first: an unknown id fails without touching
    /// the engine, so the router never sends into a destroyed or
    /// unrealized window.
    pub fn send(&self, window_id: WindowId, channel: &str, payload: &str) -> Result<(), IpcError> {
        if !self.registry.contains(window_id) {
            return Err(IpcError::UnknownWindow(window_id));
        }
        let framed = decode::encode_name_value(channel, payload);
        self.engine.post_message(window_id.get(), &framed)?;
        Ok(())
    }

    /// Reply to a content-initiated round trip on the conventional
    /// `<channel>:response` channel.
    pub fn respond(&self, window_id: WindowId, channel: &str, payload: &str) -> Result<(), IpcError> {
        self.send(window_id, &format!("{channel}{RESPONSE_SUFFIX}"), payload)
    }

    /// Wire inbound `ipc-message` events from the engine into this router
    /// through `bridge`. The native-visible call result is the handler's
    /// reply: status 1 with the reply string when handled, status 0 (the
    /// defined "not handled" signal) otherwise.
    pub fn attach(self: &Arc<Self>, bridge: &CallbackBridge) -> Result<(), BridgeError> {
        let router = Arc::clone(self);
        bridge.register(
            names::IPC_MESSAGE,
            Box::new(move |raw_id, bytes| {
                let Some((channel, payload)) = decode::name_value(bytes) else {
                    warn!(target: "ipc", raw_id, "unframed ipc payload dropped");
                    return NativeReply::unhandled();
                };
                let Some(window_id) = WindowId::new(raw_id) else {
                    warn!(target: "ipc", channel, "ipc message without window id dropped");
                    return NativeReply::unhandled();
                };
                match router.dispatch(window_id, &channel, &payload) {
                    Ok(IpcResponse::Handled(reply)) => NativeReply::with_body(reply),
                    Ok(IpcResponse::Empty) => NativeReply::handled(),
                    Err(_) => NativeReply::unhandled(),
                }
            }),
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, IpcHandler>> {
        match self.handlers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
