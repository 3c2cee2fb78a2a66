//! Callback bridge: host closures exposed to the engine as address-stable
//! trampolines, plus the payload decoding contract.
//!
//! The engine registers callbacks by bare address and keeps calling that
//! address until told otherwise, so a [`Trampoline`] must never move and
//! must never be freed while the engine could still reach it. The bridge
//! owns every trampoline it creates: live ones in a name-keyed table,
//! unregistered ones in an append-only graveyard that is only reclaimed
//! when the bridge itself is dropped. A call already in flight on the
//! engine's pump thread when `unregister` returns may still complete; it
//! lands on a retired but valid trampoline.

use std::collections::HashMap;
use std::ffi::CString;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::engine::ffi::{RawReply, RawTrampoline, TrampolineAddr};
use crate::engine::{EngineError, EngineTable};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("native registration rejected for `{event}`: {source}")]
    NativeRejected {
        event: String,
        source: EngineError,
    },
}

/// Synchronous result a native handler returns to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeReply {
    pub status: i32,
    pub body: Option<String>,
}

impl NativeReply {
    pub fn handled() -> Self {
        Self {
            status: 1,
            body: None,
        }
    }

    pub fn unhandled() -> Self {
        Self {
            status: 0,
            body: None,
        }
    }

    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            status: 1,
            body: Some(body.into()),
        }
    }
}

/// Closure signature invoked from the engine's pump thread. The raw
/// window id (0 = global) and the engine-owned payload bytes are all a
/// native notification carries.
pub type NativeHandler = Box<dyn Fn(u32, &[u8]) -> NativeReply + Send + Sync>;

/// Address-stable adapter around a host closure.
///
/// `#[repr(C)]` with the raw header first, so the boxed allocation's
/// address doubles as the `RawTrampoline` address the engine calls.
#[repr(C)]
pub struct Trampoline {
    raw: RawTrampoline,
    handler: NativeHandler,
    event: String,
    /// Reply storage backing the pointer handed to the engine; replaced on
    /// the next invocation, never freed between calls.
    reply: Mutex<Option<CString>>,
}

impl Trampoline {
    fn new(event: &str, handler: NativeHandler) -> Box<Self> {
        Box::new(Self {
            raw: RawTrampoline {
                invoke: trampoline_invoke,
            },
            handler,
            event: event.to_string(),
            reply: Mutex::new(None),
        })
    }

    fn addr(&self) -> TrampolineAddr {
        TrampolineAddr(&self.raw as *const RawTrampoline)
    }

    fn store_reply(&self, reply: NativeReply) -> RawReply {
        let Some(body) = reply.body else {
            return RawReply {
                status: reply.status,
                data: std::ptr::null(),
            };
        };
        // Interior NULs cannot cross the C boundary; truncate at the first
        // one rather than dropping the reply.
        let body = match CString::new(body) {
            Ok(body) => body,
            Err(err) => {
                let position = err.nul_position();
                let mut bytes = err.into_vec();
                bytes.truncate(position);
                warn!(
                    target: "bridge",
                    event = %self.event,
                    "reply contained interior NUL, truncated"
                );
                CString::new(bytes).unwrap_or_default()
            }
        };
        let mut slot = match self.reply.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        let data = body.as_ptr();
        *slot = Some(body);
        RawReply {
            status: reply.status,
            data,
        }
    }
}

/// The fixed extern "C" entry point behind every trampoline.
///
/// No error may unwind across this frame; a panicking handler is caught,
/// logged and reported to the engine as a failed dispatch.
unsafe extern "C" fn trampoline_invoke(
    trampoline: *const RawTrampoline,
    window_id: u32,
    data: *const u8,
    len: usize,
) -> RawReply {
    // SAFETY: the engine only invokes addresses produced by
    // `Trampoline::new`, where `raw` is the first field of a live,
    // never-moved `Trampoline` allocation.
    let trampoline = &*(trampoline as *const Trampoline);
    let payload = if data.is_null() {
        &[][..]
    } else {
        std::slice::from_raw_parts(data, len)
    };
    match catch_unwind(AssertUnwindSafe(|| (trampoline.handler)(window_id, payload))) {
        Ok(reply) => trampoline.store_reply(reply),
        Err(_) => {
            error!(
                target: "bridge",
                event = %trampoline.event,
                window_id,
                "native callback handler panicked"
            );
            RawReply::failed()
        }
    }
}

/// Owns trampolines and talks to the engine's register/unregister
/// primitives on their behalf.
pub struct CallbackBridge {
    engine: Arc<dyn EngineTable>,
    active: Mutex<HashMap<String, Box<Trampoline>>>,
    retired: Mutex<Vec<Box<Trampoline>>>,
}

impl CallbackBridge {
    pub fn new(engine: Arc<dyn EngineTable>) -> Self {
        Self {
            engine,
            active: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Wrap `handler` in a trampoline and register it with the engine
    /// under `event`.
    ///
    /// The trampoline is retained even when the engine rejects the
    /// registration: reclaiming it would race a rejection the engine
    /// reported after stashing the address.
    pub fn register(
        &self,
        event: &str,
        handler: NativeHandler,
    ) -> Result<(), BridgeError> {
        let trampoline = Trampoline::new(event, handler);
        let addr = trampoline.addr();
        match self.engine.register_callback(event, addr) {
            Ok(()) => {
                let previous = self.lock_active().insert(event.to_string(), trampoline);
                if let Some(previous) = previous {
                    self.lock_retired().push(previous);
                }
                debug!(target: "bridge", event, "registered native callback");
                Ok(())
            }
            Err(source) => {
                self.lock_retired().push(trampoline);
                Err(BridgeError::NativeRejected {
                    event: event.to_string(),
                    source,
                })
            }
        }
    }

    /// Undo a registration. Idempotent: unregistering an event with no
    /// active trampoline is a no-op.
    pub fn unregister(&self, event: &str) {
        let removed = self.lock_active().remove(event);
        let Some(trampoline) = removed else {
            return;
        };
        if let Err(err) = self.engine.unregister_callback(event) {
            warn!(target: "bridge", event, error = %err, "native unregister failed");
        }
        self.lock_retired().push(trampoline);
        debug!(target: "bridge", event, "unregistered native callback");
    }

    pub fn is_registered(&self, event: &str) -> bool {
        self.lock_active().contains_key(event)
    }

    pub fn registered_events(&self) -> Vec<String> {
        self.lock_active().keys().cloned().collect()
    }

    pub fn engine(&self) -> &Arc<dyn EngineTable> {
        &self.engine
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashMap<String, Box<Trampoline>>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_retired(&self) -> std::sync::MutexGuard<'_, Vec<Box<Trampoline>>> {
        match self.retired.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub mod decode {
    //! Payload decoding with the bridge's failure policy: malformed input
    //! never aborts the callback. Text decodes to its replacement form,
    //! structured payloads fall back to an empty default with a logged
    //! diagnostic, and the event fires with best-effort data.

    use serde::Deserialize;
    use serde_json::Value;
    use tracing::warn;

    /// UTF-8 decode with replacement characters for malformed sequences.
    pub fn text_lossy(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    /// Parse a JSON object payload, falling back to an empty object.
    pub fn json_or_default(bytes: &[u8]) -> Value {
        match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "bridge", error = %err, "malformed JSON payload, using empty object");
                Value::Object(serde_json::Map::new())
            }
        }
    }

    /// Drop-style event payload: `{"files": [...], "x": n, "y": n}`.
    #[derive(Debug, Clone, Default, PartialEq, Deserialize)]
    pub struct FileDropData {
        #[serde(default)]
        pub files: Vec<String>,
        #[serde(default)]
        pub x: f64,
        #[serde(default)]
        pub y: f64,
    }

    /// Parse a file-drop payload, falling back to the empty default.
    pub fn file_drop(bytes: &[u8]) -> FileDropData {
        match serde_json::from_slice(bytes) {
            Ok(data) => data,
            Err(err) => {
                warn!(target: "bridge", error = %err, "malformed file-drop payload, using default");
                FileDropData::default()
            }
        }
    }

    /// Split a `name NUL value` framed payload, decoding both halves
    /// lossily. Window events and IPC messages both arrive framed this
    /// way: a short name, a single `0x00`, then the value bytes.
    pub fn name_value(bytes: &[u8]) -> Option<(String, String)> {
        let split = bytes.iter().position(|&b| b == 0)?;
        let name = text_lossy(&bytes[..split]);
        let value = text_lossy(&bytes[split + 1..]);
        Some((name, value))
    }

    /// Frame a `name NUL value` payload for the outbound direction.
    pub fn encode_name_value(name: &str, value: &str) -> Vec<u8> {
        let mut framed = Vec::with_capacity(name.len() + value.len() + 1);
        framed.extend_from_slice(name.as_bytes());
        framed.push(0);
        framed.extend_from_slice(value.as_bytes());
        framed
    }
}

#[cfg(test)]
mod tests {
    use super::decode;

    #[test]
    fn lossy_text_never_fails() {
        assert_eq!(decode::text_lossy(b"hello"), "hello");
        assert_eq!(decode::text_lossy(&[0xff, 0xfe]), "\u{fffd}\u{fffd}");
    }

    #[test]
    fn malformed_json_becomes_empty_object() {
        let value = decode::json_or_default(b"{bad");
        assert_eq!(value, serde_json::json!({}));
    }

    #[test]
    fn malformed_file_drop_becomes_default() {
        let data = decode::file_drop(b"{bad");
        assert_eq!(data, decode::FileDropData::default());
    }

    #[test]
    fn file_drop_parses_partial_payloads() {
        let data = decode::file_drop(br#"{"files": ["a.txt"]}"#);
        assert_eq!(data.files, vec!["a.txt".to_string()]);
        assert_eq!(data.x, 0.0);
    }

    #[test]
    fn name_value_round_trip() {
        let framed = decode::encode_name_value("greet", "payload");
        assert_eq!(
            decode::name_value(&framed),
            Some(("greet".to_string(), "payload".to_string()))
        );
        assert_eq!(decode::name_value(b"no-separator"), None);
    }
}
