//! In-process engine stand-in.
//!
//! Implements [`EngineTable`] entirely in memory: window ids are assigned
//! from a free list (so closed ids are reused the way the native engine is
//! allowed to), registered trampolines are stored by address and can be
//! fired through the same raw calling convention the engine uses. Tests
//! and headless runs drive the crate through this type.

use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::Mutex;

use tracing::debug;

use crate::window::WindowOptions;

use super::ffi::TrampolineAddr;
use super::{EngineError, EngineTable};

/// Observable state of one stub window.
#[derive(Debug, Clone)]
pub struct StubWindow {
    pub url: String,
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
    pub visible: bool,
    pub focused: bool,
    pub minimized: bool,
    pub maximized: bool,
    pub fullscreen: bool,
    pub always_on_top: bool,
    pub resizable: bool,
    pub theme: String,
    pub backdrop: Option<String>,
    pub evaluated: Vec<String>,
}

/// Reply observed by [`StubEngine::fire`], with the trampoline-owned
/// string copied out before the call returns, exactly as the engine
/// contract requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubReply {
    pub status: i32,
    pub body: Option<String>,
}

#[derive(Default)]
struct StubState {
    next_id: u32,
    free_ids: Vec<u32>,
    windows: HashMap<u32, StubWindow>,
    callbacks: HashMap<String, TrampolineAddr>,
    posted: Vec<(u32, Vec<u8>)>,
    reject_registrations: bool,
    quit_requested: bool,
}

#[derive(Default)]
pub struct StubEngine {
    state: Mutex<StubState>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `register_callback` report failure.
    pub fn reject_registrations(&self, reject: bool) {
        self.lock().reject_registrations = reject;
    }

    /// Invoke the trampoline registered for `event` the way the native
    /// engine would: a raw call through the registered address, on the
    /// caller's thread. Returns `None` when nothing is registered.
    pub fn fire(&self, event: &str, window_id: u32, payload: &[u8]) -> Option<StubReply> {
        let trampoline = self.lock().callbacks.get(event).copied()?;
        // SAFETY: the address was handed to us by `register_callback` and
        // the bridge never frees a trampoline the engine could still reach.
        // The reply string is copied before this function returns, within
        // the validity window the contract grants.
        let reply = unsafe {
            let raw = ((*trampoline.0).invoke)(
                trampoline.0,
                window_id,
                payload.as_ptr(),
                payload.len(),
            );
            StubReply {
                status: raw.status,
                body: if raw.data.is_null() {
                    None
                } else {
                    Some(CStr::from_ptr(raw.data).to_string_lossy().into_owned())
                },
            }
        };
        Some(reply)
    }

    pub fn is_registered(&self, event: &str) -> bool {
        self.lock().callbacks.contains_key(event)
    }

    pub fn registered_events(&self) -> Vec<String> {
        self.lock().callbacks.keys().cloned().collect()
    }

    pub fn window(&self, id: u32) -> Option<StubWindow> {
        self.lock().windows.get(&id).cloned()
    }

    /// Messages delivered through `post_message`, oldest first.
    pub fn posted_messages(&self) -> Vec<(u32, Vec<u8>)> {
        self.lock().posted.clone()
    }

    pub fn quit_requested(&self) -> bool {
        self.lock().quit_requested
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn with_window(&self, id: u32, f: impl FnOnce(&mut StubWindow)) {
        if let Some(window) = self.lock().windows.get_mut(&id) {
            f(window);
        }
    }
}

impl EngineTable for StubEngine {
    fn create_window(
        &self,
        url: &str,
        _parent: u32,
        options: &WindowOptions,
    ) -> Result<u32, EngineError> {
        let mut state = self.lock();
        let id = state.free_ids.pop().unwrap_or_else(|| {
            state.next_id += 1;
            state.next_id
        });
        state.windows.insert(
            id,
            StubWindow {
                url: url.to_string(),
                title: options.title.clone(),
                width: options.width,
                height: options.height,
                x: options.x,
                y: options.y,
                visible: !options.hidden,
                focused: options.focus,
                minimized: false,
                maximized: options.maximized,
                fullscreen: options.fullscreen,
                always_on_top: options.always_on_top,
                resizable: options.resizable,
                theme: options.theme.as_str().to_string(),
                backdrop: None,
                evaluated: Vec::new(),
            },
        );
        debug!(target: "engine", id, "stub window created");
        Ok(id)
    }

    fn close_window(&self, id: u32) -> Result<(), EngineError> {
        let (removed, all_closed) = {
            let mut state = self.lock();
            let removed = state.windows.remove(&id).is_some();
            if removed {
                state.free_ids.push(id);
            }
            (removed, removed && state.windows.is_empty())
        };
        if !removed {
            return Err(EngineError::CallFailed {
                call: "close_window",
                status: 0,
            });
        }
        // Lock released above: the fired trampoline may call back in.
        if all_closed {
            self.fire("window-all-closed", 0, &[]);
        }
        Ok(())
    }

    fn focus_window(&self, id: u32) {
        self.with_window(id, |w| w.focused = true);
    }

    fn minimize_window(&self, id: u32) {
        self.with_window(id, |w| w.minimized = true);
    }

    fn toggle_maximize_window(&self, id: u32) {
        self.with_window(id, |w| w.maximized = !w.maximized);
    }

    fn set_fullscreen(&self, id: u32, fullscreen: bool) {
        self.with_window(id, |w| w.fullscreen = fullscreen);
    }

    fn set_title(&self, id: u32, title: &str) {
        self.with_window(id, |w| w.title = title.to_string());
    }

    fn set_size(&self, id: u32, width: i32, height: i32) {
        self.with_window(id, |w| {
            w.width = width;
            w.height = height;
        });
    }

    fn set_min_size(&self, _id: u32, _width: i32, _height: i32) {}

    fn set_max_size(&self, _id: u32, _width: i32, _height: i32) {}

    fn set_position(&self, id: u32, x: i32, y: i32) {
        self.with_window(id, |w| {
            w.x = x;
            w.y = y;
        });
    }

    fn set_visible(&self, id: u32, visible: bool) {
        self.with_window(id, |w| w.visible = visible);
    }

    fn set_always_on_top(&self, id: u32, on_top: bool) {
        self.with_window(id, |w| w.always_on_top = on_top);
    }

    fn set_resizable(&self, id: u32, resizable: bool) {
        self.with_window(id, |w| w.resizable = resizable);
    }

    fn set_theme(&self, id: u32, theme: &str) {
        self.with_window(id, |w| w.theme = theme.to_string());
    }

    fn theme(&self, id: u32) -> Option<String> {
        self.lock().windows.get(&id).map(|w| w.theme.clone())
    }

    fn set_backdrop(&self, id: u32, backdrop: &str) {
        self.with_window(id, |w| w.backdrop = Some(backdrop.to_string()));
    }

    fn navigate(&self, id: u32, url: &str) {
        self.with_window(id, |w| w.url = url.to_string());
    }

    fn eval_script(&self, id: u32, script: &str) {
        self.with_window(id, |w| w.evaluated.push(script.to_string()));
    }

    fn is_visible(&self, id: u32) -> bool {
        self.lock().windows.get(&id).is_some_and(|w| w.visible)
    }

    fn is_maximized(&self, id: u32) -> bool {
        self.lock().windows.get(&id).is_some_and(|w| w.maximized)
    }

    fn is_minimized(&self, id: u32) -> bool {
        self.lock().windows.get(&id).is_some_and(|w| w.minimized)
    }

    fn is_focused(&self, id: u32) -> bool {
        self.lock().windows.get(&id).is_some_and(|w| w.focused)
    }

    fn register_callback(
        &self,
        event: &str,
        trampoline: TrampolineAddr,
    ) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.reject_registrations {
            return Err(EngineError::CallFailed {
                call: "register_callback",
                status: 0,
            });
        }
        state.callbacks.insert(event.to_string(), trampoline);
        Ok(())
    }

    fn unregister_callback(&self, event: &str) -> Result<(), EngineError> {
        self.lock().callbacks.remove(event);
        Ok(())
    }

    fn post_message(&self, id: u32, bytes: &[u8]) -> Result<(), EngineError> {
        let mut state = self.lock();
        if !state.windows.contains_key(&id) {
            return Err(EngineError::CallFailed {
                call: "post_message",
                status: 0,
            });
        }
        state.posted.push((id, bytes.to_vec()));
        Ok(())
    }

    fn window_count(&self) -> usize {
        self.lock().windows.len()
    }

    /// Fires `app-ready` and returns immediately; tests drive further
    /// events explicitly through [`StubEngine::fire`].
    fn run(&self) -> Result<(), EngineError> {
        self.fire("app-ready", 0, &[]);
        Ok(())
    }

    fn quit(&self) {
        self.lock().quit_requested = true;
    }
}
