//! Application lifecycle: owns the engine handle and wires the standard
//! native events into the registry, the window emitters and the IPC
//! router before entering the engine's pump.
//!
//! Data flow for every native notification: engine pump thread →
//! trampoline (decode) → registry (resolve identity) → window emitter or
//! IPC router (dispatch) → host listener → optional response → engine.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::bridge::{decode, BridgeError, CallbackBridge, NativeReply};
use crate::engine::{DynamicEngine, EngineTable};
use crate::events::emitter::{EventEmitter, EventPayload, ListenerId};
use crate::events::global::GlobalEventManager;
use crate::events::names;
use crate::ipc::IpcRouter;
use crate::registry::{WindowId, WindowRegistry};
use crate::window::{Window, WindowOptions};

struct AppInner {
    engine: Arc<dyn EngineTable>,
    registry: Arc<WindowRegistry>,
    /// Process-lifetime trampolines for window-scoped native events.
    /// Shared with every window handle so window-triggered registrations
    /// outlive any individual window.
    bridge: Arc<CallbackBridge>,
    globals: GlobalEventManager,
    ipc: Arc<IpcRouter>,
    /// App-level fan-out for lifecycle signals; the global manager itself
    /// keeps one native registration per name.
    emitter: Arc<EventEmitter>,
    wired: Mutex<bool>,
}

#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    /// Build an app over an already constructed engine.
    pub fn new(engine: Arc<dyn EngineTable>) -> Self {
        let registry = Arc::new(WindowRegistry::new());
        Self {
            inner: Arc::new(AppInner {
                bridge: Arc::new(CallbackBridge::new(Arc::clone(&engine))),
                globals: GlobalEventManager::new(Arc::clone(&engine)),
                ipc: Arc::new(IpcRouter::new(Arc::clone(&engine), Arc::clone(&registry))),
                emitter: Arc::new(EventEmitter::new()),
                wired: Mutex::new(false),
                registry,
                engine,
            }),
        }
    }

    /// Load the native engine from its default location and build an app
    /// over it.
    pub fn load() -> anyhow::Result<Self> {
        let engine = DynamicEngine::load().context("failed to load the vitrine engine")?;
        Ok(Self::new(Arc::new(engine)))
    }

    /// Install the default tracing subscriber (`RUST_LOG`-filtered, `info`
    /// fallback). Silently keeps an already installed subscriber.
    pub fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .try_init();
    }

    /// Construct an unrealized window wired to this app's engine and
    /// registry. Nothing native exists until the window is shown.
    pub fn create_window(&self, options: WindowOptions) -> Window {
        Window::new(
            Arc::clone(&self.inner.engine),
            Arc::clone(&self.inner.registry),
            Arc::clone(&self.inner.bridge),
            options,
        )
    }

    pub fn registry(&self) -> &Arc<WindowRegistry> {
        &self.inner.registry
    }

    pub fn ipc(&self) -> &Arc<IpcRouter> {
        &self.inner.ipc
    }

    pub fn windows(&self) -> Vec<Window> {
        self.inner.registry.all()
    }

    pub fn window_count(&self) -> usize {
        self.inner.registry.count()
    }

    // ---- Lifecycle listeners --------------------------------------------

    /// Listen for an app lifecycle event (`app-ready`,
    /// `window-all-closed`, `before-quit`).
    pub fn on<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.inner.emitter.on(event, callback)
    }

    pub fn on_ready<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.on(names::APP_READY, callback)
    }

    pub fn on_window_all_closed<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.on(names::WINDOW_ALL_CLOSED, callback)
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.inner.emitter.off(event, id)
    }

    // ---- Running --------------------------------------------------------

    /// Wire the standard native events and enter the engine's pump.
    /// Returns when the engine quits.
    pub fn run(&self) -> anyhow::Result<()> {
        self.wire().context("failed to wire native callbacks")?;
        self.inner.engine.run().context("engine run loop failed")?;
        Ok(())
    }

    pub fn quit(&self) {
        self.inner.engine.quit();
    }

    /// Close every live window, logging failures rather than stopping at
    /// the first.
    pub fn close_all_windows(&self) {
        for window in self.inner.registry.all() {
            if let Err(err) = window.close() {
                warn!(target: "app", error = %err, "failed to close window during shutdown");
            }
        }
    }

    /// Register the process-lifetime trampolines. Idempotent so tests and
    /// embedders can wire without entering the run loop; a failed attempt
    /// leaves the app unwired so a later call retries every registration.
    pub fn wire(&self) -> Result<(), BridgeError> {
        let mut wired = match self.inner.wired.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *wired {
            return Ok(());
        }

        let registry = Arc::clone(&self.inner.registry);
        self.inner.bridge.register(
            names::WINDOW_EVENT,
            Box::new(move |raw_id, bytes| {
                let Some((event, data)) = decode::name_value(bytes) else {
                    warn!(target: "app", raw_id, "unframed window event dropped");
                    return NativeReply::unhandled();
                };
                let Some(window) = WindowId::new(raw_id).and_then(|id| registry.lookup(id)) else {
                    warn!(target: "app", raw_id, event, "window event for unknown id dropped");
                    return NativeReply::unhandled();
                };
                window.handle_native_event(&event, data);
                NativeReply::handled()
            }),
        )?;

        let registry = Arc::clone(&self.inner.registry);
        self.inner.bridge.register(
            names::PAGE_LOAD,
            Box::new(move |raw_id, bytes| {
                let Some((url, status)) = decode::name_value(bytes) else {
                    warn!(target: "app", raw_id, "unframed page-load event dropped");
                    return NativeReply::unhandled();
                };
                let Some(window) = WindowId::new(raw_id).and_then(|id| registry.lookup(id)) else {
                    warn!(target: "app", raw_id, "page-load for unknown id dropped");
                    return NativeReply::unhandled();
                };
                window.handle_page_load(url, status);
                NativeReply::handled()
            }),
        )?;

        for event in [names::APP_READY, names::WINDOW_ALL_CLOSED, names::BEFORE_QUIT] {
            let emitter = Arc::clone(&self.inner.emitter);
            self.inner
                .globals
                .register(event, move |_, payload| {
                    emitter.emit(event, payload);
                })?;
        }

        self.inner.ipc.attach(&self.inner.bridge)?;
        *wired = true;
        Ok(())
    }
}
