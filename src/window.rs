//! The managed window object.
//!
//! A [`Window`] starts *unrealized*: configuration is accumulated locally
//! and no native resources exist. The first [`Window::show`] realizes it,
//! at which point the engine assigns a [`WindowId`] and the handle enters
//! the registry. Closing (host-initiated or reported by the engine)
//! clears the id and removes the registry mapping; a destroyed handle
//! accepts further mutators as local no-ops and answers queries with
//! defaults.
//!
//! Handles are cheap clones of a shared inner; the clone in the registry
//! and the clone held by application code are the same window.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bridge::{decode, CallbackBridge, NativeReply};
use crate::engine::{EngineError, EngineTable};
use crate::events::emitter::{EventEmitter, EventPayload, ListenerId};
use crate::events::names;
use crate::registry::{RegistryError, WindowId, WindowRegistry};

/// Window theme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Dark => "Dark",
            Self::System => "System",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Light" => Some(Self::Light),
            "Dark" => Some(Self::Dark),
            "System" => Some(Self::System),
            _ => None,
        }
    }
}

/// Backdrop material. The window must be transparent for backdrop
/// effects to be visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backdrop {
    Mica,
    MicaAlt,
    Acrylic,
}

impl Backdrop {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mica => "mica",
            Self::MicaAlt => "micaAlt",
            Self::Acrylic => "acrylic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::new(255, 255, 255, 255)
    }
}

/// Declared window configuration. `x`/`y` of -1 mean "center on screen";
/// zero min/max extents mean "no limit".
#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub url: Option<String>,
    pub resizable: bool,
    pub remove_titlebar: bool,
    pub transparent: bool,
    pub background_color: Rgba,
    pub always_on_top: bool,
    pub theme: Theme,
    pub backdrop: Option<Backdrop>,
    pub maximized: bool,
    pub maximizable: bool,
    pub minimizable: bool,
    pub x: i32,
    pub y: i32,
    pub min_width: i32,
    pub min_height: i32,
    pub max_width: i32,
    pub max_height: i32,
    pub fullscreen: bool,
    pub focus: bool,
    pub hidden: bool,
    pub use_page_icon: bool,
    pub autoplay: bool,
    pub background_throttling: bool,
    pub disable_right_click: bool,
    pub user_agent: Option<String>,
    pub preload_js: Option<String>,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "Window".to_string(),
            width: 800,
            height: 600,
            url: None,
            resizable: true,
            remove_titlebar: false,
            transparent: false,
            background_color: Rgba::default(),
            always_on_top: false,
            theme: Theme::System,
            backdrop: None,
            maximized: false,
            maximizable: true,
            minimizable: true,
            x: -1,
            y: -1,
            min_width: 0,
            min_height: 0,
            max_width: 0,
            max_height: 0,
            fullscreen: false,
            focus: true,
            hidden: false,
            use_page_icon: true,
            autoplay: false,
            background_throttling: false,
            disable_right_click: false,
            user_agent: None,
            preload_js: None,
        }
    }
}

impl WindowOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_position(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_min_size(mut self, width: i32, height: i32) -> Self {
        self.min_width = width;
        self.min_height = height;
        self
    }

    pub fn with_max_size(mut self, width: i32, height: i32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_backdrop(mut self, backdrop: Backdrop) -> Self {
        self.backdrop = Some(backdrop);
        self
    }

    pub fn with_background_color(mut self, color: Rgba) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_preload_js(mut self, script: impl Into<String>) -> Self {
        self.preload_js = Some(script.into());
        self
    }

    pub fn resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    pub fn frameless(mut self, remove_titlebar: bool) -> Self {
        self.remove_titlebar = remove_titlebar;
        self
    }

    pub fn transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn always_on_top(mut self, on_top: bool) -> Self {
        self.always_on_top = on_top;
        self
    }

    pub fn maximized(mut self, maximized: bool) -> Self {
        self.maximized = maximized;
        self
    }

    pub fn fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("engine call failed: {0}")]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

struct WindowInner {
    engine: Arc<dyn EngineTable>,
    registry: Arc<WindowRegistry>,
    /// The app's process-lifetime bridge. Native registrations a window
    /// triggers (currently only `file-drop`) land here, so the engine
    /// never holds a trampoline address that a dropped window handle
    /// owned.
    bridge: Arc<CallbackBridge>,
    id: Mutex<Option<WindowId>>,
    options: Mutex<WindowOptions>,
    emitter: EventEmitter,
}

#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

impl Window {
    pub(crate) fn new(
        engine: Arc<dyn EngineTable>,
        registry: Arc<WindowRegistry>,
        bridge: Arc<CallbackBridge>,
        options: WindowOptions,
    ) -> Self {
        Self {
            inner: Arc::new(WindowInner {
                bridge,
                engine,
                registry,
                id: Mutex::new(None),
                options: Mutex::new(options),
                emitter: EventEmitter::new(),
            }),
        }
    }

    /// Whether two handles refer to the same window.
    pub fn same_handle(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn id(&self) -> Option<WindowId> {
        *self.lock_id()
    }

    // ---- Lifecycle ------------------------------------------------------

    /// Show the window, realizing it on first call.
    pub fn show(&self) -> Result<(), WindowError> {
        if let Some(id) = self.id() {
            self.inner.engine.set_visible(id.get(), true);
            return Ok(());
        }
        self.realize()
    }

    pub fn hide(&self) {
        if let Some(id) = self.id() {
            self.inner.engine.set_visible(id.get(), false);
        }
    }

    /// Close the window. No-op when unrealized or already destroyed.
    pub fn close(&self) -> Result<(), WindowError> {
        let Some(id) = self.id() else {
            return Ok(());
        };
        self.inner.engine.close_window(id.get())?;
        info!(target: "window", %id, "window closed");
        self.finish_close();
        Ok(())
    }

    pub fn focus(&self) {
        if let Some(id) = self.id() {
            self.inner.engine.focus_window(id.get());
        }
    }

    fn realize(&self) -> Result<(), WindowError> {
        let options = self.lock_options().clone();
        let url = options.url.clone().unwrap_or_default();
        let raw_id = self.inner.engine.create_window(&url, 0, &options)?;
        let id = WindowId::new(raw_id).ok_or(EngineError::WindowCreation)?;

        *self.lock_id() = Some(id);
        // The engine may hand out an id a destroyed window used to hold;
        // clear any stale mapping before claiming it.
        self.inner.registry.remove(id);
        self.inner.registry.insert(id, self.clone())?;

        self.inner.engine.set_theme(id.get(), options.theme.as_str());
        if let Some(backdrop) = options.backdrop {
            self.inner.engine.set_backdrop(id.get(), backdrop.as_str());
        }

        info!(target: "window", %id, title = %options.title, "window created");
        self.inner
            .emitter
            .emit(names::CREATED, &EventPayload::Window(id));
        Ok(())
    }

    /// Tear down identity after the window is gone on the native side:
    /// detach from the registry, tell listeners, forget the id.
    pub(crate) fn finish_close(&self) {
        let Some(id) = self.lock_id().take() else {
            return;
        };
        self.inner.registry.remove(id);
        self.inner.emitter.emit(names::CLOSED, &EventPayload::None);
    }

    // ---- Window state ---------------------------------------------------

    pub fn minimize(&self) {
        if let Some(id) = self.id() {
            self.inner.engine.minimize_window(id.get());
        }
    }

    /// Toggle maximize/restore.
    pub fn maximize(&self) {
        if let Some(id) = self.id() {
            self.inner.engine.toggle_maximize_window(id.get());
        }
    }

    /// Restore from the maximized state.
    pub fn restore(&self) {
        if let Some(id) = self.id() {
            if self.inner.engine.is_maximized(id.get()) {
                self.inner.engine.toggle_maximize_window(id.get());
            }
        }
    }

    pub fn set_fullscreen(&self, fullscreen: bool) {
        self.lock_options().fullscreen = fullscreen;
        if let Some(id) = self.id() {
            self.inner.engine.set_fullscreen(id.get(), fullscreen);
        }
    }

    pub fn toggle_fullscreen(&self) {
        let fullscreen = self.lock_options().fullscreen;
        self.set_fullscreen(!fullscreen);
    }

    // ---- Properties -----------------------------------------------------

    pub fn title(&self) -> String {
        self.lock_options().title.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.lock_options().title = title.clone();
        if let Some(id) = self.id() {
            self.inner.engine.set_title(id.get(), &title);
        }
    }

    pub fn size(&self) -> (i32, i32) {
        let options = self.lock_options();
        (options.width, options.height)
    }

    pub fn set_size(&self, width: i32, height: i32) {
        {
            let mut options = self.lock_options();
            options.width = width;
            options.height = height;
        }
        if let Some(id) = self.id() {
            self.inner.engine.set_size(id.get(), width, height);
        }
    }

    pub fn set_min_size(&self, width: i32, height: i32) {
        if let Some(id) = self.id() {
            self.inner.engine.set_min_size(id.get(), width, height);
        }
    }

    pub fn set_max_size(&self, width: i32, height: i32) {
        if let Some(id) = self.id() {
            self.inner.engine.set_max_size(id.get(), width, height);
        }
    }

    pub fn position(&self) -> (i32, i32) {
        let options = self.lock_options();
        (options.x, options.y)
    }

    pub fn set_position(&self, x: i32, y: i32) {
        {
            let mut options = self.lock_options();
            options.x = x;
            options.y = y;
        }
        if let Some(id) = self.id() {
            self.inner.engine.set_position(id.get(), x, y);
        }
    }

    /// Center the window on screen.
    pub fn center(&self) {
        self.set_position(-1, -1);
    }

    pub fn set_visible(&self, visible: bool) {
        if let Some(id) = self.id() {
            self.inner.engine.set_visible(id.get(), visible);
        }
    }

    pub fn set_always_on_top(&self, on_top: bool) {
        self.lock_options().always_on_top = on_top;
        if let Some(id) = self.id() {
            self.inner.engine.set_always_on_top(id.get(), on_top);
        }
    }

    pub fn set_resizable(&self, resizable: bool) {
        self.lock_options().resizable = resizable;
        if let Some(id) = self.id() {
            self.inner.engine.set_resizable(id.get(), resizable);
        }
    }

    pub fn set_theme(&self, theme: Theme) {
        self.lock_options().theme = theme;
        if let Some(id) = self.id() {
            self.inner.engine.set_theme(id.get(), theme.as_str());
        }
    }

    pub fn theme(&self) -> Theme {
        if let Some(id) = self.id() {
            if let Some(theme) = self
                .inner
                .engine
                .theme(id.get())
                .and_then(|name| Theme::from_name(&name))
            {
                return theme;
            }
        }
        self.lock_options().theme
    }

    pub fn set_backdrop(&self, backdrop: Backdrop) {
        self.lock_options().backdrop = Some(backdrop);
        if let Some(id) = self.id() {
            self.inner.engine.set_backdrop(id.get(), backdrop.as_str());
        }
    }

    // ---- Embedded content -----------------------------------------------

    pub fn load_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.lock_options().url = Some(url.clone());
        if let Some(id) = self.id() {
            self.inner.engine.navigate(id.get(), &url);
        }
    }

    pub fn eval_js(&self, script: &str) {
        if let Some(id) = self.id() {
            self.inner.engine.eval_script(id.get(), script);
        }
    }

    // ---- State queries --------------------------------------------------

    pub fn is_visible(&self) -> bool {
        self.id()
            .is_some_and(|id| self.inner.engine.is_visible(id.get()))
    }

    pub fn is_maximized(&self) -> bool {
        self.id()
            .is_some_and(|id| self.inner.engine.is_maximized(id.get()))
    }

    pub fn is_minimized(&self) -> bool {
        self.id()
            .is_some_and(|id| self.inner.engine.is_minimized(id.get()))
    }

    pub fn is_focused(&self) -> bool {
        self.id()
            .is_some_and(|id| self.inner.engine.is_focused(id.get()))
    }

    pub fn is_fullscreen(&self) -> bool {
        // The engine offers no fullscreen query; tracked locally.
        self.lock_options().fullscreen
    }

    // ---- Events ---------------------------------------------------------

    /// Register a listener for a window event.
    ///
    /// `file-drop` additionally requires a native registration (which
    /// takes over the embedded content's drag handling); it is wired
    /// lazily, once per window, on first use.
    pub fn on<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        if event == names::FILE_DROP {
            self.wire_file_drop();
        }
        self.inner.emitter.on(event, callback)
    }

    pub fn once<F>(&self, event: &str, callback: F) -> ListenerId
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        if event == names::FILE_DROP {
            self.wire_file_drop();
        }
        self.inner.emitter.once(event, callback)
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.inner.emitter.off(event, id)
    }

    pub fn remove_all_listeners(&self, event: Option<&str>) {
        self.inner.emitter.remove_all(event);
    }

    pub fn emit(&self, event: &str, payload: &EventPayload) -> bool {
        self.inner.emitter.emit(event, payload)
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.emitter.listener_count(event)
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.inner.emitter.has_listeners(event)
    }

    pub fn event_names(&self) -> Vec<String> {
        self.inner.emitter.event_names()
    }

    /// Route a native window event into this handle's emitter. Close-type
    /// events additionally tear down identity.
    pub(crate) fn handle_native_event(&self, event: &str, data: String) {
        debug!(target: "window", event, "native window event");
        self.inner
            .emitter
            .emit(event, &EventPayload::Text(data));
        if matches!(event, names::CLOSE | names::CLOSED | names::WINDOW_CLOSED) {
            self.finish_close();
        }
    }

    pub(crate) fn handle_page_load(&self, url: String, status: String) {
        self.inner
            .emitter
            .emit(names::PAGE_LOADED, &EventPayload::PageLoad { url, status });
    }

    /// Register the `file-drop` trampoline with the engine, once per app.
    /// The trampoline lives on the app's bridge and resolves the reported
    /// id through the registry, so one registration routes drops for every
    /// window, past and future; an id the registry does not know is
    /// dropped with a diagnostic.
    fn wire_file_drop(&self) {
        if self.inner.bridge.is_registered(names::FILE_DROP) {
            return;
        }
        let registry = Arc::clone(&self.inner.registry);
        let result = self.inner.bridge.register(
            names::FILE_DROP,
            Box::new(move |raw_id, bytes| {
                let Some(window) = WindowId::new(raw_id).and_then(|id| registry.lookup(id)) else {
                    warn!(target: "window", raw_id, "file-drop for unknown window dropped");
                    return NativeReply::unhandled();
                };
                let data = decode::file_drop(bytes);
                window
                    .inner
                    .emitter
                    .emit(names::FILE_DROP, &EventPayload::FileDrop(data));
                NativeReply::handled()
            }),
        );
        if let Err(err) = result {
            error!(target: "window", error = %err, "failed to register file-drop callback");
        }
    }

    fn lock_id(&self) -> std::sync::MutexGuard<'_, Option<WindowId>> {
        match self.inner.id.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_options(&self) -> std::sync::MutexGuard<'_, WindowOptions> {
        match self.inner.options.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let options = self.lock_options();
        f.debug_struct("Window")
            .field("id", &self.id())
            .field("title", &options.title)
            .field("size", &(options.width, options.height))
            .finish()
    }
}
