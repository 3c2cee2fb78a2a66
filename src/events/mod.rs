//! Event dispatch: per-object emitters and process-wide native events.

pub mod emitter;
pub mod global;

/// Standard event names delivered by the engine.
pub mod names {
    // App lifecycle.
    pub const APP_READY: &str = "app-ready";
    pub const WINDOW_ALL_CLOSED: &str = "window-all-closed";
    pub const BEFORE_QUIT: &str = "before-quit";

    // Window lifecycle and state.
    pub const CREATED: &str = "created";
    pub const CLOSE: &str = "close";
    pub const CLOSED: &str = "closed";
    pub const WINDOW_CLOSED: &str = "window-closed";
    pub const FOCUS: &str = "focus";
    pub const BLUR: &str = "blur";
    pub const RESIZE: &str = "resize";
    pub const MOVE: &str = "move";

    // Embedded content.
    pub const PAGE_LOADED: &str = "page-loaded";
    pub const FILE_DROP: &str = "file-drop";
    pub const THEME_CHANGED: &str = "theme-changed";

    // Bridge-level registration names.
    pub const WINDOW_EVENT: &str = "window-event";
    pub const PAGE_LOAD: &str = "page-load";
    pub const IPC_MESSAGE: &str = "ipc-message";
}
