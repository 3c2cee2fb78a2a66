//! The native engine boundary.
//!
//! [`EngineTable`] is the seam over the Vitrine function table: everything
//! the rest of the crate needs from the engine goes through it. The
//! production implementation ([`library::DynamicEngine`]) resolves the table
//! out of the engine's dynamic library; [`stub::StubEngine`] is an
//! in-process stand-in used by tests and headless runs.

pub mod ffi;
pub mod library;
pub mod stub;

use thiserror::Error;

use crate::window::WindowOptions;
use ffi::TrampolineAddr;

pub use library::DynamicEngine;
pub use stub::StubEngine;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to load engine library: {0}")]
    Load(#[from] libloading::Error),
    #[error("engine library is missing symbol `{name}`")]
    MissingSymbol { name: &'static str },
    #[error("engine rejected `{call}` (status {status})")]
    CallFailed { call: &'static str, status: i32 },
    #[error("engine reported window creation failure")]
    WindowCreation,
    #[error("string contains interior NUL byte")]
    Nul(#[from] std::ffi::NulError),
}

/// Capability set supplied by the native engine.
///
/// Window-addressed operations take the raw `u32` id (0 = global scope);
/// resolving ids to [`crate::window::Window`] handles is the registry's
/// job, not the engine's. Mutators are fire-and-forget the way the engine
/// itself treats them: implementations log rejected calls instead of
/// surfacing them, while operations whose failure the caller must observe
/// (creation, close, callback registration, message delivery, the run
/// loop) return `Result`.
///
/// Implementations must be callable from a thread the host does not own;
/// the engine delivers callbacks from its internal message pump.
pub trait EngineTable: Send + Sync {
    fn create_window(&self, url: &str, parent: u32, options: &WindowOptions)
        -> Result<u32, EngineError>;
    fn close_window(&self, id: u32) -> Result<(), EngineError>;

    fn focus_window(&self, id: u32);
    fn minimize_window(&self, id: u32);
    fn toggle_maximize_window(&self, id: u32);
    fn set_fullscreen(&self, id: u32, fullscreen: bool);

    fn set_title(&self, id: u32, title: &str);
    fn set_size(&self, id: u32, width: i32, height: i32);
    fn set_min_size(&self, id: u32, width: i32, height: i32);
    fn set_max_size(&self, id: u32, width: i32, height: i32);
    fn set_position(&self, id: u32, x: i32, y: i32);
    fn set_visible(&self, id: u32, visible: bool);
    fn set_always_on_top(&self, id: u32, on_top: bool);
    fn set_resizable(&self, id: u32, resizable: bool);
    fn set_theme(&self, id: u32, theme: &str);
    fn theme(&self, id: u32) -> Option<String>;
    fn set_backdrop(&self, id: u32, backdrop: &str);

    fn navigate(&self, id: u32, url: &str);
    fn eval_script(&self, id: u32, script: &str);

    fn is_visible(&self, id: u32) -> bool;
    fn is_maximized(&self, id: u32) -> bool;
    fn is_minimized(&self, id: u32) -> bool;
    fn is_focused(&self, id: u32) -> bool;

    /// Register `trampoline` for the named event. The engine keeps at most
    /// one address per name; a second registration under the same name
    /// replaces the first.
    fn register_callback(&self, event: &str, trampoline: TrampolineAddr)
        -> Result<(), EngineError>;
    /// Remove the registration for the named event. Unregistering a name
    /// with no active registration is a no-op.
    fn unregister_callback(&self, event: &str) -> Result<(), EngineError>;

    /// Deliver raw bytes to a window's embedded content.
    fn post_message(&self, id: u32, bytes: &[u8]) -> Result<(), EngineError>;

    fn window_count(&self) -> usize;

    /// Enter the engine's event pump. Returns when the engine quits.
    fn run(&self) -> Result<(), EngineError>;
    fn quit(&self);
}
