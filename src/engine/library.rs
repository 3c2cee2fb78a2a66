//! Dynamically loaded Vitrine engine.
//!
//! Resolves the whole `vitrine_*` function table once at load time so a
//! missing symbol fails fast instead of mid-session, then implements
//! [`EngineTable`] by calling straight through. All unsafe FFI calls live
//! in this file.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::ptr;

use libloading::Library;
use tracing::{debug, info, warn};

use crate::window::WindowOptions;

use super::ffi::{RawRgba, RawTrampoline, RawWebViewSettings, RawWindowOptions, TrampolineAddr};
use super::{EngineError, EngineTable};

/// Environment variable overriding where the engine library is loaded from.
pub const LIBRARY_PATH_ENV: &str = "CASEMENT_VITRINE_PATH";

const LIBRARY_NAME: &str = "vitrine";

type CreateWindowFn = unsafe extern "C" fn(
    url: *const c_char,
    parent: u32,
    options: *const RawWindowOptions,
    settings: *const RawWebViewSettings,
) -> u32;
type WindowFn = unsafe extern "C" fn(id: u32) -> c_int;
type WindowFlagFn = unsafe extern "C" fn(id: u32, value: c_int) -> c_int;
type WindowStrFn = unsafe extern "C" fn(id: u32, value: *const c_char) -> c_int;
type WindowSizeFn = unsafe extern "C" fn(id: u32, a: i32, b: i32) -> c_int;
type GetThemeFn = unsafe extern "C" fn(id: u32, buf: *mut c_char, len: c_int) -> c_int;
type OnFn = unsafe extern "C" fn(event: *const c_char, trampoline: *const RawTrampoline) -> c_int;
type OffFn = unsafe extern "C" fn(event: *const c_char) -> c_int;
type PostMessageFn = unsafe extern "C" fn(id: u32, data: *const u8, len: usize) -> c_int;
type CountFn = unsafe extern "C" fn() -> u32;
type RunFn = unsafe extern "C" fn() -> c_int;
type QuitFn = unsafe extern "C" fn();

/// Resolved function table. Plain fn pointers copied out of the library;
/// the owning [`Library`] pins their validity.
struct VitrineApi {
    create_window: CreateWindowFn,
    close_window: WindowFn,
    focus_window: WindowFn,
    minimize_window: WindowFn,
    toggle_maximize_window: WindowFn,
    set_fullscreen: WindowFlagFn,
    set_title: WindowStrFn,
    set_size: WindowSizeFn,
    set_min_size: WindowSizeFn,
    set_max_size: WindowSizeFn,
    set_position: WindowSizeFn,
    set_visible: WindowFlagFn,
    set_always_on_top: WindowFlagFn,
    set_resizable: WindowFlagFn,
    set_theme: WindowStrFn,
    get_theme: GetThemeFn,
    set_backdrop: WindowStrFn,
    navigate: WindowStrFn,
    eval_script: WindowStrFn,
    is_visible: WindowFn,
    is_maximized: WindowFn,
    is_minimized: WindowFn,
    is_focused: WindowFn,
    on: OnFn,
    off: OffFn,
    post_message: PostMessageFn,
    window_count: CountFn,
    run: RunFn,
    quit: QuitFn,
}

pub struct DynamicEngine {
    api: VitrineApi,
    // Keeps every resolved fn pointer valid. Dropped last.
    _library: Library,
}

fn sym<T: Copy>(library: &Library, name: &'static str) -> Result<T, EngineError> {
    // SAFETY: the caller supplies the correct fn type for the named symbol;
    // getting a symbol of the wrong type is the library's contract to uphold.
    unsafe { library.get::<T>(name.as_bytes()) }
        .map(|symbol| *symbol)
        .map_err(|_| EngineError::MissingSymbol { name })
}

impl DynamicEngine {
    /// Load the engine from the default location: `$CASEMENT_VITRINE_PATH`
    /// when set, the platform library name (`libvitrine.so` / `vitrine.dll`
    /// / `libvitrine.dylib`) on the loader search path otherwise.
    pub fn load() -> Result<Self, EngineError> {
        let path = std::env::var_os(LIBRARY_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(libloading::library_filename(LIBRARY_NAME)));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, EngineError> {
        // SAFETY: loading a library runs its initializers; the Vitrine
        // engine documents its initializer as side-effect free.
        let library = unsafe { Library::new(path) }?;
        let api = VitrineApi {
            create_window: sym(&library, "vitrine_create_window")?,
            close_window: sym(&library, "vitrine_close_window")?,
            focus_window: sym(&library, "vitrine_focus_window")?,
            minimize_window: sym(&library, "vitrine_minimize_window")?,
            toggle_maximize_window: sym(&library, "vitrine_toggle_maximize_window")?,
            set_fullscreen: sym(&library, "vitrine_set_window_fullscreen")?,
            set_title: sym(&library, "vitrine_set_window_title")?,
            set_size: sym(&library, "vitrine_set_window_size")?,
            set_min_size: sym(&library, "vitrine_set_window_min_size")?,
            set_max_size: sym(&library, "vitrine_set_window_max_size")?,
            set_position: sym(&library, "vitrine_set_window_position")?,
            set_visible: sym(&library, "vitrine_set_window_visible")?,
            set_always_on_top: sym(&library, "vitrine_set_window_always_on_top")?,
            set_resizable: sym(&library, "vitrine_set_window_resizable")?,
            set_theme: sym(&library, "vitrine_set_window_theme")?,
            get_theme: sym(&library, "vitrine_get_window_theme")?,
            set_backdrop: sym(&library, "vitrine_set_window_backdrop")?,
            navigate: sym(&library, "vitrine_navigate")?,
            eval_script: sym(&library, "vitrine_eval_script")?,
            is_visible: sym(&library, "vitrine_is_window_visible")?,
            is_maximized: sym(&library, "vitrine_is_window_maximized")?,
            is_minimized: sym(&library, "vitrine_is_window_minimized")?,
            is_focused: sym(&library, "vitrine_is_window_focused")?,
            on: sym(&library, "vitrine_on")?,
            off: sym(&library, "vitrine_off")?,
            post_message: sym(&library, "vitrine_post_message")?,
            window_count: sym(&library, "vitrine_window_count")?,
            run: sym(&library, "vitrine_run")?,
            quit: sym(&library, "vitrine_quit")?,
        };
        info!(target: "engine", path = %path.display(), "loaded vitrine engine");
        Ok(Self {
            api,
            _library: library,
        })
    }

    fn set_str(&self, call: &'static str, f: WindowStrFn, id: u32, value: &str) {
        let Ok(value) = CString::new(value) else {
            warn!(target: "engine", call, id, "value contains interior NUL, skipped");
            return;
        };
        // SAFETY: `value` outlives the call; the engine copies the string.
        let status = unsafe { f(id, value.as_ptr()) };
        if status != 1 {
            warn!(target: "engine", call, id, status, "engine rejected call");
        }
    }

    fn set_flag(&self, call: &'static str, f: WindowFlagFn, id: u32, value: bool) {
        // SAFETY: no pointers cross the boundary.
        let status = unsafe { f(id, c_int::from(value)) };
        if status != 1 {
            warn!(target: "engine", call, id, status, "engine rejected call");
        }
    }

    fn set_pair(&self, call: &'static str, f: WindowSizeFn, id: u32, a: i32, b: i32) {
        // SAFETY: no pointers cross the boundary.
        let status = unsafe { f(id, a, b) };
        if status != 1 {
            warn!(target: "engine", call, id, status, "engine rejected call");
        }
    }

    fn call(&self, call: &'static str, f: WindowFn, id: u32) {
        // SAFETY: no pointers cross the boundary.
        let status = unsafe { f(id) };
        if status != 1 {
            warn!(target: "engine", call, id, status, "engine rejected call");
        }
    }

    fn query(&self, f: WindowFn, id: u32) -> bool {
        // SAFETY: no pointers cross the boundary.
        unsafe { f(id) == 1 }
    }
}

impl EngineTable for DynamicEngine {
    fn create_window(
        &self,
        url: &str,
        parent: u32,
        options: &WindowOptions,
    ) -> Result<u32, EngineError> {
        let url = CString::new(url)?;
        let title = CString::new(options.title.as_str())?;
        let theme = CString::new(options.theme.as_str())?;
        let user_agent = options
            .user_agent
            .as_deref()
            .map(CString::new)
            .transpose()?;
        let preload_js = options
            .preload_js
            .as_deref()
            .map(CString::new)
            .transpose()?;

        let raw_options = RawWindowOptions {
            title: title.as_ptr(),
            width: options.width,
            height: options.height,
            resizable: c_int::from(options.resizable),
            remove_titlebar: c_int::from(options.remove_titlebar),
            transparent: c_int::from(options.transparent),
            background_color: RawRgba {
                r: options.background_color.r,
                g: options.background_color.g,
                b: options.background_color.b,
                a: options.background_color.a,
            },
            always_on_top: c_int::from(options.always_on_top),
            no_center: c_int::from(options.x != -1 || options.y != -1),
            theme: theme.as_ptr(),
            maximized: c_int::from(options.maximized),
            maximizable: c_int::from(options.maximizable),
            minimizable: c_int::from(options.minimizable),
            x: options.x,
            y: options.y,
            min_width: options.min_width,
            min_height: options.min_height,
            max_width: options.max_width,
            max_height: options.max_height,
            fullscreen: c_int::from(options.fullscreen),
            focus: c_int::from(options.focus),
            hide_window: c_int::from(options.hidden),
            use_page_icon: c_int::from(options.use_page_icon),
        };
        let raw_settings = RawWebViewSettings {
            autoplay: c_int::from(options.autoplay),
            background_throttling: c_int::from(options.background_throttling),
            disable_right_click: c_int::from(options.disable_right_click),
            user_agent: user_agent.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            preload_js: preload_js.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
        };

        // SAFETY: all pointers reference locals that outlive the call.
        let id = unsafe { (self.api.create_window)(url.as_ptr(), parent, &raw_options, &raw_settings) };
        if id == 0 {
            return Err(EngineError::WindowCreation);
        }
        debug!(target: "engine", id, "created native window");
        Ok(id)
    }

    fn close_window(&self, id: u32) -> Result<(), EngineError> {
        // SAFETY: no pointers cross the boundary.
        let status = unsafe { (self.api.close_window)(id) };
        if status != 1 {
            return Err(EngineError::CallFailed {
                call: "close_window",
                status,
            });
        }
        Ok(())
    }

    fn focus_window(&self, id: u32) {
        self.call("focus_window", self.api.focus_window, id);
    }

    fn minimize_window(&self, id: u32) {
        self.call("minimize_window", self.api.minimize_window, id);
    }

    fn toggle_maximize_window(&self, id: u32) {
        self.call("toggle_maximize_window", self.api.toggle_maximize_window, id);
    }

    fn set_fullscreen(&self, id: u32, fullscreen: bool) {
        self.set_flag("set_fullscreen", self.api.set_fullscreen, id, fullscreen);
    }

    fn set_title(&self, id: u32, title: &str) {
        self.set_str("set_title", self.api.set_title, id, title);
    }

    fn set_size(&self, id: u32, width: i32, height: i32) {
        self.set_pair("set_size", self.api.set_size, id, width, height);
    }

    fn set_min_size(&self, id: u32, width: i32, height: i32) {
        self.set_pair("set_min_size", self.api.set_min_size, id, width, height);
    }

    fn set_max_size(&self, id: u32, width: i32, height: i32) {
        self.set_pair("set_max_size", self.api.set_max_size, id, width, height);
    }

    fn set_position(&self, id: u32, x: i32, y: i32) {
        self.set_pair("set_position", self.api.set_position, id, x, y);
    }

    fn set_visible(&self, id: u32, visible: bool) {
        self.set_flag("set_visible", self.api.set_visible, id, visible);
    }

    fn set_always_on_top(&self, id: u32, on_top: bool) {
        self.set_flag("set_always_on_top", self.api.set_always_on_top, id, on_top);
    }

    fn set_resizable(&self, id: u32, resizable: bool) {
        self.set_flag("set_resizable", self.api.set_resizable, id, resizable);
    }

    fn set_theme(&self, id: u32, theme: &str) {
        self.set_str("set_theme", self.api.set_theme, id, theme);
    }

    fn theme(&self, id: u32) -> Option<String> {
        let mut buf = [0 as c_char; 32];
        // SAFETY: the engine writes at most `len` bytes including the NUL.
        let status = unsafe { (self.api.get_theme)(id, buf.as_mut_ptr(), buf.len() as c_int) };
        if status != 1 {
            return None;
        }
        // SAFETY: on success the engine guarantees NUL termination in `buf`.
        let value = unsafe { CStr::from_ptr(buf.as_ptr()) };
        Some(value.to_string_lossy().into_owned())
    }

    fn set_backdrop(&self, id: u32, backdrop: &str) {
        self.set_str("set_backdrop", self.api.set_backdrop, id, backdrop);
    }

    fn navigate(&self, id: u32, url: &str) {
        self.set_str("navigate", self.api.navigate, id, url);
    }

    fn eval_script(&self, id: u32, script: &str) {
        self.set_str("eval_script", self.api.eval_script, id, script);
    }

    fn is_visible(&self, id: u32) -> bool {
        self.query(self.api.is_visible, id)
    }

    fn is_maximized(&self, id: u32) -> bool {
        self.query(self.api.is_maximized, id)
    }

    fn is_minimized(&self, id: u32) -> bool {
        self.query(self.api.is_minimized, id)
    }

    fn is_focused(&self, id: u32) -> bool {
        self.query(self.api.is_focused, id)
    }

    fn register_callback(
        &self,
        event: &str,
        trampoline: TrampolineAddr,
    ) -> Result<(), EngineError> {
        let event = CString::new(event)?;
        // SAFETY: `event` outlives the call; the trampoline address stays
        // valid per the bridge's append-only ownership.
        let status = unsafe { (self.api.on)(event.as_ptr(), trampoline.0) };
        if status != 1 {
            return Err(EngineError::CallFailed {
                call: "register_callback",
                status,
            });
        }
        Ok(())
    }

    fn unregister_callback(&self, event: &str) -> Result<(), EngineError> {
        let event = CString::new(event)?;
        // SAFETY: `event` outlives the call.
        let status = unsafe { (self.api.off)(event.as_ptr()) };
        if status != 1 {
            return Err(EngineError::CallFailed {
                call: "unregister_callback",
                status,
            });
        }
        Ok(())
    }

    fn post_message(&self, id: u32, bytes: &[u8]) -> Result<(), EngineError> {
        // SAFETY: `bytes` outlives the call; the engine copies the buffer.
        let status = unsafe { (self.api.post_message)(id, bytes.as_ptr(), bytes.len()) };
        if status != 1 {
            return Err(EngineError::CallFailed {
                call: "post_message",
                status,
            });
        }
        Ok(())
    }

    fn window_count(&self) -> usize {
        // SAFETY: no pointers cross the boundary.
        unsafe { (self.api.window_count)() as usize }
    }

    fn run(&self) -> Result<(), EngineError> {
        // SAFETY: blocks inside the engine's message pump; callbacks arrive
        // on the pump thread through registered trampolines.
        let status = unsafe { (self.api.run)() };
        if status != 0 {
            return Err(EngineError::CallFailed {
                call: "run",
                status,
            });
        }
        Ok(())
    }

    fn quit(&self) {
        // SAFETY: no pointers cross the boundary.
        unsafe { (self.api.quit)() }
    }
}
