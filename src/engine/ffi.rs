//! Raw C-compatible types for the Vitrine function table.
//!
//! Everything that crosses the engine boundary is declared here, in one
//! place, so the unsafe surface stays auditable. The engine addresses
//! windows by `u32` id; id `0` is the "no window" / global scope sentinel
//! and is never a live window.

use std::os::raw::{c_char, c_int};

/// RGBA color as the engine expects it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Declared window configuration handed to `vitrine_create_window`.
///
/// String fields point into caller-owned memory that must stay alive for
/// the duration of the call; the engine copies what it needs.
#[repr(C)]
pub struct RawWindowOptions {
    pub title: *const c_char,
    pub width: i32,
    pub height: i32,
    pub resizable: c_int,
    pub remove_titlebar: c_int,
    pub transparent: c_int,
    pub background_color: RawRgba,
    pub always_on_top: c_int,
    pub no_center: c_int,
    pub theme: *const c_char,
    pub maximized: c_int,
    pub maximizable: c_int,
    pub minimizable: c_int,
    pub x: i32,
    pub y: i32,
    pub min_width: i32,
    pub min_height: i32,
    pub max_width: i32,
    pub max_height: i32,
    pub fullscreen: c_int,
    pub focus: c_int,
    pub hide_window: c_int,
    pub use_page_icon: c_int,
}

/// Embedded-content settings handed to `vitrine_create_window`.
#[repr(C)]
pub struct RawWebViewSettings {
    pub autoplay: c_int,
    pub background_throttling: c_int,
    pub disable_right_click: c_int,
    pub user_agent: *const c_char,
    pub preload_js: *const c_char,
}

/// Synchronous result of a trampoline invocation, as seen by the engine.
///
/// `status` is `1` when the notification was handled, `0` when no handler
/// accepted it and `-1` when dispatch failed internally. `data`, when
/// non-null, is a NUL-terminated UTF-8 reply owned by the trampoline and
/// valid until the next invocation of the *same* trampoline; the engine
/// must copy it before returning control.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawReply {
    pub status: c_int,
    pub data: *const c_char,
}

impl RawReply {
    pub const fn failed() -> Self {
        Self {
            status: -1,
            data: std::ptr::null(),
        }
    }
}

/// Entry point of a registered callback.
///
/// The engine calls back with the registered trampoline address as the
/// first argument, which is how a fixed extern "C" entry point recovers
/// the host closure it adapts. `data`/`len` describe an engine-owned byte
/// buffer that is only valid for the duration of the call.
pub type RawInvokeFn = unsafe extern "C" fn(
    trampoline: *const RawTrampoline,
    window_id: u32,
    data: *const u8,
    len: usize,
) -> RawReply;

/// Header of every callback registered with `vitrine_on`.
///
/// The registration primitive takes a single address; the engine treats it
/// as a pointer to this struct and invokes through its first field. Host
/// code embeds `RawTrampoline` as the first field of a larger allocation
/// carrying the closure (see [`crate::bridge::Trampoline`]), so the two
/// share an address.
#[repr(C)]
pub struct RawTrampoline {
    pub invoke: RawInvokeFn,
}

/// A trampoline address as handed to the engine's registration primitive.
///
/// Plain pointer wrapper so the [`crate::engine::EngineTable`] seam stays
/// free of raw pointer arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrampolineAddr(pub *const RawTrampoline);

// SAFETY: the address points at a `Trampoline` allocation that is never
// freed while the engine could still invoke it (append-only ownership in
// the bridge), and invocation through it is synchronized by the trampoline
// itself. Moving the address between threads is therefore sound.
unsafe impl Send for TrampolineAddr {}
unsafe impl Sync for TrampolineAddr {}
