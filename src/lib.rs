//! Casement: a desktop shell framework embedding the Vitrine native WebView
//! engine.
//!
//! The crate is the application-layer core that sits between host Rust code
//! and the engine's C function table: it marshals closures across the FFI
//! boundary as address-stable trampolines, keeps the authoritative mapping
//! from native window ids to [`Window`] handles, and fans native
//! notifications out through a uniform event and IPC API.
//!
//! ```no_run
//! use casement::{App, WindowOptions};
//!
//! fn main() -> anyhow::Result<()> {
//!     let app = App::load()?;
//!     let window = app.create_window(
//!         WindowOptions::new("My App")
//!             .with_size(1024, 768)
//!             .with_url("http://127.0.0.1:8642/index.html"),
//!     );
//!     app.on_ready(move |_| {
//!         if let Err(err) = window.show() {
//!             tracing::error!(target: "casement", error = %err, "failed to show window");
//!         }
//!     });
//!     app.run()
//! }
//! ```

pub mod app;
pub mod bridge;
pub mod engine;
pub mod events;
pub mod ipc;
pub mod registry;
pub mod window;

pub use app::App;
pub use bridge::{BridgeError, CallbackBridge};
pub use engine::{EngineError, EngineTable};
pub use events::emitter::{EventEmitter, EventPayload, ListenerId};
pub use events::global::GlobalEventManager;
pub use ipc::{IpcError, IpcResponse, IpcRouter};
pub use registry::{RegistryError, WindowId, WindowRegistry};
pub use window::{Backdrop, Rgba, Theme, Window, WindowError, WindowOptions};
