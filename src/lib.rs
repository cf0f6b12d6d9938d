//! FlyonUI hydration runtime
//!
//! Loaded as a WebAssembly module next to a server-rendered page, it waits
//! for the DOM and the FlyonUI script bundle, initialises the library's
//! components, wires page-local handlers and then announces readiness
//! through `#wasm-status` and a `wasmReady` window event.
//!
//! Every browser touchpoint sits behind a trait with a browser and a mock
//! implementation, so the whole runtime also runs in native tests.

use wasm_bindgen::prelude::*;

/// Log to browser console
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    pub fn log(s: &str);

    #[wasm_bindgen(js_namespace = console)]
    pub fn warn(s: &str);

    #[wasm_bindgen(js_namespace = console)]
    pub fn error(s: &str);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn log(s: &str) {
    println!("LOG: {}", s);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn warn(s: &str) {
    eprintln!("WARN: {}", s);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn error(s: &str) {
    eprintln!("ERROR: {}", s);
}

/// Helper macro for console logging
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => ($crate::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => ($crate::warn(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => ($crate::error(&format!($($t)*)))
}

pub mod assets;
pub mod bindings;
pub mod catalog;
pub mod component;
pub mod dom;
pub mod entry;
pub mod error;
pub mod js;
pub mod manager;
pub mod mock;
pub mod orchestrator;
pub mod scheduler;

pub use catalog::ComponentKind;
pub use component::{ComponentBridge, FlyonBridge, Options};
pub use dom::{DomBridge, Element, Event, ReadyState, ReadyWait};
pub use error::{BridgeError, BridgeResult};
pub use js::{Handle, JsBridge};
pub use manager::Manager;
pub use orchestrator::{InitConfig, InitOutcome, Orchestrator, PendingOutcome};
pub use scheduler::Scheduler;

/// Initialize panic hook and, in the browser, start hydrating the page.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(all(target_arch = "wasm32", feature = "auto-start"))]
    if let Err(e) = entry::start() {
        console_error!("Hydration could not start: {}", e);
    }
}
