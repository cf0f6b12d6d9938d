//! Clock and timers
//!
//! Every suspension point that waits on wall-clock time (library polls,
//! guard timers, the delay before `wasmReady`) goes through a [`Scheduler`]
//! so the same state machine runs against `setTimeout` in the browser and
//! against a virtual clock in tests.

use std::time::Duration;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

use crate::error::{BridgeError, BridgeResult};

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce()>;

pub trait Scheduler {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;

    /// Runs `task` on a later turn, no earlier than `delay` from now.
    fn set_timeout(&self, delay: Duration, task: Task);
}

/// `performance.now()` + `window.setTimeout`
#[derive(Debug)]
pub struct BrowserScheduler {
    window: web_sys::Window,
    performance: Option<web_sys::Performance>,
}

impl BrowserScheduler {
    pub fn new() -> BridgeResult<Self> {
        let window = web_sys::window().ok_or(BridgeError::Unsupported)?;
        let performance = window.performance();
        Ok(BrowserScheduler { window, performance })
    }
}

impl Scheduler for BrowserScheduler {
    fn now(&self) -> Duration {
        let ms = match &self.performance {
            Some(perf) => perf.now(),
            None => js_sys::Date::now(),
        };
        Duration::from_secs_f64(ms.max(0.0) / 1000.0)
    }

    fn set_timeout(&self, delay: Duration, task: Task) {
        let callback = Closure::once_into_js(move || task());
        let ms = delay.as_millis().min(i32::MAX as u128) as i32;
        if let Err(e) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), ms)
        {
            console_error!("setTimeout failed: {:?}", e);
        }
    }
}
