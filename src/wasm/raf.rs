use std::rc::Rc;

use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{DedicatedWorkerGlobalScope, Window};

use crate::frame::{FrameCallback, FrameId, FrameScheduler};
use crate::monitor::FrameMonitor;

/// The global that owns `requestAnimationFrame`: the page or a dedicated worker.
#[derive(Clone)]
pub enum FrameGlobal {
    Window(Window),
    Worker(DedicatedWorkerGlobalScope),
}

impl FrameGlobal {
    pub fn current() -> Result<Self, JsValue> {
        if let Some(window) = web_sys::window() {
            return Ok(Self::Window(window));
        }
        js_sys::global()
            .dyn_into::<DedicatedWorkerGlobalScope>()
            .map(Self::Worker)
            .map_err(|_| JsValue::from_str("no window or dedicated worker global"))
    }

    pub fn request_animation_frame(&self, callback: &js_sys::Function) -> Result<i32, JsValue> {
        match self {
            Self::Window(window) => window.request_animation_frame(callback),
            Self::Worker(scope) => scope.request_animation_frame(callback),
        }
    }

    pub fn cancel_animation_frame(&self, id: i32) {
        let result = match self {
            Self::Window(window) => window.cancel_animation_frame(id),
            Self::Worker(scope) => scope.cancel_animation_frame(id),
        };
        if let Err(err) = result {
            tracing::warn!(error = %super::describe_js(&err), "cancelAnimationFrame failed");
        }
    }
}

/// [`FrameScheduler`] over `requestAnimationFrame`.
pub struct RafScheduler {
    global: FrameGlobal,
    monitor: Option<Rc<FrameMonitor>>,
}

impl RafScheduler {
    pub fn new(global: FrameGlobal, monitor: Option<Rc<FrameMonitor>>) -> Self {
        Self { global, monitor }
    }
}

impl FrameScheduler for RafScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameId {
        let monitor = self.monitor.clone();
        let js = Closure::once_into_js(move |timestamp: f64| {
            if let Some(monitor) = monitor {
                monitor.record(timestamp);
            }
            callback();
        });
        match self.global.request_animation_frame(js.unchecked_ref()) {
            Ok(id) => id,
            Err(err) => {
                // The callback is dropped; loops relying on it simply stop.
                tracing::error!(error = %super::describe_js(&err), "requestAnimationFrame failed");
                0
            }
        }
    }

    fn cancel_frame(&self, id: FrameId) {
        self.global.cancel_animation_frame(id);
    }
}
