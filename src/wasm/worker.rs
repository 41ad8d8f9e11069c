//! Entry point inside the render worker.
//!
//! `static/worker.js` instantiates this module inside a module worker, queues
//! whatever messages arrive meanwhile, and calls [`worker_main`] with them.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{DedicatedWorkerGlobalScope, MessageEvent, OffscreenCanvas};

use super::raf::FrameGlobal;
use super::render::{context_for_offscreen, lose_context, CrtRenderer};
use crate::error::LifecycleError;
use crate::protocol::{start_or_release, Control, InitParams, WorkerCommand, WorkerEndpoint};

type Endpoint = Rc<RefCell<WorkerEndpoint<CrtRenderer>>>;

#[wasm_bindgen]
pub fn worker_main(backlog: js_sys::Array) -> Result<(), JsValue> {
    super::logging::init("info");
    let scope: DedicatedWorkerGlobalScope = js_sys::global().dyn_into()?;
    let endpoint: Endpoint = Rc::new(RefCell::new(WorkerEndpoint::new()));

    for message in backlog.iter() {
        if handle_message(&scope, &endpoint, message) == Control::Terminate {
            return Ok(());
        }
    }

    let handler = {
        let scope = scope.clone();
        let endpoint = Rc::clone(&endpoint);
        Closure::wrap(Box::new(move |event: MessageEvent| {
            handle_message(&scope, &endpoint, event.data());
        }) as Box<dyn FnMut(MessageEvent)>)
    };
    scope.set_onmessage(Some(handler.as_ref().unchecked_ref()));
    // Lives as long as the worker.
    handler.forget();
    Ok(())
}

fn handle_message(scope: &DedicatedWorkerGlobalScope, endpoint: &Endpoint, data: JsValue) -> Control {
    let canvas = take_canvas(&data);
    let command = match serde_wasm_bindgen::from_value::<WorkerCommand>(data) {
        Ok(command) => command,
        Err(err) => {
            tracing::warn!(error = %err, "unrecognised worker message");
            return Control::Continue;
        }
    };

    let result = endpoint
        .borrow_mut()
        .handle(command, |params| build_renderer(canvas.as_ref(), params));
    match result {
        Ok(Control::Terminate) => {
            endpoint.borrow_mut().release();
            tracing::debug!("render worker closing");
            scope.close();
            Control::Terminate
        }
        Ok(Control::Continue) => Control::Continue,
        Err(error) => {
            tracing::error!(%error, "worker renderer init failed");
            // Nothing can draw here; later `stop` would be a no-op.
            scope.close();
            Control::Terminate
        }
    }
}

/// Pull the transferred canvas out of an `init` payload so the rest decodes
/// as plain data.
fn take_canvas(data: &JsValue) -> Option<OffscreenCanvas> {
    let key = JsValue::from_str("canvas");
    let canvas = js_sys::Reflect::get(data, &key).ok()?;
    if canvas.is_undefined() {
        return None;
    }
    let _ = js_sys::Reflect::delete_property(data.unchecked_ref(), &key);
    canvas.dyn_into::<OffscreenCanvas>().ok()
}

fn build_renderer(
    canvas: Option<&OffscreenCanvas>,
    params: &InitParams,
) -> Result<CrtRenderer, LifecycleError> {
    let canvas = canvas
        .ok_or_else(|| LifecycleError::SurfaceUnavailable("init without a canvas".into()))?;
    let size = params.physical_size();
    canvas.set_width(size.0);
    canvas.set_height(size.1);
    let gl = context_for_offscreen(canvas)?;
    let renderer = match CrtRenderer::new(gl.clone(), size, FrameGlobal::current()?) {
        Ok(renderer) => renderer,
        Err(err) => {
            lose_context(&gl);
            return Err(err);
        }
    };
    start_or_release(renderer, CrtRenderer::start)
}
