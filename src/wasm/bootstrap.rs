use futures_util::future::LocalBoxFuture;
use wasm_bindgen::JsValue;
use web_sys::{HtmlCanvasElement, Window, Worker, WorkerOptions, WorkerType};

use super::raf::FrameGlobal;
use super::render::{context_for_canvas, CrtRenderer};
use crate::error::LifecycleError;
use crate::ports::SurfaceFactory;
use crate::protocol::{start_or_release, InitParams, WorkerCommand, WorkerEndpoint};
use crate::surface::{
    BootstrapSurface, Capabilities, ExecutionMode, RenderSurface, SurfaceBackend,
};

pub fn detect_capabilities(window: &Window, canvas: &HtmlCanvasElement) -> Capabilities {
    let global = js_sys::global();
    let element: &JsValue = canvas;
    let has = |target: &JsValue, name: &str| {
        js_sys::Reflect::has(target, &JsValue::from_str(name)).unwrap_or(false)
    };
    Capabilities {
        offscreen_canvas: has(&global, "OffscreenCanvas")
            && has(element, "transferControlToOffscreen"),
        worker: has(&global, "Worker"),
        user_agent: window.navigator().user_agent().unwrap_or_default(),
    }
}

/// CSS size of the canvas, falling back to the viewport before layout.
fn css_size(window: &Window, canvas: &HtmlCanvasElement) -> (f64, f64) {
    let (w, h) = (canvas.client_width(), canvas.client_height());
    if w > 0 && h > 0 {
        return (f64::from(w), f64::from(h));
    }
    let dim = |v: Result<JsValue, JsValue>| v.ok().and_then(|v| v.as_f64()).unwrap_or(1.0);
    (dim(window.inner_width()), dim(window.inner_height()))
}

fn fade(canvas: &HtmlCanvasElement) {
    let style = canvas.style();
    let applied = style
        .set_property("transition", "opacity 0.4s ease-out")
        .and_then(|_| style.set_property("opacity", "0"));
    if let Err(err) = applied {
        tracing::warn!(error = %super::describe_js(&err), "could not fade crt canvas");
    }
}

/// Posts every command to the render worker.
pub struct WorkerBackend {
    worker: Worker,
    canvas: HtmlCanvasElement,
}

impl WorkerBackend {
    /// Wrap a worker that already owns `canvas`'s offscreen surface.
    pub fn new(worker: Worker, canvas: HtmlCanvasElement) -> Self {
        Self { worker, canvas }
    }
}

impl SurfaceBackend for WorkerBackend {
    fn execution(&self) -> ExecutionMode {
        ExecutionMode::Worker
    }

    fn dispatch(&mut self, command: WorkerCommand) {
        let posted = serde_wasm_bindgen::to_value(&command)
            .map_err(JsValue::from)
            .and_then(|message| self.worker.post_message(&message));
        if let Err(err) = posted {
            tracing::warn!(kind = command.kind(), error = %super::describe_js(&err), "postMessage failed");
        }
    }

    fn fade_out(&mut self) {
        fade(&self.canvas);
    }

    fn release(&mut self) {
        // `stop` is already queued. A worker whose init failed never runs it.
        self.worker.terminate();
        tracing::debug!("render worker terminated");
    }
}

/// Applies commands to a renderer living on the page.
pub struct MainThreadBackend {
    endpoint: WorkerEndpoint<CrtRenderer>,
    canvas: HtmlCanvasElement,
}

impl SurfaceBackend for MainThreadBackend {
    fn execution(&self) -> ExecutionMode {
        ExecutionMode::MainThread
    }

    fn dispatch(&mut self, command: WorkerCommand) {
        self.endpoint.apply(command);
    }

    fn fade_out(&mut self) {
        fade(&self.canvas);
    }

    fn release(&mut self) {
        self.endpoint.release();
    }
}

/// Creates the CRT surface once, choosing worker or main-thread mode.
pub struct WebSurfaceFactory {
    pub window: Window,
    pub canvas: HtmlCanvasElement,
    pub worker_script: String,
}

impl SurfaceFactory for WebSurfaceFactory {
    fn create(&self) -> LocalBoxFuture<'static, Result<Box<dyn RenderSurface>, LifecycleError>> {
        let window = self.window.clone();
        let canvas = self.canvas.clone();
        let script = self.worker_script.clone();
        Box::pin(async move { create_surface(&window, &canvas, &script) })
    }
}

pub fn create_surface(
    window: &Window,
    canvas: &HtmlCanvasElement,
    worker_script: &str,
) -> Result<Box<dyn RenderSurface>, LifecycleError> {
    let capabilities = detect_capabilities(window, canvas);
    let (width, height) = css_size(window, canvas);
    let params = InitParams {
        width,
        height,
        device_pixel_ratio: window.device_pixel_ratio(),
    };
    match capabilities.execution_mode() {
        ExecutionMode::Worker => {
            tracing::info!("crt renderer moving to a worker");
            let backend = spawn_worker(canvas, worker_script, params)?;
            Ok(Box::new(BootstrapSurface::new(backend)))
        }
        ExecutionMode::MainThread => {
            tracing::info!(
                offscreen = capabilities.offscreen_canvas,
                worker = capabilities.worker,
                "crt renderer on main thread"
            );
            let backend = main_thread_backend(canvas, params)?;
            Ok(Box::new(BootstrapSurface::new(backend)))
        }
    }
}

fn spawn_worker(
    canvas: &HtmlCanvasElement,
    script: &str,
    params: InitParams,
) -> Result<WorkerBackend, LifecycleError> {
    let options = WorkerOptions::new();
    options.set_type(WorkerType::Module);
    let worker = Worker::new_with_options(script, &options)
        .map_err(|err| LifecycleError::module_load(script, super::describe_js(&err)))?;

    let init = || -> Result<(), JsValue> {
        let offscreen = canvas.transfer_control_to_offscreen()?;
        let message = serde_wasm_bindgen::to_value(&WorkerCommand::Init(params))?;
        js_sys::Reflect::set(&message, &JsValue::from_str("canvas"), &offscreen)?;
        worker.post_message_with_transfer(&message, &js_sys::Array::of1(&offscreen))
    };
    if let Err(err) = init() {
        worker.terminate();
        return Err(LifecycleError::SurfaceUnavailable(format!(
            "worker init failed: {}",
            super::describe_js(&err)
        )));
    }
    Ok(WorkerBackend::new(worker, canvas.clone()))
}

fn main_thread_backend(
    canvas: &HtmlCanvasElement,
    params: InitParams,
) -> Result<MainThreadBackend, LifecycleError> {
    let size = params.physical_size();
    canvas.set_width(size.0);
    canvas.set_height(size.1);
    let gl = context_for_canvas(canvas)?;
    let global = FrameGlobal::current()?;
    let renderer = match CrtRenderer::new(gl.clone(), size, global) {
        Ok(renderer) => renderer,
        Err(err) => {
            super::render::lose_context(&gl);
            return Err(err);
        }
    };
    let renderer = start_or_release(renderer, CrtRenderer::start)?;
    Ok(MainThreadBackend {
        endpoint: WorkerEndpoint::with_renderer(renderer),
        canvas: canvas.clone(),
    })
}
