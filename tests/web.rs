#![cfg(target_arch = "wasm32")]

use std::cell::Cell;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{Blob, Document, HtmlCanvasElement, MessageEvent, Url, Worker};

use crt_boot::config::DomIds;
use crt_boot::ports::{CanvasHost, CanvasRole};
use crt_boot::surface::BootstrapSurface;
use crt_boot::wasm::bootstrap::{detect_capabilities, WorkerBackend};
use crt_boot::wasm::dom::DomHost;
use crt_boot::wasm::raf::{FrameGlobal, RafScheduler};
use crt_boot::{FrameMonitor, FrameScheduler, RenderSurface};

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

fn canvas(id: &str) -> HtmlCanvasElement {
    let document = document();
    let canvas = document
        .create_element("canvas")
        .unwrap()
        .dyn_into::<HtmlCanvasElement>()
        .unwrap();
    canvas.set_id(id);
    canvas.set_width(320);
    canvas.set_height(240);
    document.body().unwrap().append_child(&canvas).unwrap();
    canvas
}

#[wasm_bindgen_test]
fn capabilities_are_read_from_the_page() {
    let window = web_sys::window().unwrap();
    let caps = detect_capabilities(&window, &canvas("caps-canvas"));
    assert!(caps.worker);
    assert!(!caps.user_agent.is_empty());
}

#[wasm_bindgen_test]
fn dom_host_hides_canvases_and_shows_one_overlay() {
    let ids = DomIds {
        crt_canvas: "host-crt".into(),
        main_canvas: "host-main".into(),
        overlay: "host-overlay".into(),
        ..DomIds::default()
    };
    canvas(&ids.crt_canvas);
    canvas(&ids.main_canvas);
    let host = DomHost::new(document(), &ids).unwrap();

    host.hide(CanvasRole::Crt);
    let display = host.crt_canvas().style().get_property_value("display").unwrap();
    assert_eq!(display, "none");

    host.show_fallback("scene failed");
    host.show_fallback("again");
    let overlay = document().get_element_by_id("host-overlay").unwrap();
    let text = overlay.text_content().unwrap_or_default();
    assert!(text.contains("scene failed"));
    assert!(!text.contains("again"));
}

#[wasm_bindgen_test]
fn dom_host_requires_both_canvases() {
    let ids = DomIds {
        crt_canvas: "lonely-crt".into(),
        main_canvas: "missing-main".into(),
        ..DomIds::default()
    };
    canvas(&ids.crt_canvas);
    assert!(DomHost::new(document(), &ids).is_err());
}

#[wasm_bindgen_test]
async fn raf_scheduler_runs_frames_and_honours_cancel() {
    let window = web_sys::window().unwrap();
    let monitor = Rc::new(FrameMonitor::default());
    let scheduler = RafScheduler::new(FrameGlobal::Window(window), Some(Rc::clone(&monitor)));

    let cancelled_ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&cancelled_ran);
    let id = scheduler.request_frame(Box::new(move || flag.set(true)));
    scheduler.cancel_frame(id);

    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        scheduler.request_frame(Box::new(move || {
            resolve.call0(&JsValue::NULL).unwrap();
        }));
    });
    JsFuture::from(promise).await.unwrap();

    assert!(!cancelled_ran.get());
    assert_eq!(monitor.frames(), 1);
}

/// A worker that echoes every message, standing in for one whose renderer
/// never came up and so ignores `stop`.
fn echo_worker() -> Worker {
    let source = js_sys::Array::of1(&JsValue::from_str("onmessage = (e) => postMessage(e.data);"));
    let blob = Blob::new_with_str_sequence(&source).unwrap();
    let url = Url::create_object_url_with_blob(&blob).unwrap();
    Worker::new(&url).unwrap()
}

/// Ping the worker and report whether it answers within half a second.
async fn answers(worker: &Worker) -> bool {
    let window = web_sys::window().unwrap();
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let on_reply = resolve.clone();
        let reply = Closure::wrap(Box::new(move |_: MessageEvent| {
            on_reply.call1(&JsValue::NULL, &JsValue::TRUE).unwrap();
        }) as Box<dyn FnMut(MessageEvent)>);
        worker.set_onmessage(Some(reply.as_ref().unchecked_ref()));
        reply.forget();

        let silence = Closure::once_into_js(move || {
            resolve.call1(&JsValue::NULL, &JsValue::FALSE).unwrap();
        });
        window
            .set_timeout_with_callback_and_timeout_and_arguments_0(silence.unchecked_ref(), 500)
            .unwrap();
        worker.post_message(&JsValue::from_str("ping")).unwrap();
    });
    JsFuture::from(promise).await.unwrap().as_bool().unwrap()
}

#[wasm_bindgen_test]
async fn destroying_a_worker_surface_terminates_the_worker() {
    let worker = echo_worker();
    let mut surface = BootstrapSurface::new(WorkerBackend::new(worker.clone(), canvas("worker-crt")));
    assert!(answers(&worker).await);

    surface.destroy();
    assert!(!answers(&worker).await);
}
