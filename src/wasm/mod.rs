//! Browser bindings and the composition root.
//!
//! The page calls `boot(config, unlockControl)` once; the worker script
//! calls `worker_main(backlog)`. Both share this module.

use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

pub mod bootstrap;
pub mod dom;
mod logging;
pub mod raf;
pub mod render;
pub mod scene;
pub mod unlock;
pub mod worker;

use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::lifecycle::{Collaborators, LifecycleOrchestrator};
use crate::monitor::FrameMonitor;
use crate::ports::TaskSpawner;

pub use unlock::JsUnlockControl;

pub(crate) fn describe_js(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

struct LocalSpawner;

impl TaskSpawner for LocalSpawner {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

/// Handle kept by the page after `boot`.
#[wasm_bindgen]
pub struct App {
    lifecycle: Rc<LifecycleOrchestrator>,
}

#[wasm_bindgen]
impl App {
    #[wasm_bindgen(getter)]
    pub fn phase(&self) -> String {
        self.lifecycle.phase().to_string()
    }

    /// Replace the active scene; rejects (keeping the old scene) on failure.
    #[wasm_bindgen(js_name = switchToScene)]
    pub fn switch_to_scene(&self, name: String) -> js_sys::Promise {
        let lifecycle = Rc::clone(&self.lifecycle);
        wasm_bindgen_futures::future_to_promise(async move {
            lifecycle.switch_to_scene(&name).await?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = debugSnapshot)]
    pub fn debug_snapshot(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.lifecycle.debug_snapshot())?)
    }

    pub fn dispose(&self) {
        self.lifecycle.dispose();
    }
}

/// Build every collaborator, start the lifecycle and return its handle.
///
/// `config` is a plain object (missing fields take defaults); `control` is
/// the page's drag-to-unlock widget.
#[wasm_bindgen]
pub async fn boot(config: JsValue, control: JsUnlockControl) -> Result<App, JsValue> {
    let config: LifecycleConfig = if config.is_undefined() || config.is_null() {
        LifecycleConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config)?
    };
    logging::init(&config.log_level);

    let result = compose(config, control).await;
    if let Err(error) = &result {
        tracing::error!(%error, "startup aborted");
    }
    Ok(App {
        lifecycle: result?,
    })
}

async fn compose(
    config: LifecycleConfig,
    control: JsUnlockControl,
) -> Result<Rc<LifecycleOrchestrator>, LifecycleError> {
    let window = web_sys::window().ok_or_else(|| LifecycleError::Js("no window".into()))?;
    let document = window
        .document()
        .ok_or_else(|| LifecycleError::Js("no document".into()))?;

    let host = Rc::new(dom::DomHost::new(document.clone(), &config.dom)?);
    let monitor = Rc::new(FrameMonitor::default());
    let scheduler = Rc::new(raf::RafScheduler::new(
        raf::FrameGlobal::Window(window.clone()),
        Some(Rc::clone(&monitor)),
    ));

    let parts = Collaborators {
        scheduler,
        spawner: Rc::new(LocalSpawner),
        surfaces: Box::new(bootstrap::WebSurfaceFactory {
            window,
            canvas: host.crt_canvas().clone(),
            worker_script: config.modules.worker_script.clone(),
        }),
        unlock: Box::new(unlock::DomUnlockControl::new(
            document,
            config.dom.unlock_control.clone(),
            control,
        )),
        scenes: Rc::new(scene::JsSceneLoader::new(
            host.main_canvas().clone(),
            config.clone(),
        )),
        canvases: host,
        monitor: Some(monitor),
    };

    let lifecycle = Rc::new(LifecycleOrchestrator::new(config, parts)?);
    if let Err(error) = lifecycle.initialize().await {
        lifecycle.dispose();
        return Err(error);
    }
    Ok(lifecycle)
}
