//! Bridge to the 3D library, loaded lazily with dynamic `import()`.
//!
//! The library module exports a manager class constructed as
//! `new Manager({ canvas })` with `addLayer(scene)`, `removeLayer(name)` and
//! `dispose()`. Each scene module default-exports a class constructed as
//! `new Scene({ name, canvas })`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlCanvasElement;

use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::ports::{CanvasRole, SceneLoader, SceneManager};

#[wasm_bindgen(inline_js = "export function import_module(url) { return import(url); }")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn import_module(url: &str) -> Result<js_sys::Promise, JsValue>;
}

async fn load_module(url: &str) -> Result<JsValue, LifecycleError> {
    let promise = import_module(url).map_err(|err| LifecycleError::module_load(url, super::describe_js(&err)))?;
    JsFuture::from(promise)
        .await
        .map_err(|err| LifecycleError::module_load(url, super::describe_js(&err)))
}

fn export(module: &JsValue, name: &str) -> Result<Function, JsValue> {
    Reflect::get(module, &JsValue::from_str(name))?
        .dyn_into::<Function>()
        .map_err(|_| JsValue::from_str(&format!("export `{name}` is not a constructor")))
}

fn call(target: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let function = Reflect::get(target, &JsValue::from_str(method))?
        .dyn_into::<Function>()
        .map_err(|_| JsValue::from_str(&format!("`{method}` is not a function")))?;
    function.apply(target, &args.iter().collect::<Array>())
}

#[derive(Default)]
struct Modules {
    library: Option<JsValue>,
    scenes: HashMap<String, Function>,
}

pub struct JsSceneLoader {
    main_canvas: HtmlCanvasElement,
    config: LifecycleConfig,
    modules: Rc<RefCell<Modules>>,
}

impl JsSceneLoader {
    pub fn new(main_canvas: HtmlCanvasElement, config: LifecycleConfig) -> Self {
        Self {
            main_canvas,
            config,
            modules: Rc::default(),
        }
    }
}

impl SceneLoader for JsSceneLoader {
    fn load_library(&self) -> LocalBoxFuture<'static, Result<(), LifecycleError>> {
        let modules = Rc::clone(&self.modules);
        let url = self.config.modules.library.clone();
        Box::pin(async move {
            if modules.borrow().library.is_some() {
                return Ok(());
            }
            let module = load_module(&url).await?;
            tracing::debug!(%url, "rendering library loaded");
            modules.borrow_mut().library = Some(module);
            Ok(())
        })
    }

    fn load_scene(&self, name: &str) -> LocalBoxFuture<'static, Result<(), LifecycleError>> {
        let modules = Rc::clone(&self.modules);
        let name = name.to_owned();
        let url = self.config.scene_module_path(&name);
        Box::pin(async move {
            if modules.borrow().scenes.contains_key(&name) {
                return Ok(());
            }
            let module = load_module(&url).await?;
            let class = export(&module, "default").map_err(|err| LifecycleError::scene(&name, super::describe_js(&err)))?;
            tracing::debug!(scene = %name, %url, "scene module loaded");
            modules.borrow_mut().scenes.insert(name, class);
            Ok(())
        })
    }

    fn create_manager(&self, canvas: CanvasRole) -> Result<Box<dyn SceneManager>, LifecycleError> {
        if canvas != CanvasRole::Main {
            return Err(LifecycleError::Config("the scene manager only binds to the main canvas".into()));
        }
        let modules = self.modules.borrow();
        let library = modules.library.as_ref().ok_or_else(|| {
            LifecycleError::module_load(&self.config.modules.library, "library not loaded")
        })?;
        let export_name = &self.config.modules.manager_export;
        let options = Object::new();
        Reflect::set(&options, &"canvas".into(), &self.main_canvas)?;
        let manager = export(library, export_name)
            .and_then(|class| Reflect::construct(&class, &Array::of1(&options)))
            .map_err(|err| LifecycleError::module_load(export_name, super::describe_js(&err)))?;
        Ok(Box::new(JsSceneManager {
            manager,
            canvas: self.main_canvas.clone(),
            modules: Rc::clone(&self.modules),
        }))
    }
}

struct JsSceneManager {
    manager: JsValue,
    canvas: HtmlCanvasElement,
    modules: Rc<RefCell<Modules>>,
}

impl SceneManager for JsSceneManager {
    fn add_scene(&mut self, name: &str) -> Result<(), LifecycleError> {
        let class = self
            .modules
            .borrow()
            .scenes
            .get(name)
            .cloned()
            .ok_or_else(|| LifecycleError::scene(name, "module not loaded"))?;
        let build = || -> Result<JsValue, JsValue> {
            let options = Object::new();
            Reflect::set(&options, &"name".into(), &JsValue::from_str(name))?;
            Reflect::set(&options, &"canvas".into(), &self.canvas)?;
            let scene = Reflect::construct(&class, &Array::of1(&options))?;
            call(&self.manager, "addLayer", &[scene])
        };
        build()
            .map(|_| ())
            .map_err(|err| LifecycleError::scene(name, super::describe_js(&err)))
    }

    fn remove_scene(&mut self, name: &str) {
        if let Err(err) = call(&self.manager, "removeLayer", &[JsValue::from_str(name)]) {
            tracing::warn!(scene = name, error = %super::describe_js(&err), "removeLayer failed");
        }
    }

    fn dispose(&mut self) {
        if let Err(err) = call(&self.manager, "dispose", &[]) {
            tracing::warn!(error = %super::describe_js(&err), "scene manager dispose failed");
        }
    }
}
