/// Everything that can go wrong between the HTML shell and the first scene.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("render surface unavailable: {0}")]
    SurfaceUnavailable(String),
    #[error("unlock control is missing required markup: {0}")]
    UnlockControlMissing(String),
    #[error("failed to load module `{module}`: {reason}")]
    ModuleLoad { module: String, reason: String },
    #[error("scene `{name}` failed: {reason}")]
    Scene { name: String, reason: String },
    #[error("scene manager is not ready")]
    SceneNotReady,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("lifecycle has been disposed")]
    Disposed,
    #[error("javascript error: {0}")]
    Js(String),
}

impl LifecycleError {
    pub fn module_load(module: impl Into<String>, reason: impl ToString) -> Self {
        Self::ModuleLoad {
            module: module.into(),
            reason: reason.to_string(),
        }
    }

    pub fn scene(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Scene {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for LifecycleError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        Self::Js(crate::wasm::describe_js(&value))
    }
}

#[cfg(target_arch = "wasm32")]
impl From<LifecycleError> for wasm_bindgen::JsValue {
    fn from(err: LifecycleError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}
