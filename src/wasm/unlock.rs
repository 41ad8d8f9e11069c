use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Document;

use crate::error::LifecycleError;
use crate::ports::{UnlockCallbacks, UnlockControl};

#[wasm_bindgen]
extern "C" {
    /// The page's drag-to-unlock widget (see `static/unlock.js`).
    pub type JsUnlockControl;

    #[wasm_bindgen(method, catch)]
    fn attach(
        this: &JsUnlockControl,
        on_start: &js_sys::Function,
        on_progress: &js_sys::Function,
        on_unlock: &js_sys::Function,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(method)]
    fn detach(this: &JsUnlockControl);
}

/// Markup the widget cannot work without.
const REQUIRED_PARTS: [&str; 2] = ["[data-unlock-track]", "[data-unlock-handle]"];

struct Attached {
    _on_start: Closure<dyn Fn()>,
    _on_progress: Closure<dyn Fn(f64)>,
    _on_unlock: Closure<dyn Fn()>,
}

pub struct DomUnlockControl {
    document: Document,
    element_id: String,
    control: JsUnlockControl,
    attached: Option<Attached>,
}

impl DomUnlockControl {
    pub fn new(document: Document, element_id: String, control: JsUnlockControl) -> Self {
        Self {
            document,
            element_id,
            control,
            attached: None,
        }
    }

    fn check_markup(&self) -> Result<(), LifecycleError> {
        let root = self
            .document
            .get_element_by_id(&self.element_id)
            .ok_or_else(|| LifecycleError::UnlockControlMissing(format!("#{}", self.element_id)))?;
        for selector in REQUIRED_PARTS {
            if root.query_selector(selector)?.is_none() {
                return Err(LifecycleError::UnlockControlMissing(format!(
                    "#{} {selector}",
                    self.element_id
                )));
            }
        }
        Ok(())
    }
}

impl UnlockControl for DomUnlockControl {
    fn attach(&mut self, callbacks: UnlockCallbacks) -> Result<(), LifecycleError> {
        self.check_markup()?;
        let UnlockCallbacks {
            on_start,
            on_progress,
            on_unlock,
        } = callbacks;
        let attached = Attached {
            _on_start: Closure::wrap(on_start),
            _on_progress: Closure::wrap(on_progress),
            _on_unlock: Closure::wrap(on_unlock),
        };
        self.control.attach(
            attached._on_start.as_ref().unchecked_ref(),
            attached._on_progress.as_ref().unchecked_ref(),
            attached._on_unlock.as_ref().unchecked_ref(),
        )?;
        self.attached = Some(attached);
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(attached) = self.attached.take() {
            // The widget must forget the callbacks before they are freed.
            self.control.detach();
            drop(attached);
        }
    }
}
