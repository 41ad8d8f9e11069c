use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlCanvasElement, HtmlElement};

use crate::config::DomIds;
use crate::error::LifecycleError;
use crate::ports::{CanvasHost, CanvasRole};

pub fn canvas_by_id(document: &Document, id: &str) -> Result<HtmlCanvasElement, LifecycleError> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| LifecycleError::SurfaceUnavailable(format!("canvas #{id} not found")))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| LifecycleError::SurfaceUnavailable(format!("#{id} is not a canvas")))
}

/// Owns both canvas elements and the fallback overlay.
pub struct DomHost {
    document: Document,
    crt: HtmlCanvasElement,
    main: HtmlCanvasElement,
    overlay_id: String,
}

impl DomHost {
    pub fn new(document: Document, ids: &DomIds) -> Result<Self, LifecycleError> {
        Ok(Self {
            crt: canvas_by_id(&document, &ids.crt_canvas)?,
            main: canvas_by_id(&document, &ids.main_canvas)?,
            overlay_id: ids.overlay.clone(),
            document,
        })
    }

    pub fn crt_canvas(&self) -> &HtmlCanvasElement {
        &self.crt
    }

    pub fn main_canvas(&self) -> &HtmlCanvasElement {
        &self.main
    }

    fn build_overlay(&self, message: &str) -> Result<(), JsValue> {
        if self.document.get_element_by_id(&self.overlay_id).is_some() {
            return Ok(());
        }
        let body = self.document.body().ok_or("document has no body")?;
        let overlay = self.document.create_element("div")?.dyn_into::<HtmlElement>()?;
        overlay.set_id(&self.overlay_id);
        overlay.set_class_name("fallback-overlay");
        let style = overlay.style();
        for (name, value) in [
            ("position", "fixed"),
            ("inset", "0"),
            ("display", "flex"),
            ("flex-direction", "column"),
            ("align-items", "center"),
            ("justify-content", "center"),
            ("gap", "1rem"),
            ("background", "#000"),
            ("color", "#8fffb0"),
            ("font-family", "monospace"),
            ("z-index", "1000"),
        ] {
            style.set_property(name, value)?;
        }

        let text = self.document.create_element("p")?;
        text.set_text_content(Some(message));
        let button = self.document.create_element("button")?;
        button.set_text_content(Some("Reload"));
        let reload = Closure::<dyn Fn()>::new(|| {
            if let Some(window) = web_sys::window() {
                let _ = window.location().reload();
            }
        });
        button.add_event_listener_with_callback("click", reload.as_ref().unchecked_ref())?;
        // The overlay stays until the page reloads.
        reload.forget();

        overlay.append_child(&text)?;
        overlay.append_child(&button)?;
        body.append_child(&overlay)?;
        Ok(())
    }
}

impl CanvasHost for DomHost {
    fn hide(&self, canvas: CanvasRole) {
        let element = match canvas {
            CanvasRole::Crt => &self.crt,
            CanvasRole::Main => &self.main,
        };
        if let Err(err) = element.style().set_property("display", "none") {
            tracing::warn!(?canvas, error = %super::describe_js(&err), "could not hide canvas");
        }
    }

    fn show_fallback(&self, message: &str) {
        if let Err(err) = self.build_overlay(message) {
            tracing::error!(error = %super::describe_js(&err), "could not show fallback overlay");
        }
    }
}
