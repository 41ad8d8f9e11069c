use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{
    HtmlCanvasElement, OffscreenCanvas, WebGl2RenderingContext as GL, WebGlBuffer,
    WebglLoseContext, WebGlProgram, WebGlShader, WebGlUniformLocation,
};

use super::raf::FrameGlobal;
use crate::error::LifecycleError;
use crate::protocol::UniformRenderer;

const VERTEX_SHADER: &str = include_str!("shaders/crt.vert");
const FRAGMENT_SHADER: &str = include_str!("shaders/crt.frag");

// One oversized triangle covering clip space.
const FULLSCREEN_TRIANGLE: [f32; 6] = [-1.0, -1.0, 3.0, -1.0, -1.0, 3.0];

pub fn context_for_canvas(canvas: &HtmlCanvasElement) -> Result<GL, LifecycleError> {
    canvas
        .get_context("webgl2")?
        .ok_or_else(|| LifecycleError::SurfaceUnavailable("WebGL2 not supported".into()))?
        .dyn_into::<GL>()
        .map_err(|_| LifecycleError::SurfaceUnavailable("webgl2 context has unexpected type".into()))
}

pub fn context_for_offscreen(canvas: &OffscreenCanvas) -> Result<GL, LifecycleError> {
    canvas
        .get_context("webgl2")?
        .ok_or_else(|| LifecycleError::SurfaceUnavailable("WebGL2 not supported in worker".into()))?
        .dyn_into::<GL>()
        .map_err(|_| LifecycleError::SurfaceUnavailable("webgl2 context has unexpected type".into()))
}

struct Uniforms {
    progress: Option<WebGlUniformLocation>,
    resolution: Option<WebGlUniformLocation>,
    mode: Option<WebGlUniformLocation>,
    scanline_phase: Option<WebGlUniformLocation>,
}

struct Resources {
    program: WebGlProgram,
    vertex: WebGlShader,
    fragment: WebGlShader,
    buffer: WebGlBuffer,
    uniforms: Uniforms,
}

struct Inner {
    gl: GL,
    resources: RefCell<Option<Resources>>,
    size: Cell<(u32, u32)>,
    progress: Cell<f32>,
    scanline_phase: Cell<f32>,
    mode: Cell<f32>,
    frame_id: Cell<Option<i32>>,
    // Holds the animation-frame closure so it can re-request itself.
    draw_loop: RefCell<Option<Closure<dyn FnMut()>>>,
}

/// Full-screen CRT shader with its own draw loop.
pub struct CrtRenderer {
    inner: Rc<Inner>,
    global: FrameGlobal,
}

impl CrtRenderer {
    pub fn new(gl: GL, size: (u32, u32), global: FrameGlobal) -> Result<Self, LifecycleError> {
        let resources = build_resources(&gl)?;
        let inner = Rc::new(Inner {
            gl,
            resources: RefCell::new(Some(resources)),
            size: Cell::new(size),
            progress: Cell::new(0.0),
            scanline_phase: Cell::new(0.0),
            mode: Cell::new(0.0),
            frame_id: Cell::new(None),
            draw_loop: RefCell::new(None),
        });
        Ok(Self { inner, global })
    }

    /// Start drawing every frame until [`UniformRenderer::stop`].
    pub fn start(&self) -> Result<(), LifecycleError> {
        if self.inner.draw_loop.borrow().is_some() {
            return Ok(());
        }
        let weak = Rc::downgrade(&self.inner);
        let global = self.global.clone();
        *self.inner.draw_loop.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.frame_id.set(None);
            inner.draw();

            // schedule next
            let next = inner.draw_loop.borrow().as_ref().map(|f| {
                global.request_animation_frame(f.as_ref().unchecked_ref())
            });
            match next {
                Some(Ok(id)) => inner.frame_id.set(Some(id)),
                Some(Err(err)) => {
                    tracing::error!(error = %super::describe_js(&err), "draw loop halted")
                }
                None => {}
            }
        }) as Box<dyn FnMut()>));

        let id = {
            let draw_loop = self.inner.draw_loop.borrow();
            let Some(f) = draw_loop.as_ref() else {
                return Ok(());
            };
            self.global.request_animation_frame(f.as_ref().unchecked_ref())?
        };
        self.inner.frame_id.set(Some(id));
        Ok(())
    }
}

impl Inner {
    fn draw(&self) {
        let resources = self.resources.borrow();
        let Some(res) = resources.as_ref() else {
            return;
        };
        let gl = &self.gl;
        let (width, height) = self.size.get();
        gl.viewport(0, 0, width as i32, height as i32);
        gl.clear_color(0.0, 0.0, 0.0, 1.0);
        gl.clear(GL::COLOR_BUFFER_BIT);

        gl.use_program(Some(&res.program));
        gl.uniform1f(res.uniforms.progress.as_ref(), self.progress.get());
        gl.uniform2f(res.uniforms.resolution.as_ref(), width as f32, height as f32);
        gl.uniform1f(res.uniforms.mode.as_ref(), self.mode.get());
        gl.uniform1f(res.uniforms.scanline_phase.as_ref(), self.scanline_phase.get());

        gl.bind_buffer(GL::ARRAY_BUFFER, Some(&res.buffer));
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_with_i32(0, 2, GL::FLOAT, false, 0, 0);
        gl.draw_arrays(GL::TRIANGLES, 0, 3);
    }
}

impl UniformRenderer for CrtRenderer {
    fn set_progress(&mut self, value: f32) {
        self.inner.progress.set(value);
    }

    fn set_scanline_phase(&mut self, value: f32) {
        self.inner.scanline_phase.set(value);
    }

    fn set_mode(&mut self, value: f32) {
        self.inner.mode.set(value);
    }

    fn stop(&mut self) {
        if let Some(id) = self.inner.frame_id.take() {
            self.global.cancel_animation_frame(id);
        }
        // Breaks the closure's self-reference; the loop cannot restart.
        drop(self.inner.draw_loop.borrow_mut().take());
    }

    fn release(&mut self) {
        self.stop();
        let Some(res) = self.inner.resources.borrow_mut().take() else {
            return;
        };
        let gl = &self.inner.gl;
        gl.use_program(None);
        gl.bind_buffer(GL::ARRAY_BUFFER, None);
        gl.delete_buffer(Some(&res.buffer));
        gl.detach_shader(&res.program, &res.vertex);
        gl.detach_shader(&res.program, &res.fragment);
        gl.delete_shader(Some(&res.vertex));
        gl.delete_shader(Some(&res.fragment));
        gl.delete_program(Some(&res.program));

        lose_context(gl);
        tracing::debug!("crt renderer released");
    }
}

/// Hand the context back to the browser instead of waiting for GC.
pub fn lose_context(gl: &GL) {
    match gl.get_extension("WEBGL_lose_context") {
        Ok(Some(ext)) => ext.unchecked_into::<WebglLoseContext>().lose_context(),
        Ok(None) => tracing::debug!("WEBGL_lose_context unavailable; context left to GC"),
        Err(err) => tracing::warn!(error = %super::describe_js(&err), "getExtension failed"),
    }
}

fn build_resources(gl: &GL) -> Result<Resources, LifecycleError> {
    let vertex = compile_shader(gl, GL::VERTEX_SHADER, VERTEX_SHADER)?;
    let fragment = compile_shader(gl, GL::FRAGMENT_SHADER, FRAGMENT_SHADER).map_err(|err| {
        gl.delete_shader(Some(&vertex));
        err
    })?;
    let program = match link_program(gl, &vertex, &fragment) {
        Ok(program) => program,
        Err(err) => {
            gl.delete_shader(Some(&vertex));
            gl.delete_shader(Some(&fragment));
            return Err(err);
        }
    };

    let Some(buffer) = gl.create_buffer() else {
        gl.delete_program(Some(&program));
        gl.delete_shader(Some(&vertex));
        gl.delete_shader(Some(&fragment));
        return Err(LifecycleError::SurfaceUnavailable("createBuffer failed".into()));
    };
    gl.bind_buffer(GL::ARRAY_BUFFER, Some(&buffer));
    let vertices = js_sys::Float32Array::from(&FULLSCREEN_TRIANGLE[..]);
    gl.buffer_data_with_array_buffer_view(GL::ARRAY_BUFFER, &vertices, GL::STATIC_DRAW);

    let uniforms = Uniforms {
        progress: gl.get_uniform_location(&program, "uProgress"),
        resolution: gl.get_uniform_location(&program, "uResolution"),
        mode: gl.get_uniform_location(&program, "uMode"),
        scanline_phase: gl.get_uniform_location(&program, "uScanlinePhase"),
    };

    Ok(Resources {
        program,
        vertex,
        fragment,
        buffer,
        uniforms,
    })
}

fn compile_shader(gl: &GL, kind: u32, source: &str) -> Result<WebGlShader, LifecycleError> {
    let shader = gl
        .create_shader(kind)
        .ok_or_else(|| LifecycleError::SurfaceUnavailable("createShader failed".into()))?;
    gl.shader_source(&shader, source);
    gl.compile_shader(&shader);
    let compiled = gl
        .get_shader_parameter(&shader, GL::COMPILE_STATUS)
        .as_bool()
        .unwrap_or(false);
    if compiled {
        return Ok(shader);
    }
    let log = gl.get_shader_info_log(&shader).unwrap_or_default();
    gl.delete_shader(Some(&shader));
    Err(LifecycleError::SurfaceUnavailable(format!("shader compile: {log}")))
}

fn link_program(
    gl: &GL,
    vertex: &WebGlShader,
    fragment: &WebGlShader,
) -> Result<WebGlProgram, LifecycleError> {
    let program = gl
        .create_program()
        .ok_or_else(|| LifecycleError::SurfaceUnavailable("createProgram failed".into()))?;
    gl.attach_shader(&program, vertex);
    gl.attach_shader(&program, fragment);
    gl.bind_attrib_location(&program, 0, "aPosition");
    gl.link_program(&program);
    let linked = gl
        .get_program_parameter(&program, GL::LINK_STATUS)
        .as_bool()
        .unwrap_or(false);
    if linked {
        return Ok(program);
    }
    let log = gl.get_program_info_log(&program).unwrap_or_default();
    gl.delete_program(Some(&program));
    Err(LifecycleError::SurfaceUnavailable(format!("program link: {log}")))
}

