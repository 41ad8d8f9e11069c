//! The CRT render surface: one canvas, one WebGL context, owned either by
//! the page or by a dedicated worker for its whole life.

use serde::Serialize;

use crate::mode::RenderMode;
use crate::protocol::WorkerCommand;

/// Where the CRT draw loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    /// Canvas transferred to a dedicated worker as an `OffscreenCanvas`.
    Worker,
    MainThread,
}

/// What the current global offers, gathered once before creating a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub offscreen_canvas: bool,
    pub worker: bool,
    pub user_agent: String,
}

impl Capabilities {
    /// Worker mode needs both APIs and an engine not on the broken list.
    pub fn execution_mode(&self) -> ExecutionMode {
        if self.offscreen_canvas && self.worker && !is_known_broken_engine(&self.user_agent) {
            ExecutionMode::Worker
        } else {
            ExecutionMode::MainThread
        }
    }
}

/// WebKit (desktop Safari and every iOS browser shell) ships
/// `OffscreenCanvas`, but WebGL on a transferred canvas is unreliable there.
pub fn is_known_broken_engine(user_agent: &str) -> bool {
    const NOT_WEBKIT: [&str; 4] = ["Chrome", "Chromium", "Edg/", "Android"];
    user_agent.contains("AppleWebKit")
        && user_agent.contains("Safari")
        && !NOT_WEBKIT.iter().any(|marker| user_agent.contains(marker))
}

/// Uniform command interface over either execution mode.
pub trait RenderSurface {
    fn execution(&self) -> ExecutionMode;
    fn set_progress(&mut self, value: f64);
    fn set_scanline_phase(&mut self, value: f64);
    fn set_mode(&mut self, mode: RenderMode);
    /// Fade the canvas out and stop drawing; GPU resources survive.
    fn finish(&mut self);
    /// Stop drawing and release everything. Idempotent; fine after `finish`.
    fn destroy(&mut self);

    /// String-tag convenience for page scripts.
    fn set_mode_tag(&mut self, tag: &str) {
        self.set_mode(RenderMode::from_tag(tag));
    }
}

/// Transport underneath a [`BootstrapSurface`].
pub trait SurfaceBackend {
    fn execution(&self) -> ExecutionMode;
    /// Deliver a command to the renderer, wherever it lives.
    fn dispatch(&mut self, command: WorkerCommand);
    /// Visually fade the canvas (styling only).
    fn fade_out(&mut self);
    /// Free the renderer and context, or the worker owning them.
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Live,
    Finished,
    Destroyed,
}

/// [`RenderSurface`] implemented once over any [`SurfaceBackend`].
pub struct BootstrapSurface<B> {
    backend: B,
    state: SurfaceState,
}

impl<B: SurfaceBackend> BootstrapSurface<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: SurfaceState::Live,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn send(&mut self, command: WorkerCommand) {
        if self.state == SurfaceState::Destroyed {
            return;
        }
        self.backend.dispatch(command);
    }
}

impl<B: SurfaceBackend> RenderSurface for BootstrapSurface<B> {
    fn execution(&self) -> ExecutionMode {
        self.backend.execution()
    }

    fn set_progress(&mut self, value: f64) {
        self.send(WorkerCommand::Progress {
            value: unit_f32(value),
        });
    }

    fn set_scanline_phase(&mut self, value: f64) {
        self.send(WorkerCommand::ScanlinePhase {
            value: unit_f32(value),
        });
    }

    fn set_mode(&mut self, mode: RenderMode) {
        tracing::debug!(%mode, "surface mode");
        self.send(WorkerCommand::Mode {
            value: mode.uniform_value(),
        });
    }

    fn finish(&mut self) {
        if self.state != SurfaceState::Live {
            return;
        }
        self.backend.fade_out();
        self.backend.dispatch(WorkerCommand::Stop);
        self.state = SurfaceState::Finished;
    }

    fn destroy(&mut self) {
        match self.state {
            SurfaceState::Destroyed => return,
            SurfaceState::Live => self.backend.dispatch(WorkerCommand::Stop),
            SurfaceState::Finished => {}
        }
        self.backend.release();
        self.state = SurfaceState::Destroyed;
        tracing::debug!(execution = ?self.backend.execution(), "render surface destroyed");
    }
}

/// Holder that turns every call into a no-op when surface creation failed.
#[derive(Default)]
pub struct SurfaceSlot {
    surface: Option<Box<dyn RenderSurface>>,
}

impl SurfaceSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn install(&mut self, surface: Box<dyn RenderSurface>) {
        if let Some(mut old) = self.surface.replace(surface) {
            old.destroy();
        }
    }

    pub fn is_present(&self) -> bool {
        self.surface.is_some()
    }

    pub fn execution(&self) -> Option<ExecutionMode> {
        self.surface.as_ref().map(|surface| surface.execution())
    }

    pub fn set_progress(&mut self, value: f64) {
        if let Some(surface) = self.surface.as_mut() {
            surface.set_progress(value);
        }
    }

    pub fn set_scanline_phase(&mut self, value: f64) {
        if let Some(surface) = self.surface.as_mut() {
            surface.set_scanline_phase(value);
        }
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        if let Some(surface) = self.surface.as_mut() {
            surface.set_mode(mode);
        }
    }

    pub fn finish(&mut self) {
        if let Some(surface) = self.surface.as_mut() {
            surface.finish();
        }
    }

    /// Destroy and drop the surface; the slot is empty afterwards.
    pub fn destroy(&mut self) {
        if let Some(mut surface) = self.surface.take() {
            surface.destroy();
        }
    }
}

fn unit_f32(value: f64) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0) as f32
    }
}
