//! Commands sent from the page to whatever is drawing the CRT canvas.
//!
//! In worker mode they cross `postMessage` as `{ type, ... }` objects (the
//! transferred `OffscreenCanvas` rides alongside `init` under a `canvas`
//! key). In main-thread mode the same values are applied to a local
//! [`WorkerEndpoint`] directly.

use serde::{Deserialize, Serialize};

/// Canvas geometry carried by `init`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitParams {
    /// CSS width in pixels.
    pub width: f64,
    /// CSS height in pixels.
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl InitParams {
    /// Backing-store size: each CSS dimension times the pixel ratio, at least 1.
    pub fn physical_size(&self) -> (u32, u32) {
        physical_size(self.width, self.height, self.device_pixel_ratio)
    }
}

pub fn physical_size(width: f64, height: f64, dpr: f64) -> (u32, u32) {
    let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
    let scale = |dim: f64| {
        let px = (dim * dpr).round();
        if px.is_finite() && px >= 1.0 {
            px.min(f64::from(u32::MAX)) as u32
        } else {
            1
        }
    };
    (scale(width), scale(height))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerCommand {
    Init(InitParams),
    Progress { value: f32 },
    ScanlinePhase { value: f32 },
    /// `uMode` value: 0 boot, 1 scanline.
    Mode { value: f32 },
    Stop,
}

impl WorkerCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerCommand::Init(_) => "init",
            WorkerCommand::Progress { .. } => "progress",
            WorkerCommand::ScanlinePhase { .. } => "scanlinePhase",
            WorkerCommand::Mode { .. } => "mode",
            WorkerCommand::Stop => "stop",
        }
    }
}

/// The uniform setters a CRT renderer exposes to the command channel.
pub trait UniformRenderer {
    fn set_progress(&mut self, value: f32);
    fn set_scanline_phase(&mut self, value: f32);
    fn set_mode(&mut self, value: f32);
    /// Stop the draw loop. GPU resources stay alive.
    fn stop(&mut self);
    /// Free shaders, program, buffers and the context.
    fn release(&mut self);
}

/// Start a freshly built renderer. One that fails to start is released
/// before the error is returned, so its GPU objects do not outlive it.
pub fn start_or_release<R, E>(
    mut renderer: R,
    start: impl FnOnce(&R) -> Result<(), E>,
) -> Result<R, E>
where
    R: UniformRenderer,
{
    match start(&renderer) {
        Ok(()) => Ok(renderer),
        Err(err) => {
            renderer.release();
            Err(err)
        }
    }
}

/// What the host should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// The renderer stopped; a worker should `close()` itself.
    Terminate,
}

/// Receiving side of the protocol.
///
/// Holds no renderer until `init`; commands that arrive before it are
/// dropped silently so racy early calls are harmless.
pub struct WorkerEndpoint<R> {
    renderer: Option<R>,
    initialized: bool,
}

impl<R: UniformRenderer> WorkerEndpoint<R> {
    pub fn new() -> Self {
        Self {
            renderer: None,
            initialized: false,
        }
    }

    /// An endpoint whose renderer was built in-process (main-thread mode).
    pub fn with_renderer(renderer: R) -> Self {
        Self {
            renderer: Some(renderer),
            initialized: true,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn renderer(&self) -> Option<&R> {
        self.renderer.as_ref()
    }

    /// Apply one command. `build` is only called for the first `init`.
    pub fn handle<E, F>(&mut self, command: WorkerCommand, build: F) -> Result<Control, E>
    where
        F: FnOnce(&InitParams) -> Result<R, E>,
    {
        if let WorkerCommand::Init(params) = command {
            if self.initialized {
                tracing::warn!("duplicate init ignored");
                return Ok(Control::Continue);
            }
            self.renderer = Some(build(&params)?);
            self.initialized = true;
            tracing::debug!(?params, "renderer initialised");
            return Ok(Control::Continue);
        }
        Ok(self.apply(command))
    }

    /// Apply a non-`init` command.
    pub fn apply(&mut self, command: WorkerCommand) -> Control {
        let Some(renderer) = self.renderer.as_mut() else {
            tracing::trace!(kind = command.kind(), "command before init dropped");
            return Control::Continue;
        };
        match command {
            WorkerCommand::Init(_) => {
                tracing::warn!("init on a live endpoint ignored");
                Control::Continue
            }
            WorkerCommand::Progress { value } => {
                renderer.set_progress(value);
                Control::Continue
            }
            WorkerCommand::ScanlinePhase { value } => {
                renderer.set_scanline_phase(value);
                Control::Continue
            }
            WorkerCommand::Mode { value } => {
                renderer.set_mode(value);
                Control::Continue
            }
            WorkerCommand::Stop => {
                renderer.stop();
                Control::Terminate
            }
        }
    }

    /// Stop and free the renderer, if any. Safe to repeat.
    pub fn release(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.stop();
            renderer.release();
        }
    }
}

impl<R: UniformRenderer> Default for WorkerEndpoint<R> {
    fn default() -> Self {
        Self::new()
    }
}
