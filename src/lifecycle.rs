//! Sequencing from the HTML shell to the live 3D scene.
//!
//! ```text
//! shell ──initialize──▶ boot ──N frames──▶ idle ──onStart──▶ loading ──visual > threshold──▶ active
//! ```
//!
//! The boot sweep writes progress straight to the surface, linearly, one
//! step per frame. Once the user starts dragging, the surface switches to
//! the scanline mode: the drag position drives `uScanlinePhase` directly,
//! while `uProgress` comes from the [`ProgressController`], whose target is
//! raised by loading milestones and pinned to 1 on unlock.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde::Serialize;

use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::frame::{FrameId, FrameScheduler};
use crate::mode::RenderMode;
use crate::monitor::FrameMonitor;
use crate::phase::{ListenerId, Phase, PhaseChange, PhaseState};
use crate::ports::{
    CanvasHost, CanvasRole, SceneLoader, SceneManager, SurfaceFactory, TaskSpawner,
    UnlockCallbacks, UnlockControl,
};
use crate::progress::ProgressController;
use crate::surface::{ExecutionMode, SurfaceSlot};

/// Everything the orchestrator drives, supplied by the composition root.
pub struct Collaborators {
    pub scheduler: Rc<dyn FrameScheduler>,
    pub spawner: Rc<dyn TaskSpawner>,
    pub surfaces: Box<dyn SurfaceFactory>,
    pub canvases: Rc<dyn CanvasHost>,
    pub unlock: Box<dyn UnlockControl>,
    pub scenes: Rc<dyn SceneLoader>,
    pub monitor: Option<Rc<FrameMonitor>>,
}

/// Introspection view, replacing ad-hoc globals on `window`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSnapshot {
    pub phase: Phase,
    pub visual_progress: f64,
    pub target_progress: f64,
    /// `None` when no render surface could be created.
    pub surface: Option<ExecutionMode>,
    pub degraded: bool,
    pub scene: Option<String>,
    pub frames: Option<u64>,
    pub fps: Option<f64>,
}

pub struct LifecycleOrchestrator {
    shared: Rc<Shared>,
}

struct Shared {
    config: LifecycleConfig,
    phase: PhaseState,
    progress: ProgressController,
    surface: Rc<RefCell<SurfaceSlot>>,
    scheduler: Rc<dyn FrameScheduler>,
    spawner: Rc<dyn TaskSpawner>,
    canvases: Rc<dyn CanvasHost>,
    scenes: Rc<dyn SceneLoader>,
    monitor: Option<Rc<FrameMonitor>>,
    surfaces: RefCell<Option<Box<dyn SurfaceFactory>>>,
    unlock: RefCell<Box<dyn UnlockControl>>,
    manager: RefCell<Option<Box<dyn SceneManager>>>,
    scene: RefCell<Option<String>>,
    boot_frame: Cell<Option<FrameId>>,
    poll_frame: Cell<Option<FrameId>>,
    initialized: Cell<bool>,
    started: Cell<bool>,
    /// Gestures that arrived while the boot sweep was still running.
    early_start: Cell<bool>,
    early_unlock: Cell<bool>,
    unlocked: Cell<bool>,
    degraded: Cell<bool>,
    disposed: Cell<bool>,
}

impl LifecycleOrchestrator {
    pub fn new(config: LifecycleConfig, parts: Collaborators) -> Result<Self, LifecycleError> {
        config.validate()?;
        let progress = ProgressController::new(Rc::clone(&parts.scheduler));
        Ok(Self {
            shared: Rc::new(Shared {
                config,
                phase: PhaseState::new(),
                progress,
                surface: Rc::new(RefCell::new(SurfaceSlot::empty())),
                scheduler: parts.scheduler,
                spawner: parts.spawner,
                canvases: parts.canvases,
                scenes: parts.scenes,
                monitor: parts.monitor,
                surfaces: RefCell::new(Some(parts.surfaces)),
                unlock: RefCell::new(parts.unlock),
                manager: RefCell::new(None),
                scene: RefCell::new(None),
                boot_frame: Cell::new(None),
                poll_frame: Cell::new(None),
                initialized: Cell::new(false),
                started: Cell::new(false),
                early_start: Cell::new(false),
                early_unlock: Cell::new(false),
                unlocked: Cell::new(false),
                degraded: Cell::new(false),
                disposed: Cell::new(false),
            }),
        })
    }

    /// Acquire the CRT surface, wire the unlock control and start the boot
    /// animation. Only the first call does anything.
    ///
    /// A surface that cannot be created hides the CRT canvas and leaves the
    /// rest of the sequence running without it. A missing unlock control is
    /// fatal.
    pub async fn initialize(&self) -> Result<(), LifecycleError> {
        let shared = Rc::clone(&self.shared);
        if shared.disposed.get() {
            return Err(LifecycleError::Disposed);
        }
        if shared.initialized.replace(true) {
            return Ok(());
        }

        let factory = shared.surfaces.borrow_mut().take();
        if let Some(factory) = factory {
            match factory.create().await {
                Ok(surface) => {
                    tracing::info!(execution = ?surface.execution(), "render surface ready");
                    shared.surface.borrow_mut().install(surface);
                }
                Err(error) => {
                    tracing::warn!(%error, "render surface unavailable; continuing without CRT");
                    shared.canvases.hide(CanvasRole::Crt);
                }
            }
        }
        if shared.disposed.get() {
            shared.surface.borrow_mut().destroy();
            return Err(LifecycleError::Disposed);
        }

        let slot = Rc::clone(&shared.surface);
        shared
            .progress
            .set_progress_update_callback(move |value| slot.borrow_mut().set_progress(value));

        shared.attach_unlock()?;
        shared.start_boot();
        Ok(())
    }

    /// Swap the active scene. If the new one fails to come up, the previous
    /// scene is put back and the error returned.
    pub async fn switch_to_scene(&self, name: &str) -> Result<(), LifecycleError> {
        let shared = Rc::clone(&self.shared);
        if shared.disposed.get() {
            return Err(LifecycleError::Disposed);
        }
        if shared.manager.borrow().is_none() {
            return Err(LifecycleError::SceneNotReady);
        }
        let previous = shared.scene.borrow().clone();
        if previous.as_deref() == Some(name) {
            return Ok(());
        }

        shared.scenes.load_scene(name).await?;

        let mut guard = shared.manager.borrow_mut();
        let manager = guard.as_mut().ok_or(LifecycleError::SceneNotReady)?;
        if let Some(previous) = previous.as_deref() {
            manager.remove_scene(previous);
        }
        match manager.add_scene(name) {
            Ok(()) => {
                tracing::info!(from = ?previous, to = name, "scene switched");
                *shared.scene.borrow_mut() = Some(name.to_owned());
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, scene = name, "scene switch failed");
                if let Some(previous) = previous.as_deref() {
                    if let Err(restore) = manager.add_scene(previous) {
                        tracing::error!(error = %restore, scene = previous, "could not restore previous scene");
                        *shared.scene.borrow_mut() = None;
                        shared.degraded.set(true);
                    }
                }
                Err(error)
            }
        }
    }

    /// Tear everything down: pending frame loops, the surface, the unlock
    /// control and the scene manager. Safe to repeat.
    pub fn dispose(&self) {
        let shared = &self.shared;
        if shared.disposed.replace(true) {
            return;
        }
        shared.progress.dispose();
        for pending in [&shared.boot_frame, &shared.poll_frame] {
            if let Some(id) = pending.take() {
                shared.scheduler.cancel_frame(id);
            }
        }
        shared.surface.borrow_mut().destroy();
        shared.unlock.borrow_mut().detach();
        if let Some(mut manager) = shared.manager.borrow_mut().take() {
            manager.dispose();
        }
        tracing::info!(phase = %shared.phase.current_phase(), "lifecycle disposed");
    }

    pub fn phase(&self) -> Phase {
        self.shared.phase.current_phase()
    }

    pub fn on_phase_change(&self, listener: impl Fn(PhaseChange) + 'static) -> ListenerId {
        self.shared.phase.on_phase_change(listener)
    }

    pub fn remove_phase_listener(&self, id: ListenerId) -> bool {
        self.shared.phase.remove_listener(id)
    }

    pub fn progress(&self) -> &ProgressController {
        &self.shared.progress
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.shared.config
    }

    pub fn is_degraded(&self) -> bool {
        self.shared.degraded.get()
    }

    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let shared = &self.shared;
        DebugSnapshot {
            phase: shared.phase.current_phase(),
            visual_progress: shared.progress.current_progress(),
            target_progress: shared.progress.target_progress(),
            surface: shared.surface.borrow().execution(),
            degraded: shared.degraded.get(),
            scene: shared.scene.borrow().clone(),
            frames: shared.monitor.as_ref().map(|monitor| monitor.frames()),
            fps: shared.monitor.as_ref().and_then(|monitor| monitor.fps()),
        }
    }
}

impl Shared {
    /// Forward-only phase move. Anything else is refused and logged.
    fn advance(&self, next: Phase) -> bool {
        let current = self.phase.current_phase();
        if !current.precedes(next) {
            tracing::warn!(from = %current, to = %next, "refusing non-forward phase transition");
            return false;
        }
        tracing::info!(from = %current, to = %next, "phase transition");
        self.phase.set_phase(next)
    }

    fn attach_unlock(self: &Rc<Self>) -> Result<(), LifecycleError> {
        let (start, progress, unlock) = (
            Rc::downgrade(self),
            Rc::downgrade(self),
            Rc::downgrade(self),
        );
        let callbacks = UnlockCallbacks {
            on_start: Box::new(move || with(&start, Shared::handle_start)),
            on_progress: Box::new(move |value| {
                if let Some(shared) = progress.upgrade() {
                    shared.handle_drag(value);
                }
            }),
            on_unlock: Box::new(move || with(&unlock, Shared::handle_unlock)),
        };
        self.unlock.borrow_mut().attach(callbacks).map_err(|error| {
            tracing::error!(%error, "cannot start without the unlock control");
            error
        })
    }

    fn start_boot(self: &Rc<Self>) {
        self.advance(Phase::Boot);
        self.surface.borrow_mut().set_mode(RenderMode::Boot);
        self.schedule_boot_frame(0);
    }

    fn schedule_boot_frame(self: &Rc<Self>, done: u32) {
        let weak = Rc::downgrade(self);
        let id = self.scheduler.request_frame(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.boot_frame(done + 1);
            }
        }));
        self.boot_frame.set(Some(id));
    }

    fn boot_frame(self: &Rc<Self>, frame: u32) {
        self.boot_frame.set(None);
        if self.disposed.get() {
            return;
        }
        let total = self.config.boot_frames;
        let progress = (f64::from(frame) / f64::from(total)).min(1.0);
        self.surface.borrow_mut().set_progress(progress);
        if frame >= total {
            self.advance(Phase::Idle);
            self.replay_early_gesture();
        } else {
            self.schedule_boot_frame(frame);
        }
    }

    fn handle_start(self: &Rc<Self>) {
        if self.disposed.get() || self.started.get() {
            return;
        }
        if self.phase.current_phase() < Phase::Idle {
            tracing::debug!("unlock gesture before boot finished; deferred to idle");
            self.early_start.set(true);
            return;
        }
        self.started.set(true);
        self.advance(Phase::Loading);
        self.surface.borrow_mut().set_mode(RenderMode::Scanline);

        let shared = Rc::clone(self);
        self.spawner
            .spawn(Box::pin(async move { shared.load_initial_scene().await }));
    }

    /// The unlock widget detaches after `onUnlock`, so a gesture made during
    /// boot is the only one that will ever arrive.
    fn replay_early_gesture(self: &Rc<Self>) {
        let start = self.early_start.take();
        if self.early_unlock.take() {
            self.handle_unlock();
        } else if start {
            self.handle_start();
        }
    }

    fn handle_drag(&self, value: f64) {
        if self.disposed.get() {
            return;
        }
        self.surface.borrow_mut().set_scanline_phase(value);
    }

    fn handle_unlock(self: &Rc<Self>) {
        if self.disposed.get() || self.unlocked.get() {
            return;
        }
        if !self.started.get() {
            self.handle_start();
            if !self.started.get() {
                self.early_unlock.set(true);
                return;
            }
        }
        self.unlocked.set(true);
        tracing::debug!(visual = self.progress.current_progress(), "unlocked");
        self.progress.set_target_progress(1.0);
        self.schedule_completion_poll();
    }

    fn schedule_completion_poll(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let id = self.scheduler.request_frame(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.poll_completion();
            }
        }));
        self.poll_frame.set(Some(id));
    }

    fn poll_completion(self: &Rc<Self>) {
        self.poll_frame.set(None);
        if self.disposed.get() {
            return;
        }
        if self.progress.current_progress() <= self.config.unlock_threshold {
            self.schedule_completion_poll();
            return;
        }
        {
            let mut surface = self.surface.borrow_mut();
            surface.finish();
            self.canvases.hide(CanvasRole::Crt);
            surface.destroy();
        }
        self.advance(Phase::Active);
    }

    /// Fire-and-forget from `onStart`. Whatever happens, the progress target
    /// ends at 1 so the unlock poll can finish.
    async fn load_initial_scene(self: Rc<Self>) {
        let name = self.config.initial_scene.clone();
        match self.run_loading_sequence(&name).await {
            Ok(()) => tracing::info!(scene = %name, "initial scene active"),
            Err(LifecycleError::Disposed) => {}
            Err(error) => {
                tracing::error!(%error, scene = %name, "scene loading failed");
                self.degraded.set(true);
                self.canvases
                    .show_fallback(&format!("The 3D scene could not be loaded ({error})."));
                self.progress.set_target_progress(1.0);
            }
        }
    }

    async fn run_loading_sequence(&self, name: &str) -> Result<(), LifecycleError> {
        let milestones = self.config.milestones;

        self.scenes.load_library().await?;
        self.ensure_live()?;
        self.progress.raise_target(milestones.library);

        self.scenes.load_scene(name).await?;
        self.ensure_live()?;
        self.progress.raise_target(milestones.scene_module);

        let manager = self.scenes.create_manager(CanvasRole::Main)?;
        *self.manager.borrow_mut() = Some(manager);
        self.progress.raise_target(milestones.manager);

        self.manager
            .borrow_mut()
            .as_mut()
            .ok_or(LifecycleError::SceneNotReady)?
            .add_scene(name)?;
        *self.scene.borrow_mut() = Some(name.to_owned());
        self.progress.raise_target(1.0);
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), LifecycleError> {
        if self.disposed.get() {
            Err(LifecycleError::Disposed)
        } else {
            Ok(())
        }
    }
}

fn with(weak: &Weak<Shared>, f: fn(&Rc<Shared>)) {
    if let Some(shared) = weak.upgrade() {
        f(&shared);
    }
}
