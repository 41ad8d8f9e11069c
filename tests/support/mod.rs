#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures_util::future::{poll_fn, LocalBoxFuture};

use crt_boot::error::LifecycleError;
use crt_boot::ports::{
    CanvasHost, CanvasRole, SceneLoader, SceneManager, SurfaceFactory, TaskSpawner,
    UnlockCallbacks, UnlockControl,
};
use crt_boot::{
    Collaborators, ExecutionMode, LifecycleConfig, LifecycleOrchestrator, RenderMode,
    RenderSurface, StepScheduler,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Progress(f64),
    ScanlinePhase(f64),
    Mode(RenderMode),
    Finish,
    Destroy,
}

#[derive(Clone, Default)]
pub struct SurfaceLog(Rc<RefCell<Vec<SurfaceCall>>>);

impl SurfaceLog {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.0.borrow().clone()
    }

    pub fn progress_values(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SurfaceCall::Progress(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &SurfaceCall) -> usize {
        self.0.borrow().iter().filter(|call| *call == wanted).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

pub struct FakeSurface {
    log: SurfaceLog,
}

impl RenderSurface for FakeSurface {
    fn execution(&self) -> ExecutionMode {
        ExecutionMode::MainThread
    }

    fn set_progress(&mut self, value: f64) {
        self.log.0.borrow_mut().push(SurfaceCall::Progress(value));
    }

    fn set_scanline_phase(&mut self, value: f64) {
        self.log.0.borrow_mut().push(SurfaceCall::ScanlinePhase(value));
    }

    fn set_mode(&mut self, mode: RenderMode) {
        self.log.0.borrow_mut().push(SurfaceCall::Mode(mode));
    }

    fn finish(&mut self) {
        self.log.0.borrow_mut().push(SurfaceCall::Finish);
    }

    fn destroy(&mut self) {
        self.log.0.borrow_mut().push(SurfaceCall::Destroy);
    }
}

pub struct FakeFactory {
    pub log: SurfaceLog,
    pub fail: bool,
}

impl SurfaceFactory for FakeFactory {
    fn create(&self) -> LocalBoxFuture<'static, Result<Box<dyn RenderSurface>, LifecycleError>> {
        let result: Result<Box<dyn RenderSurface>, LifecycleError> = if self.fail {
            Err(LifecycleError::SurfaceUnavailable("no webgl2".into()))
        } else {
            Ok(Box::new(FakeSurface {
                log: self.log.clone(),
            }))
        };
        Box::pin(async move { result })
    }
}

#[derive(Default)]
pub struct FakeCanvases {
    pub hidden: RefCell<Vec<CanvasRole>>,
    pub fallbacks: RefCell<Vec<String>>,
}

impl CanvasHost for FakeCanvases {
    fn hide(&self, canvas: CanvasRole) {
        self.hidden.borrow_mut().push(canvas);
    }

    fn show_fallback(&self, message: &str) {
        self.fallbacks.borrow_mut().push(message.to_owned());
    }
}

/// Shares the attached callbacks with the test so it can play the gesture.
#[derive(Clone, Default)]
pub struct Gesture {
    callbacks: Rc<RefCell<Option<UnlockCallbacks>>>,
    pub detached: Rc<Cell<bool>>,
}

impl Gesture {
    pub fn start(&self) {
        let callbacks = self.callbacks.borrow();
        (callbacks.as_ref().expect("control attached").on_start)();
    }

    pub fn drag(&self, value: f64) {
        let callbacks = self.callbacks.borrow();
        (callbacks.as_ref().expect("control attached").on_progress)(value);
    }

    pub fn unlock(&self) {
        let callbacks = self.callbacks.borrow();
        (callbacks.as_ref().expect("control attached").on_unlock)();
    }

    pub fn is_attached(&self) -> bool {
        self.callbacks.borrow().is_some()
    }
}

pub struct FakeUnlock {
    pub gesture: Gesture,
    pub markup_present: bool,
}

impl UnlockControl for FakeUnlock {
    fn attach(&mut self, callbacks: UnlockCallbacks) -> Result<(), LifecycleError> {
        if !self.markup_present {
            return Err(LifecycleError::UnlockControlMissing("#unlock".into()));
        }
        *self.gesture.callbacks.borrow_mut() = Some(callbacks);
        Ok(())
    }

    fn detach(&mut self) {
        self.gesture.detached.set(true);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneCall {
    LoadLibrary,
    LoadScene(String),
    CreateManager(CanvasRole),
    Add(String),
    Remove(String),
    Dispose,
}

/// Scripted behaviour of the scene library. Module loads named in `held`
/// stay pending until released; `LIBRARY` names the library load.
#[derive(Default)]
pub struct SceneScript {
    pub calls: RefCell<Vec<SceneCall>>,
    pub fail_library: Cell<bool>,
    pub fail_load: RefCell<Vec<String>>,
    pub fail_add: RefCell<Vec<String>>,
    pub held: RefCell<Vec<String>>,
}

impl SceneScript {
    pub const LIBRARY: &'static str = "library";

    pub fn hold(&self, step: &str) {
        self.held.borrow_mut().push(step.to_owned());
    }

    pub fn release(&self, step: &str) {
        self.held.borrow_mut().retain(|held| held != step);
    }
}

pub struct FakeScenes(pub Rc<SceneScript>);

fn gated(
    script: Rc<SceneScript>,
    step: String,
    result: Result<(), LifecycleError>,
) -> LocalBoxFuture<'static, Result<(), LifecycleError>> {
    Box::pin(async move {
        poll_fn(|_| {
            if script.held.borrow().contains(&step) {
                Poll::Pending
            } else {
                Poll::Ready(())
            }
        })
        .await;
        result
    })
}

impl SceneLoader for FakeScenes {
    fn load_library(&self) -> LocalBoxFuture<'static, Result<(), LifecycleError>> {
        self.0.calls.borrow_mut().push(SceneCall::LoadLibrary);
        let result = if self.0.fail_library.get() {
            Err(LifecycleError::module_load("engine.js", "404"))
        } else {
            Ok(())
        };
        gated(Rc::clone(&self.0), SceneScript::LIBRARY.to_owned(), result)
    }

    fn load_scene(&self, name: &str) -> LocalBoxFuture<'static, Result<(), LifecycleError>> {
        self.0.calls.borrow_mut().push(SceneCall::LoadScene(name.to_owned()));
        let result = if self.0.fail_load.borrow().iter().any(|n| n == name) {
            Err(LifecycleError::module_load(format!("{name}.js"), "404"))
        } else {
            Ok(())
        };
        gated(Rc::clone(&self.0), name.to_owned(), result)
    }

    fn create_manager(&self, canvas: CanvasRole) -> Result<Box<dyn SceneManager>, LifecycleError> {
        self.0.calls.borrow_mut().push(SceneCall::CreateManager(canvas));
        Ok(Box::new(FakeManager(Rc::clone(&self.0))))
    }
}

struct FakeManager(Rc<SceneScript>);

impl SceneManager for FakeManager {
    fn add_scene(&mut self, name: &str) -> Result<(), LifecycleError> {
        self.0.calls.borrow_mut().push(SceneCall::Add(name.to_owned()));
        if self.0.fail_add.borrow().iter().any(|n| n == name) {
            return Err(LifecycleError::scene(name, "constructor threw"));
        }
        Ok(())
    }

    fn remove_scene(&mut self, name: &str) {
        self.0.calls.borrow_mut().push(SceneCall::Remove(name.to_owned()));
    }

    fn dispose(&mut self) {
        self.0.calls.borrow_mut().push(SceneCall::Dispose);
    }
}

/// Holds spawned tasks until the test polls them.
#[derive(Default)]
pub struct QueueSpawner {
    tasks: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
}

impl QueueSpawner {
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Poll every queued task once; unfinished ones stay queued.
    pub fn run_all(&self) {
        let mut cx = Context::from_waker(futures_util::task::noop_waker_ref());
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        let mut unfinished = Vec::new();
        for mut task in tasks {
            if task.as_mut().poll(&mut cx).is_pending() {
                unfinished.push(task);
            }
        }
        self.tasks.borrow_mut().extend(unfinished);
    }
}

impl TaskSpawner for QueueSpawner {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.tasks.borrow_mut().push(task);
    }
}

pub struct Harness {
    pub lifecycle: LifecycleOrchestrator,
    pub scheduler: Rc<StepScheduler>,
    pub spawner: Rc<QueueSpawner>,
    pub surface: SurfaceLog,
    pub canvases: Rc<FakeCanvases>,
    pub gesture: Gesture,
    pub scenes: Rc<SceneScript>,
}

pub struct HarnessOptions {
    pub config: LifecycleConfig,
    pub surface_fails: bool,
    pub markup_present: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            config: LifecycleConfig::default(),
            surface_fails: false,
            markup_present: true,
        }
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with(HarnessOptions::default())
    }

    pub fn with(options: HarnessOptions) -> Self {
        let scheduler = Rc::new(StepScheduler::new());
        let spawner = Rc::new(QueueSpawner::default());
        let surface = SurfaceLog::default();
        let canvases = Rc::new(FakeCanvases::default());
        let gesture = Gesture::default();
        let scenes = Rc::new(SceneScript::default());

        let parts = Collaborators {
            scheduler: scheduler.clone(),
            spawner: spawner.clone(),
            surfaces: Box::new(FakeFactory {
                log: surface.clone(),
                fail: options.surface_fails,
            }),
            canvases: canvases.clone(),
            unlock: Box::new(FakeUnlock {
                gesture: gesture.clone(),
                markup_present: options.markup_present,
            }),
            scenes: Rc::new(FakeScenes(Rc::clone(&scenes))),
            monitor: None,
        };
        let lifecycle = LifecycleOrchestrator::new(options.config, parts).expect("valid config");
        Self {
            lifecycle,
            scheduler,
            spawner,
            surface,
            canvases,
            gesture,
            scenes,
        }
    }

    pub fn initialize(&self) -> Result<(), LifecycleError> {
        pollster::block_on(self.lifecycle.initialize())
    }

    pub fn tick(&self, frames: usize) {
        for _ in 0..frames {
            self.scheduler.tick();
        }
    }

    /// Initialize and run the boot animation to completion.
    pub fn booted(options: HarnessOptions) -> Self {
        let harness = Self::with(options);
        harness.initialize().expect("initialize");
        let frames = harness.lifecycle.config().boot_frames as usize;
        harness.tick(frames);
        harness
    }
}
