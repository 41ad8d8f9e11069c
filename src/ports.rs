//! Port traits for everything the lifecycle drives but does not own the
//! implementation of: the DOM, the drag control, the 3D library and the
//! async executor.

use futures_util::future::LocalBoxFuture;

use crate::error::LifecycleError;
use crate::surface::RenderSurface;

/// The two canvases on the page. The CRT canvas belongs to the render
/// surface; the 3D library only ever gets the main one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanvasRole {
    Crt,
    Main,
}

/// Builds the CRT render surface against the CRT canvas.
pub trait SurfaceFactory {
    fn create(&self) -> LocalBoxFuture<'static, Result<Box<dyn RenderSurface>, LifecycleError>>;
}

/// DOM-side effects the lifecycle needs.
pub trait CanvasHost {
    fn hide(&self, canvas: CanvasRole);
    /// Full-screen notice with a reload action, for failures the page cannot
    /// recover from.
    fn show_fallback(&self, message: &str);
}

/// Callbacks handed to the drag-to-unlock control.
pub struct UnlockCallbacks {
    /// Gesture began.
    pub on_start: Box<dyn Fn()>,
    /// Current drag position in [0, 1].
    pub on_progress: Box<dyn Fn(f64)>,
    /// Released past the completion threshold.
    pub on_unlock: Box<dyn Fn()>,
}

pub trait UnlockControl {
    /// Wire the callbacks. Fails when the control's markup is missing.
    fn attach(&mut self, callbacks: UnlockCallbacks) -> Result<(), LifecycleError>;
    fn detach(&mut self);
}

/// Loads the rendering library and scene modules on demand.
pub trait SceneLoader {
    fn load_library(&self) -> LocalBoxFuture<'static, Result<(), LifecycleError>>;
    fn load_scene(&self, name: &str) -> LocalBoxFuture<'static, Result<(), LifecycleError>>;
    /// Construct the library's top-level controller. Requires a loaded library.
    fn create_manager(&self, canvas: CanvasRole) -> Result<Box<dyn SceneManager>, LifecycleError>;
}

/// The library's top-level controller, bound to one canvas.
pub trait SceneManager {
    /// Instantiate a loaded scene module and add it as a layer.
    fn add_scene(&mut self, name: &str) -> Result<(), LifecycleError>;
    fn remove_scene(&mut self, name: &str);
    fn dispose(&mut self);
}

/// Runs fire-and-forget futures on the current thread.
pub trait TaskSpawner {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}
