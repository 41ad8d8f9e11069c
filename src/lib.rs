//! Power-on sequence for a WebGL portfolio: CRT boot sweep, drag-to-unlock,
//! scanline loader, then hand-off to a lazily loaded 3D scene.
//!
//! The lifecycle core below is plain Rust and runs (and is tested) on the
//! host. The browser bindings live in `wasm` and only build for wasm32.

pub mod config;
pub mod error;
pub mod frame;
pub mod lifecycle;
pub mod mode;
pub mod monitor;
pub mod phase;
pub mod ports;
pub mod progress;
pub mod protocol;
pub mod surface;

pub use config::LifecycleConfig;
pub use error::LifecycleError;
pub use frame::{FrameId, FrameScheduler, StepScheduler};
pub use lifecycle::{Collaborators, DebugSnapshot, LifecycleOrchestrator};
pub use mode::RenderMode;
pub use monitor::FrameMonitor;
pub use phase::{Phase, PhaseChange, PhaseState};
pub use progress::ProgressController;
pub use protocol::{WorkerCommand, WorkerEndpoint};
pub use surface::{ExecutionMode, RenderSurface, SurfaceSlot};

// Only compile wasm-specific code when targeting wasm32.
#[cfg(target_arch = "wasm32")]
pub mod wasm;
