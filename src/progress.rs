//! Smoothed progress signal feeding the scanline shader.
//!
//! Three sources move the target (boot timer aside): the drag gesture's
//! unlock, and each loading milestone. The controller eases a visual value
//! toward whatever the latest target is, one animation frame at a time, and
//! pushes every intermediate value to a single registered sink.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::frame::{FrameId, FrameScheduler};

/// Fraction of the remaining distance covered per frame.
pub const SMOOTHING: f64 = 0.18;
/// Distance at which the visual value snaps onto the target.
pub const EPSILON: f64 = 0.002;

type ProgressCallback = Rc<dyn Fn(f64)>;

struct Inner {
    visual: f64,
    target: f64,
    pending: Option<FrameId>,
    callback: Option<ProgressCallback>,
    disposed: bool,
}

/// One step of exponential easing. Returns the new visual value and whether
/// it has converged (and therefore been snapped onto `target`).
pub fn smoothing_step(visual: f64, target: f64) -> (f64, bool) {
    let next = visual + (target - visual) * SMOOTHING;
    if (target - next).abs() <= EPSILON {
        (target, true)
    } else {
        (next, false)
    }
}

/// Cheap to clone; clones share the same value pair and driver.
#[derive(Clone)]
pub struct ProgressController {
    inner: Rc<RefCell<Inner>>,
    scheduler: Rc<dyn FrameScheduler>,
}

impl ProgressController {
    pub fn new(scheduler: Rc<dyn FrameScheduler>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                visual: 0.0,
                target: 0.0,
                pending: None,
                callback: None,
                disposed: false,
            })),
            scheduler,
        }
    }

    /// Move the target and make sure exactly one smoothing driver is queued.
    pub fn set_target_progress(&self, value: f64) {
        let previous = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.target = clamp_unit(value);
            inner.pending.take()
        };
        if let Some(id) = previous {
            self.scheduler.cancel_frame(id);
        }
        schedule_step(&self.inner, &self.scheduler);
    }

    /// Like [`set_target_progress`](Self::set_target_progress) but never lowers the target.
    pub fn raise_target(&self, value: f64) {
        let target = self.inner.borrow().target;
        let value = clamp_unit(value);
        if value > target {
            self.set_target_progress(value);
        }
    }

    /// Jump straight to `value` without easing. Fires the callback once and
    /// leaves any running driver alone.
    pub fn set_progress_immediate(&self, value: f64) {
        let (value, callback) = {
            let mut inner = self.inner.borrow_mut();
            let value = clamp_unit(value);
            inner.visual = value;
            inner.target = value;
            (value, inner.callback.clone())
        };
        if let Some(callback) = callback {
            callback(value);
        }
    }

    pub fn current_progress(&self) -> f64 {
        self.inner.borrow().visual
    }

    pub fn target_progress(&self) -> f64 {
        self.inner.borrow().target
    }

    /// Whether a smoothing step is queued.
    pub fn is_running(&self) -> bool {
        self.inner.borrow().pending.is_some()
    }

    /// Register the sink for visual updates, replacing any previous one.
    pub fn set_progress_update_callback(&self, callback: impl Fn(f64) + 'static) {
        self.inner.borrow_mut().callback = Some(Rc::new(callback));
    }

    /// Cancel the pending step. Later target changes are ignored.
    pub fn dispose(&self) {
        let pending = {
            let mut inner = self.inner.borrow_mut();
            inner.disposed = true;
            inner.pending.take()
        };
        if let Some(id) = pending {
            self.scheduler.cancel_frame(id);
        }
    }
}

fn schedule_step(inner: &Rc<RefCell<Inner>>, scheduler: &Rc<dyn FrameScheduler>) {
    let weak = Rc::downgrade(inner);
    let driver = Rc::clone(scheduler);
    let id = scheduler.request_frame(Box::new(move || step(&weak, &driver)));
    inner.borrow_mut().pending = Some(id);
}

fn step(weak: &Weak<RefCell<Inner>>, scheduler: &Rc<dyn FrameScheduler>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let (visual, converged, callback) = {
        let mut state = inner.borrow_mut();
        state.pending = None;
        if state.disposed {
            return;
        }
        let (visual, converged) = smoothing_step(state.visual, state.target);
        state.visual = visual;
        (visual, converged, state.callback.clone())
    };
    tracing::trace!(visual, converged, "progress step");
    if !converged {
        schedule_step(&inner, scheduler);
    }
    if let Some(callback) = callback {
        callback(visual);
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
