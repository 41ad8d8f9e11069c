//! Animation-frame scheduling.
//!
//! Every loop in the lifecycle (boot animation, progress smoothing, unlock
//! polling) schedules its own continuation one frame at a time. In the
//! browser that is `requestAnimationFrame`; headless runs use
//! [`StepScheduler`], which only advances when told to.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

/// Identifier of a pending frame callback.
pub type FrameId = i32;

pub type FrameCallback = Box<dyn FnOnce()>;

pub trait FrameScheduler {
    /// Run `callback` once on the next frame.
    fn request_frame(&self, callback: FrameCallback) -> FrameId;

    /// Drop a pending callback. Unknown or already-run ids are ignored.
    fn cancel_frame(&self, id: FrameId);
}

/// Deterministic frame queue driven by explicit [`tick`](Self::tick) calls.
///
/// A tick runs exactly the callbacks that were queued before it started;
/// anything requested while the tick runs waits for the next one, matching
/// how the browser services `requestAnimationFrame`.
#[derive(Default)]
pub struct StepScheduler {
    queue: RefCell<Vec<(FrameId, FrameCallback)>>,
    in_flight: RefCell<HashSet<FrameId>>,
    cancelled: RefCell<HashSet<FrameId>>,
    next_id: Cell<FrameId>,
    ticks: Cell<u64>,
}

impl StepScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one frame. Returns how many callbacks actually executed.
    pub fn tick(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue.borrow_mut());
        *self.in_flight.borrow_mut() = batch.iter().map(|(id, _)| *id).collect();
        self.ticks.set(self.ticks.get() + 1);

        let mut ran = 0;
        for (id, callback) in batch {
            self.in_flight.borrow_mut().remove(&id);
            if self.cancelled.borrow_mut().remove(&id) {
                continue;
            }
            callback();
            ran += 1;
        }
        self.cancelled.borrow_mut().clear();
        ran
    }

    /// Tick until nothing is pending or `max_ticks` is reached. Returns the
    /// number of ticks performed.
    pub fn run_until_idle(&self, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while self.pending() > 0 && ticks < max_ticks {
            self.tick();
            ticks += 1;
        }
        ticks
    }

    /// Callbacks waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Ticks performed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }
}

impl FrameScheduler for StepScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameId {
        let id = self.next_id.get().wrapping_add(1);
        self.next_id.set(id);
        self.queue.borrow_mut().push((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        let mut queue = self.queue.borrow_mut();
        let before = queue.len();
        queue.retain(|(queued, _)| *queued != id);
        if queue.len() == before && self.in_flight.borrow().contains(&id) {
            self.cancelled.borrow_mut().insert(id);
        }
    }
}
