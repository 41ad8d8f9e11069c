use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Rolling frame-rate counter fed with animation-frame timestamps.
///
/// One instance lives for the whole page and is shared by `Rc`. Several
/// callbacks run per frame with the same timestamp; they count once.
pub struct FrameMonitor {
    window: usize,
    samples: RefCell<VecDeque<f64>>,
    frames: Cell<u64>,
}

impl FrameMonitor {
    pub const DEFAULT_WINDOW: usize = 60;

    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            samples: RefCell::new(VecDeque::with_capacity(window.max(2))),
            frames: Cell::new(0),
        }
    }

    /// Record a frame timestamp in milliseconds.
    pub fn record(&self, timestamp_ms: f64) {
        let mut samples = self.samples.borrow_mut();
        if samples.back().is_some_and(|last| *last >= timestamp_ms) {
            return;
        }
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(timestamp_ms);
        self.frames.set(self.frames.get() + 1);
    }

    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    /// Average frames per second over the sample window.
    pub fn fps(&self) -> Option<f64> {
        let samples = self.samples.borrow();
        let (first, last) = (samples.front()?, samples.back()?);
        let span = last - first;
        if samples.len() < 2 || span <= 0.0 {
            return None;
        }
        Some((samples.len() - 1) as f64 * 1000.0 / span)
    }
}

impl Default for FrameMonitor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
