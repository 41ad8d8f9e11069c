//! Application phases and the observable holder that broadcasts changes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

/// Coarse application phase, in the order the page moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Static HTML/CSS, nothing running yet.
    Shell,
    /// CRT power-on animation.
    Boot,
    /// Waiting for the unlock gesture.
    Idle,
    /// Scanline loader while modules and assets arrive.
    Loading,
    /// The 3D scene owns the screen.
    Active,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Shell,
        Phase::Boot,
        Phase::Idle,
        Phase::Loading,
        Phase::Active,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Shell => "shell",
            Phase::Boot => "boot",
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Active => "active",
        }
    }

    /// True when `next` lies strictly later in the phase order.
    pub fn precedes(self, next: Phase) -> bool {
        self < next
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition as delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
}

/// Returned by [`PhaseState::on_phase_change`]; pass it back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(PhaseChange)>;

/// Current phase plus synchronous change notification.
///
/// Legality of transitions is not checked here; the orchestrator decides
/// which moves are allowed.
pub struct PhaseState {
    current: Cell<Phase>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_id: Cell<u64>,
}

impl PhaseState {
    pub fn new() -> Self {
        Self {
            current: Cell::new(Phase::Shell),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn current_phase(&self) -> Phase {
        self.current.get()
    }

    /// Switch to `phase`, notifying listeners in registration order.
    ///
    /// Setting the phase that is already current is a no-op and produces no
    /// notification. Returns whether a change happened.
    pub fn set_phase(&self, phase: Phase) -> bool {
        let from = self.current.replace(phase);
        if from == phase {
            return false;
        }
        // Snapshot so listeners may add or remove listeners while being notified.
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        let change = PhaseChange { from, to: phase };
        for listener in listeners {
            listener(change);
        }
        true
    }

    pub fn on_phase_change(&self, listener: impl Fn(PhaseChange) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new()
    }
}
