use std::cell::RefCell;
use std::rc::Rc;

use crt_boot::surface::{
    is_known_broken_engine, BootstrapSurface, Capabilities, SurfaceBackend, SurfaceState,
};
use crt_boot::{ExecutionMode, RenderMode, RenderSurface, SurfaceSlot, WorkerCommand};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Sent(WorkerCommand),
    Fade,
    Release,
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<Event>>>);

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }
}

impl SurfaceBackend for Recorder {
    fn execution(&self) -> ExecutionMode {
        ExecutionMode::Worker
    }

    fn dispatch(&mut self, command: WorkerCommand) {
        self.0.borrow_mut().push(Event::Sent(command));
    }

    fn fade_out(&mut self) {
        self.0.borrow_mut().push(Event::Fade);
    }

    fn release(&mut self) {
        self.0.borrow_mut().push(Event::Release);
    }
}

fn surface() -> (Recorder, BootstrapSurface<Recorder>) {
    let recorder = Recorder::default();
    (recorder.clone(), BootstrapSurface::new(recorder))
}

#[test]
fn mode_tags_map_to_uniform_values() {
    let (recorder, mut surface) = surface();
    for tag in ["boot", "scanline", "", "xyz"] {
        surface.set_mode_tag(tag);
    }
    let modes: Vec<Event> = [0.0, 1.0, 1.0, 1.0]
        .into_iter()
        .map(|value| Event::Sent(WorkerCommand::Mode { value }))
        .collect();
    assert_eq!(recorder.events(), modes);
}

#[test]
fn values_are_clamped_before_sending() {
    let (recorder, mut surface) = surface();
    surface.set_progress(1.7);
    surface.set_scanline_phase(-0.2);
    surface.set_progress(f64::NAN);
    assert_eq!(
        recorder.events(),
        vec![
            Event::Sent(WorkerCommand::Progress { value: 1.0 }),
            Event::Sent(WorkerCommand::ScanlinePhase { value: 0.0 }),
            Event::Sent(WorkerCommand::Progress { value: 0.0 }),
        ]
    );
}

#[test]
fn finish_fades_and_stops_once() {
    let (recorder, mut surface) = surface();
    surface.finish();
    surface.finish();
    assert_eq!(recorder.events(), vec![Event::Fade, Event::Sent(WorkerCommand::Stop)]);
    assert_eq!(surface.state(), SurfaceState::Finished);
}

#[test]
fn destroy_after_finish_only_releases() {
    let (recorder, mut surface) = surface();
    surface.finish();
    surface.destroy();
    surface.destroy();
    assert_eq!(
        recorder.events(),
        vec![Event::Fade, Event::Sent(WorkerCommand::Stop), Event::Release]
    );
    assert_eq!(surface.state(), SurfaceState::Destroyed);
}

#[test]
fn destroy_while_live_stops_first() {
    let (recorder, mut surface) = surface();
    surface.destroy();
    surface.finish();
    surface.set_progress(0.5);
    assert_eq!(
        recorder.events(),
        vec![Event::Sent(WorkerCommand::Stop), Event::Release]
    );
}

#[test]
fn empty_slot_swallows_every_call() {
    let mut slot = SurfaceSlot::empty();
    slot.set_progress(0.5);
    slot.set_scanline_phase(0.5);
    slot.set_mode(RenderMode::Scanline);
    slot.finish();
    slot.destroy();
    assert!(!slot.is_present());
    assert_eq!(slot.execution(), None);
}

#[test]
fn slot_destroy_empties_it() {
    let recorder = Recorder::default();
    let mut slot = SurfaceSlot::empty();
    slot.install(Box::new(BootstrapSurface::new(recorder.clone())));
    assert_eq!(slot.execution(), Some(ExecutionMode::Worker));

    slot.destroy();
    slot.destroy();
    slot.set_progress(0.3);
    assert!(!slot.is_present());
    assert_eq!(
        recorder.events(),
        vec![Event::Sent(WorkerCommand::Stop), Event::Release]
    );
}

const SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 \
                      (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
const IOS_CHROME: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) \
                          AppleWebKit/605.1.15 (KHTML, like Gecko) CriOS/123.0 Mobile/15E148 Safari/604.1";
const CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                      (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";
const EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                    (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.0.0";
const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0";

#[test]
fn webkit_is_detected_from_the_user_agent() {
    assert!(is_known_broken_engine(SAFARI));
    assert!(is_known_broken_engine(IOS_CHROME));
    assert!(!is_known_broken_engine(CHROME));
    assert!(!is_known_broken_engine(EDGE));
    assert!(!is_known_broken_engine(FIREFOX));
}

#[test]
fn worker_mode_needs_both_apis_and_a_working_engine() {
    let caps = |offscreen_canvas, worker, ua: &str| Capabilities {
        offscreen_canvas,
        worker,
        user_agent: ua.to_owned(),
    };
    assert_eq!(caps(true, true, CHROME).execution_mode(), ExecutionMode::Worker);
    assert_eq!(caps(true, true, FIREFOX).execution_mode(), ExecutionMode::Worker);
    assert_eq!(caps(true, true, SAFARI).execution_mode(), ExecutionMode::MainThread);
    assert_eq!(caps(false, true, CHROME).execution_mode(), ExecutionMode::MainThread);
    assert_eq!(caps(true, false, CHROME).execution_mode(), ExecutionMode::MainThread);
}
