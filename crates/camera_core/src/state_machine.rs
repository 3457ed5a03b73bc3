//! Gesture state machine: which camera commands a button gesture may trigger, and when.
//!
//! The camera only accepts the shutter sequence 1stpush → 2ndpush → 2ndrelease → 1strelease,
//! one request at a time. Every legal `(state, event)` pair is listed in [`transition`];
//! everything else is ignored.

use shared::domain::{CameraCommand, GestureState};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEvent {
    FocusPressed,
    FocusReleased,
    ShutterPressed,
    ShutterReleased,
    CommandsProcessed(CameraCommand),
    /// The camera or the network rejected a request.
    Error,
    /// No reply arrived within the command timeout.
    Timeout,
    /// Camera WiFi went away.
    LinkLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: GestureState,
    pub to: GestureState,
    /// Commands to enqueue, in order.
    pub commands: &'static [CameraCommand],
}

const FOCUS: &[CameraCommand] = &[
    CameraCommand::StopLiveView,
    CameraCommand::SetShutterMode,
    CameraCommand::FirstPush,
];
const UNFOCUS: &[CameraCommand] = &[CameraCommand::FirstRelease, CameraCommand::SetRecMode];
const TRIGGER: &[CameraCommand] = &[CameraCommand::SecondPush];
const UNTRIGGER: &[CameraCommand] = &[CameraCommand::SecondRelease];
const NONE: &[CameraCommand] = &[];

/// The transition table. `None` means the event does not apply in `state`.
pub fn transition(
    state: GestureState,
    event: GestureEvent,
) -> Option<(GestureState, &'static [CameraCommand])> {
    use CameraCommand as C;
    use GestureEvent as E;
    use GestureState as S;

    let row = match (state, event) {
        (S::Init, E::FocusPressed) => (S::FocusRequested, FOCUS),

        (S::FocusRequested, E::CommandsProcessed(C::FirstPush)) => (S::Focused, NONE),
        (S::FocusRequested, E::Timeout) => (S::Init, NONE),

        (S::Focused, E::FocusReleased) => (S::FocusReleasing, UNFOCUS),
        (S::Focused, E::ShutterPressed) => (S::TriggerRequested, TRIGGER),

        (S::FocusReleasing, E::CommandsProcessed(C::FirstRelease)) => (S::Init, NONE),
        (S::FocusReleasing, E::Timeout) => (S::Init, NONE),

        (S::TriggerRequested, E::CommandsProcessed(C::SecondPush)) => (S::Triggered, NONE),
        // The camera can be slow to answer 2ndpush; the release queues up behind it.
        (S::TriggerRequested, E::ShutterReleased) => (S::TriggerReleasing, UNTRIGGER),
        (S::TriggerRequested, E::Timeout) => (S::TriggerReleasing, UNTRIGGER),

        (S::Triggered, E::ShutterReleased) => (S::TriggerReleasing, UNTRIGGER),

        (S::TriggerReleasing, E::CommandsProcessed(C::SecondRelease)) => (S::Focused, NONE),
        (S::TriggerReleasing, E::Timeout) => (S::Focused, NONE),

        // Camera state is unknown after a failed request or a lost link.
        (S::Init, E::Error | E::LinkLost) => return None,
        (_, E::Error | E::LinkLost) => (S::Init, NONE),

        _ => return None,
    };
    Some(row)
}

pub trait StateListener: Send {
    fn state_entered(&mut self, state: GestureState);
}

impl<F> StateListener for F
where
    F: FnMut(GestureState) + Send,
{
    fn state_entered(&mut self, state: GestureState) {
        self(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct GestureStateMachine {
    state: GestureState,
    listeners: Vec<(ListenerId, Box<dyn StateListener>)>,
    next_listener_id: u64,
}

impl GestureStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Announces the initial state to listeners registered so far.
    pub fn start(&mut self) {
        self.notify_listeners();
    }

    pub fn add_listener(&mut self, listener: impl StateListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn handle(&mut self, event: GestureEvent) -> Option<Transition> {
        let (to, commands) = transition(self.state, event)?;
        let from = self.state;
        self.state = to;
        debug!(?from, ?to, ?event, "gesture state changed");
        self.notify_listeners();
        Some(Transition { from, to, commands })
    }

    pub fn focus_pressed(&mut self) -> Option<Transition> {
        self.handle(GestureEvent::FocusPressed)
    }

    pub fn focus_released(&mut self) -> Option<Transition> {
        self.handle(GestureEvent::FocusReleased)
    }

    pub fn shutter_pressed(&mut self) -> Option<Transition> {
        self.handle(GestureEvent::ShutterPressed)
    }

    pub fn shutter_released(&mut self) -> Option<Transition> {
        self.handle(GestureEvent::ShutterReleased)
    }

    pub fn commands_processed(&mut self, command: CameraCommand) -> Option<Transition> {
        self.handle(GestureEvent::CommandsProcessed(command))
    }

    pub fn error(&mut self) -> Option<Transition> {
        self.handle(GestureEvent::Error)
    }

    pub fn timeout(&mut self) -> Option<Transition> {
        self.handle(GestureEvent::Timeout)
    }

    pub fn link_lost(&mut self) -> Option<Transition> {
        self.handle(GestureEvent::LinkLost)
    }

    /// Switching the camera to rec mode is only safe while no shutter button is held.
    pub fn is_rec_mode_available(&self) -> bool {
        matches!(
            self.state,
            GestureState::Init | GestureState::FocusReleasing
        )
    }

    /// Drops all listeners; later transitions are silent.
    pub fn teardown(&mut self) {
        self.listeners.clear();
    }

    fn notify_listeners(&mut self) {
        let state = self.state;
        for (_, listener) in &mut self.listeners {
            listener.state_entered(state);
        }
    }
}

#[cfg(test)]
#[path = "tests/state_machine_tests.rs"]
mod tests;
