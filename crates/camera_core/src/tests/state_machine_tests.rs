use super::*;
use std::sync::{Arc, Mutex};

use CameraCommand as C;
use GestureEvent as E;
use GestureState as S;

fn all_events() -> Vec<GestureEvent> {
    let mut events = vec![
        E::FocusPressed,
        E::FocusReleased,
        E::ShutterPressed,
        E::ShutterReleased,
        E::Error,
        E::Timeout,
        E::LinkLost,
    ];
    for cmd in [
        C::NoCommand,
        C::SetRecMode,
        C::SetShutterMode,
        C::FirstPush,
        C::FirstRelease,
        C::SecondPush,
        C::SecondRelease,
        C::FirstSecondPush,
        C::SecondFirstRelease,
        C::RequestShutterSpeed,
        C::RequestFocalValue,
        C::RequestEvValue,
        C::RequestIsoValue,
        C::RequestDriveMode,
        C::StartLiveView,
        C::StopLiveView,
        C::GetLastImage,
        C::GetRecView,
        C::StoreImage,
        C::RequestCommandList,
    ] {
        events.push(E::CommandsProcessed(cmd));
    }
    events
}

fn expected_rows() -> Vec<(GestureState, GestureEvent, GestureState, Vec<CameraCommand>)> {
    vec![
        (
            S::Init,
            E::FocusPressed,
            S::FocusRequested,
            vec![C::StopLiveView, C::SetShutterMode, C::FirstPush],
        ),
        (S::FocusRequested, E::CommandsProcessed(C::FirstPush), S::Focused, vec![]),
        (S::FocusRequested, E::Timeout, S::Init, vec![]),
        (
            S::Focused,
            E::FocusReleased,
            S::FocusReleasing,
            vec![C::FirstRelease, C::SetRecMode],
        ),
        (S::Focused, E::ShutterPressed, S::TriggerRequested, vec![C::SecondPush]),
        (S::FocusReleasing, E::CommandsProcessed(C::FirstRelease), S::Init, vec![]),
        (S::FocusReleasing, E::Timeout, S::Init, vec![]),
        (S::TriggerRequested, E::CommandsProcessed(C::SecondPush), S::Triggered, vec![]),
        (
            S::TriggerRequested,
            E::ShutterReleased,
            S::TriggerReleasing,
            vec![C::SecondRelease],
        ),
        (S::TriggerRequested, E::Timeout, S::TriggerReleasing, vec![C::SecondRelease]),
        (S::Triggered, E::ShutterReleased, S::TriggerReleasing, vec![C::SecondRelease]),
        (S::TriggerReleasing, E::CommandsProcessed(C::SecondRelease), S::Focused, vec![]),
        (S::TriggerReleasing, E::Timeout, S::Focused, vec![]),
    ]
}

fn expected(state: GestureState, event: GestureEvent) -> Option<(GestureState, Vec<CameraCommand>)> {
    if let Some((_, _, to, cmds)) = expected_rows()
        .into_iter()
        .find(|(from, ev, _, _)| *from == state && *ev == event)
    {
        return Some((to, cmds));
    }
    match event {
        E::Error | E::LinkLost if state != S::Init => Some((S::Init, vec![])),
        _ => None,
    }
}

fn machine_in(state: GestureState) -> GestureStateMachine {
    GestureStateMachine {
        state,
        ..GestureStateMachine::new()
    }
}

#[test]
fn every_state_event_pair_matches_the_table() {
    for state in S::ALL {
        for event in all_events() {
            let mut fsm = machine_in(state);
            let result = fsm.handle(event);
            match expected(state, event) {
                Some((to, cmds)) => {
                    let t = result.unwrap_or_else(|| panic!("{state:?} + {event:?} ignored"));
                    assert_eq!(t.from, state);
                    assert_eq!(t.to, to, "{state:?} + {event:?}");
                    assert_eq!(t.commands, cmds.as_slice(), "{state:?} + {event:?}");
                    assert_eq!(fsm.state(), to);
                }
                None => {
                    assert!(result.is_none(), "{state:?} + {event:?} should be ignored");
                    assert_eq!(fsm.state(), state);
                }
            }
        }
    }
}

#[test]
fn transport_error_resets_every_state_to_init() {
    for state in S::ALL {
        let mut fsm = machine_in(state);
        fsm.error();
        assert_eq!(fsm.state(), S::Init);
    }
}

#[test]
fn rec_mode_only_available_without_buttons_held() {
    for state in S::ALL {
        let fsm = machine_in(state);
        assert_eq!(
            fsm.is_rec_mode_available(),
            matches!(state, S::Init | S::FocusReleasing),
            "{state:?}"
        );
    }
}

#[test]
fn full_photo_sequence() {
    let mut fsm = GestureStateMachine::new();
    assert!(fsm.focus_pressed().is_some());
    assert!(fsm.commands_processed(C::SetShutterMode).is_none());
    assert_eq!(fsm.commands_processed(C::FirstPush).map(|t| t.to), Some(S::Focused));
    assert_eq!(fsm.shutter_pressed().map(|t| t.to), Some(S::TriggerRequested));
    assert_eq!(fsm.commands_processed(C::SecondPush).map(|t| t.to), Some(S::Triggered));
    assert_eq!(fsm.shutter_released().map(|t| t.to), Some(S::TriggerReleasing));
    assert_eq!(fsm.commands_processed(C::SecondRelease).map(|t| t.to), Some(S::Focused));
    assert_eq!(fsm.focus_released().map(|t| t.to), Some(S::FocusReleasing));
    assert_eq!(fsm.commands_processed(C::FirstRelease).map(|t| t.to), Some(S::Init));
}

#[test]
fn listeners_see_every_entered_state() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut fsm = GestureStateMachine::new();
    let sink = Arc::clone(&seen);
    fsm.add_listener(move |state: GestureState| sink.lock().expect("lock").push(state));

    fsm.start();
    fsm.focus_pressed();
    fsm.shutter_pressed(); // ignored while focusing
    fsm.commands_processed(C::FirstPush);

    assert_eq!(
        *seen.lock().expect("lock"),
        vec![S::Init, S::FocusRequested, S::Focused]
    );
}

#[test]
fn removed_and_torn_down_listeners_are_silent() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut fsm = GestureStateMachine::new();
    let first = Arc::clone(&seen);
    let id = fsm.add_listener(move |state: GestureState| first.lock().expect("lock").push(("a", state)));
    let second = Arc::clone(&seen);
    fsm.add_listener(move |state: GestureState| second.lock().expect("lock").push(("b", state)));

    assert!(fsm.remove_listener(id));
    assert!(!fsm.remove_listener(id));
    fsm.focus_pressed();
    fsm.teardown();
    fsm.commands_processed(C::FirstPush);

    assert_eq!(*seen.lock().expect("lock"), vec![("b", S::FocusRequested)]);
    assert_eq!(fsm.state(), S::Focused);
}
