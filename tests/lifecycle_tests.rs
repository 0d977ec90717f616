// Tests for the visit lifecycle state machine, including the liveness
// safeguard guarded by the user-initiated stop flag.

use visit_scribe::session::{Action, Lifecycle, SessionEvent, SessionPhase};

#[test]
fn full_visit_walks_through_every_phase() {
    let mut lifecycle = Lifecycle::new();
    assert_eq!(lifecycle.phase(), SessionPhase::NotStarted);

    lifecycle.apply(SessionEvent::StartRequested);
    assert_eq!(lifecycle.phase(), SessionPhase::AwaitingConnection);

    lifecycle.apply(SessionEvent::FirstFrameSent);
    assert_eq!(lifecycle.phase(), SessionPhase::Recording);

    lifecycle.apply(SessionEvent::StopRequested);
    assert_eq!(lifecycle.phase(), SessionPhase::Stopping);
    assert!(lifecycle.user_initiated_stop());

    lifecycle.apply(SessionEvent::EndSessionSettled);
    assert_eq!(lifecycle.phase(), SessionPhase::Ended);
}

#[test]
fn end_session_failure_still_reaches_ended() {
    // The settle event is the same whether the backend call succeeded or
    // failed; the failure is surfaced elsewhere and never blocks the exit.
    let mut lifecycle = Lifecycle::new();
    lifecycle.apply(SessionEvent::StartRequested);
    lifecycle.apply(SessionEvent::FirstFrameSent);
    lifecycle.apply(SessionEvent::StopRequested);
    lifecycle.apply(SessionEvent::EndSessionSettled);

    assert_eq!(lifecycle.phase(), SessionPhase::Ended);
}

#[test]
fn capture_lost_while_recording_requests_a_restart() {
    let mut lifecycle = Lifecycle::new();
    lifecycle.apply(SessionEvent::StartRequested);
    lifecycle.apply(SessionEvent::FirstFrameSent);

    let action = lifecycle.apply(SessionEvent::CaptureLost);
    assert_eq!(action, Action::RestartCapture);
    // Still recording as far as the visit is concerned.
    assert_eq!(lifecycle.phase(), SessionPhase::Recording);
}

#[test]
fn capture_lost_after_user_stop_is_not_restarted() {
    let mut lifecycle = Lifecycle::new();
    lifecycle.apply(SessionEvent::StartRequested);
    lifecycle.apply(SessionEvent::FirstFrameSent);
    lifecycle.apply(SessionEvent::StopRequested);

    let action = lifecycle.apply(SessionEvent::CaptureLost);
    assert_eq!(action, Action::None);
}

#[test]
fn stop_is_allowed_before_the_first_frame() {
    let mut lifecycle = Lifecycle::new();
    lifecycle.apply(SessionEvent::StartRequested);

    lifecycle.apply(SessionEvent::StopRequested);
    assert_eq!(lifecycle.phase(), SessionPhase::Stopping);
    assert!(lifecycle.user_initiated_stop());
}

#[test]
fn out_of_phase_events_are_ignored() {
    let mut lifecycle = Lifecycle::new();

    // Nothing has started yet; none of these may move the machine.
    assert_eq!(lifecycle.apply(SessionEvent::FirstFrameSent), Action::None);
    assert_eq!(lifecycle.apply(SessionEvent::CaptureLost), Action::None);
    assert_eq!(lifecycle.apply(SessionEvent::EndSessionSettled), Action::None);
    assert_eq!(lifecycle.phase(), SessionPhase::NotStarted);

    // A finished visit stays finished.
    lifecycle.apply(SessionEvent::StartRequested);
    lifecycle.apply(SessionEvent::FirstFrameSent);
    lifecycle.apply(SessionEvent::StopRequested);
    lifecycle.apply(SessionEvent::EndSessionSettled);
    assert_eq!(lifecycle.apply(SessionEvent::StartRequested), Action::None);
    assert_eq!(lifecycle.phase(), SessionPhase::Ended);
}
