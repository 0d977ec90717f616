use serde::Serialize;
use tracing::debug;

/// Visit lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    NotStarted,
    AwaitingConnection,
    Recording,
    Stopping,
    Ended,
}

/// Inputs that drive the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Clinician pressed start.
    StartRequested,
    /// The first audio frame was accepted by the transport.
    FirstFrameSent,
    /// Clinician pressed stop.
    StopRequested,
    /// The end-session call finished, successfully or not. Failure is
    /// surfaced to the user but never blocks the transition; finalization
    /// can be retried server-side.
    EndSessionSettled,
    /// The capture stream ended without a stop request (device hiccup,
    /// dropped track).
    CaptureLost,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Restart capture after the configured delay. Only ever requested when
    /// the stop was not user-initiated, so a deliberate stop is never fought.
    RestartCapture,
}

/// Pure state machine for one visit.
///
/// The `user_initiated_stop` flag distinguishes a clinician's stop from a
/// device hiccup; only the latter earns an automatic capture restart.
#[derive(Debug)]
pub struct Lifecycle {
    phase: SessionPhase,
    user_initiated_stop: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::NotStarted,
            user_initiated_stop: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn user_initiated_stop(&self) -> bool {
        self.user_initiated_stop
    }

    /// Apply one event, returning the side effect the caller should run.
    /// Events that make no sense in the current phase are ignored.
    pub fn apply(&mut self, event: SessionEvent) -> Action {
        use SessionEvent::*;
        use SessionPhase::*;

        let action = match (self.phase, event) {
            (NotStarted, StartRequested) => {
                self.phase = AwaitingConnection;
                Action::None
            }
            (AwaitingConnection, FirstFrameSent) => {
                self.phase = Recording;
                Action::None
            }
            (AwaitingConnection | Recording, StopRequested) => {
                self.user_initiated_stop = true;
                self.phase = Stopping;
                Action::None
            }
            (Stopping, EndSessionSettled) => {
                self.phase = Ended;
                Action::None
            }
            (Recording, CaptureLost) if !self.user_initiated_stop => Action::RestartCapture,
            (_, event) => {
                debug!(phase = ?self.phase, ?event, "ignoring lifecycle event");
                Action::None
            }
        };

        action
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
