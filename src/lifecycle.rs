// src/lifecycle.rs
//
// Panel state machine: Open -> (ClosePending) -> Closed -> Destroyed.
// Movement is monotonic; there is no way back to Open once a close is recorded.
// The session axis (open / closing / closed) is tracked separately and never
// destroys the panel on its own.

use std::cell::Cell;

use serde::Serialize;

use crate::error::GuardUnderflow;
use crate::guard::{CloseRequest, RetapGuard, RetapRelease};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelState {
    #[default]
    Open,
    /// Closed by the user while a retap was in flight
    ClosePending,
    /// Teardown is running
    Closed,
    Destroyed,
}

impl PanelState {
    /// Whether the user has closed the panel (pending or done).
    pub fn is_closing(self) -> bool {
        !matches!(self, Self::Open)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Open,
    Closing,
    Closed,
}

/// What the panel should do after a close request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseDecision {
    TeardownNow,
    Deferred { depth: usize },
    /// Close already recorded, or the panel is past teardown
    Ignored,
}

#[derive(Debug, Default)]
pub struct LifecycleController {
    state: Cell<PanelState>,
    session: Cell<SessionPhase>,
    guard: RetapGuard,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PanelState {
        self.state.get()
    }

    pub fn session_phase(&self) -> SessionPhase {
        self.session.get()
    }

    pub fn retap_depth(&self) -> usize {
        self.guard.depth()
    }

    /// User interaction may only start a retap while both axes are open.
    pub fn can_initiate_retap(&self) -> bool {
        self.state.get() == PanelState::Open && self.session.get() == SessionPhase::Open
    }

    pub fn request_close(&self) -> CloseDecision {
        if self.state.get() != PanelState::Open {
            return CloseDecision::Ignored;
        }
        match self.guard.request_close() {
            CloseRequest::Immediate => CloseDecision::TeardownNow,
            CloseRequest::Deferred { depth } => {
                self.state.set(PanelState::ClosePending);
                CloseDecision::Deferred { depth }
            }
            CloseRequest::AlreadyRequested => CloseDecision::Ignored,
        }
    }

    pub fn retap_started(&self) -> usize {
        self.guard.begin()
    }

    /// Returns `true` when this call is the one that must run the deferred teardown.
    pub fn retap_finished(&self) -> Result<bool, GuardUnderflow> {
        Ok(self.guard.end()? == RetapRelease::Teardown)
    }

    /// Move to `Closed`. Succeeds once; the caller then removes listeners
    /// and calls `finish_teardown`.
    pub fn enter_closed(&self) -> bool {
        match self.state.get() {
            PanelState::Open | PanelState::ClosePending if !self.guard.is_busy() => {
                self.state.set(PanelState::Closed);
                true
            }
            _ => false,
        }
    }

    pub fn finish_teardown(&self) {
        debug_assert_eq!(self.state.get(), PanelState::Closed);
        debug_assert_eq!(self.guard.depth(), 0);
        self.state.set(PanelState::Destroyed);
    }

    /// Record that the session is closing. `false` if it already was.
    pub fn session_closing(&self) -> bool {
        if self.session.get() != SessionPhase::Open {
            return false;
        }
        self.session.set(SessionPhase::Closing);
        true
    }

    /// Record that the session closed. `false` if already closed.
    pub fn session_closed(&self) -> bool {
        if self.session.get() == SessionPhase::Closed {
            return false;
        }
        self.session.set(SessionPhase::Closed);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_close_tears_down_now() {
        let lc = LifecycleController::new();
        assert_eq!(lc.request_close(), CloseDecision::TeardownNow);
        assert!(lc.enter_closed());
        assert!(!lc.enter_closed());
        lc.finish_teardown();
        assert_eq!(lc.state(), PanelState::Destroyed);
        assert!(lc.state().is_terminal());
        assert_eq!(lc.request_close(), CloseDecision::Ignored);
    }

    #[test]
    fn test_busy_close_goes_pending_then_closed() {
        let lc = LifecycleController::new();
        lc.retap_started();
        assert_eq!(lc.request_close(), CloseDecision::Deferred { depth: 1 });
        assert_eq!(lc.state(), PanelState::ClosePending);
        assert!(lc.state().is_closing());
        assert!(!lc.can_initiate_retap());
        assert!(!lc.enter_closed());

        assert_eq!(lc.request_close(), CloseDecision::Ignored);
        assert_eq!(lc.retap_finished(), Ok(true));
        assert!(lc.enter_closed());
    }

    #[test]
    fn test_session_axis_is_independent() {
        let lc = LifecycleController::new();
        assert!(lc.session_closing());
        assert!(!lc.session_closing());
        assert_eq!(lc.state(), PanelState::Open);
        assert!(!lc.can_initiate_retap());

        assert!(lc.session_closed());
        assert!(!lc.session_closed());
        assert!(!lc.session_closing());
        assert_eq!(lc.session_phase(), SessionPhase::Closed);
        assert_eq!(lc.state(), PanelState::Open);
    }

    #[test]
    fn test_underflow_passes_through() {
        let lc = LifecycleController::new();
        assert_eq!(lc.retap_finished(), Err(GuardUnderflow));
        assert_eq!(lc.retap_depth(), 0);
    }
}
