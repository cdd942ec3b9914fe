// src/bridge.rs
//
// Session -> panel notification forwarding.

use std::cell::Cell;
use std::rc::Weak;

use crate::lifecycle::SessionPhase;
use crate::panel::{Panel, PanelHooks};
use crate::session::{SessionEvent, SessionObserver};

/// Subscribed to the session on the panel's behalf.
///
/// Holds the panel weakly so the subscription never keeps a destroyed panel
/// reachable. Retap notifications become guard begin/end pairs; only retaps
/// whose start this bridge saw are ended, so a panel opened in the middle of
/// a pass does not underflow on that pass's `RetapFinished`.
pub struct SessionEventBridge<H: PanelHooks> {
    panel: Weak<Panel<H>>,
    retaps_in_flight: Cell<usize>,
}

impl<H: PanelHooks> SessionEventBridge<H> {
    pub fn new(panel: Weak<Panel<H>>) -> Self {
        Self {
            panel,
            retaps_in_flight: Cell::new(0),
        }
    }
}

impl<H: PanelHooks> SessionObserver for SessionEventBridge<H> {
    fn on_session_event(&self, event: SessionEvent) {
        let Some(panel) = self.panel.upgrade() else {
            return;
        };

        match event {
            SessionEvent::RetapStarted => {
                self.retaps_in_flight.set(self.retaps_in_flight.get() + 1);
                panel.begin_retap();
            }
            SessionEvent::RetapFinished => {
                let in_flight = self.retaps_in_flight.get();
                if in_flight == 0 {
                    tlog!("[bridge] Ignoring end of a retap that started before this panel subscribed");
                    return;
                }
                self.retaps_in_flight.set(in_flight - 1);
                panel.end_retap();
            }
            SessionEvent::Closing => panel.session_closing(),
            SessionEvent::Closed => {
                if panel.session_phase() == SessionPhase::Open {
                    tlog!("[bridge] Session closed without a closing notice, running closing first");
                    panel.session_closing();
                }
                panel.session_closed();
            }
        }
    }
}
