// src/panel.rs
//
// Base panel over a capture session.
//
// A panel destroys itself when the user closes it. Doing this safely while
// retap callbacks are running is the job of the retap guard: a close that
// arrives mid-retap is recorded and carried out by the `end_retap` that brings
// the depth back to zero.
//
// Ownership: `Panel::open` returns an `Rc`, and the panel also holds a strong
// reference to itself until teardown. Teardown removes every listener, drops
// the session subscription, runs `on_destroyed` and releases that
// self-reference. Callers that keep their own `Rc` past teardown see a panel in
// the terminal `Destroyed` state on which every operation is a no-op.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;

use crate::bridge::SessionEventBridge;
use crate::error::PanelError;
use crate::lifecycle::{CloseDecision, LifecycleController, PanelState, SessionPhase};
use crate::registry::{ListenerInfo, ListenerRegistry};
use crate::session::{CaptureSession, ListenerFlags, ListenerHandle, SubscriptionId, TapListener};
use crate::settings::PanelSettings;

/// Customisation points for a concrete panel. Every method defaults to a no-op
/// (warnings default to the log).
///
/// Hooks get `&self` only; keep mutable state behind `Cell`/`RefCell`. Hooks
/// and tap listeners must hold the panel through `Weak`, never `Rc`, or the
/// panel outlives its teardown.
pub trait PanelHooks: Sized + 'static {
    /// The user confirmed the panel (OK / Close button).
    fn on_accept(&self, _panel: &Panel<Self>) {}

    /// The user dismissed the panel (Escape / window close).
    fn on_reject(&self, _panel: &Panel<Self>) {}

    /// The session is about to close. Listeners have already been removed;
    /// detach anything else that depends on the session.
    fn on_session_closing(&self, _panel: &Panel<Self>) {}

    /// The session has closed. Enable or disable controls to match.
    fn on_session_closed(&self, _panel: &Panel<Self>) {}

    /// Runs after every lifecycle-relevant event, after the window title is updated.
    fn refresh_presentation(&self, _panel: &Panel<Self>) {}

    /// Surface a recoverable problem to the user.
    fn show_warning(&self, panel: &Panel<Self>, title: &str, message: &str) {
        tlog!("[panel] '{}' warning: {}: {}", panel.label(), title, message);
    }

    /// Last step of teardown. Listeners are gone; the panel is still `Closed`.
    fn on_destroyed(&self, _panel: &Panel<Self>) {}
}

/// A panel with no customisation.
impl PanelHooks for () {}

/// Point-in-time view of a panel (for diagnostics)
#[derive(Clone, Debug, Serialize)]
pub struct PanelStatus {
    pub subtitle: String,
    pub window_title: String,
    pub state: PanelState,
    pub session_phase: SessionPhase,
    pub retap_depth: usize,
    pub closed_by_user: bool,
    pub session_closed: bool,
    pub listeners: Vec<ListenerInfo>,
}

pub struct Panel<H: PanelHooks> {
    hooks: H,
    settings: PanelSettings,
    subtitle: RefCell<String>,
    window_title: RefCell<String>,
    lifecycle: LifecycleController,
    registry: ListenerRegistry,
    subscription: Cell<Option<SubscriptionId>>,
    /// The panel's own strong reference. Taken exactly once, by teardown.
    keep_alive: RefCell<Option<Rc<Self>>>,
}

impl<H: PanelHooks> Panel<H> {
    /// Open a panel on `session` and subscribe it to session notifications.
    pub fn open(session: &Rc<dyn CaptureSession>, hooks: H, settings: PanelSettings) -> Rc<Self> {
        let panel = Rc::new(Self {
            hooks,
            settings,
            subtitle: RefCell::new(String::new()),
            window_title: RefCell::new(String::new()),
            lifecycle: LifecycleController::new(),
            registry: ListenerRegistry::new(Rc::downgrade(session)),
            subscription: Cell::new(None),
            keep_alive: RefCell::new(None),
        });

        let bridge = Rc::new(SessionEventBridge::new(Rc::downgrade(&panel)));
        panel.subscription.set(Some(session.subscribe(bridge)));
        *panel.keep_alive.borrow_mut() = Some(panel.clone());

        if session.is_closed() {
            panel.lifecycle.session_closing();
            panel.lifecycle.session_closed();
        }
        panel.update_window_title();

        tlog!(
            "[panel] Opened panel on session '{}'{}",
            session.title(),
            if session.is_closed() { " (session already closed)" } else { "" }
        );
        panel
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn settings(&self) -> &PanelSettings {
        &self.settings
    }

    /// The session, if its owner still holds it.
    pub fn session(&self) -> Option<Rc<dyn CaptureSession>> {
        self.registry.session()
    }

    // ------------------------------------------------------------------
    // Title
    // ------------------------------------------------------------------

    /// Set the subtitle, e.g. "Bus Load". It should be short, unique and descriptive.
    pub fn set_subtitle(&self, subtitle: impl Into<String>) {
        *self.subtitle.borrow_mut() = subtitle.into();
        self.update_window_title();
    }

    pub fn subtitle(&self) -> String {
        self.subtitle.borrow().clone()
    }

    pub fn window_title(&self) -> String {
        self.window_title.borrow().clone()
    }

    fn update_window_title(&self) {
        let mut parts: Vec<String> = Vec::new();
        let subtitle = self.subtitle();
        if !subtitle.is_empty() {
            parts.push(subtitle);
        }
        if self.lifecycle.session_phase() != SessionPhase::Closed {
            if let Some(session) = self.session() {
                let file_title = session.title();
                if !file_title.is_empty() {
                    parts.push(file_title);
                }
            }
        }
        parts.push(self.settings.app_name.clone());
        *self.window_title.borrow_mut() = parts.join(&self.settings.title_separator);
    }

    fn label(&self) -> String {
        let subtitle = self.subtitle.borrow();
        if subtitle.is_empty() {
            "<untitled>".to_string()
        } else {
            subtitle.clone()
        }
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn state(&self) -> PanelState {
        self.lifecycle.state()
    }

    pub fn session_phase(&self) -> SessionPhase {
        self.lifecycle.session_phase()
    }

    pub fn retap_depth(&self) -> usize {
        self.lifecycle.retap_depth()
    }

    /// True once the user has closed the panel, even if teardown is still pending.
    pub fn is_closed_by_user(&self) -> bool {
        self.state().is_closing()
    }

    /// True from the session's "closing" notification onwards.
    pub fn is_session_closed(&self) -> bool {
        self.session_phase() != SessionPhase::Open
    }

    pub fn is_destroyed(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn status(&self) -> PanelStatus {
        PanelStatus {
            subtitle: self.subtitle(),
            window_title: self.window_title(),
            state: self.state(),
            session_phase: self.session_phase(),
            retap_depth: self.retap_depth(),
            closed_by_user: self.is_closed_by_user(),
            session_closed: self.is_session_closed(),
            listeners: self.registry.infos(),
        }
    }

    pub fn status_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.status())
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Register a tap listener that will be removed automatically at teardown.
    ///
    /// On failure the user is warned once through `show_warning` and `None` is
    /// returned; listeners registered earlier are unaffected.
    pub fn register_tap_listener(
        &self,
        tap_name: &str,
        filter: &str,
        flags: ListenerFlags,
        listener: Rc<dyn TapListener>,
    ) -> Option<ListenerHandle> {
        if matches!(self.state(), PanelState::Closed | PanelState::Destroyed) {
            tlog!(
                "[panel] '{}' not registering tap '{}' during or after teardown",
                self.label(),
                tap_name
            );
            return None;
        }
        match self.registry.register(tap_name, filter, flags, listener) {
            Ok(handle) => Some(handle),
            Err(err) => {
                tlog!("[panel] '{}' {}", self.label(), err);
                let title = format!("Failed to attach to tap \"{}\"", err.tap_name);
                self.hooks.show_warning(self, &title, &err.reason.to_string());
                None
            }
        }
    }

    /// Remove one listener. `false` if it was not registered through this panel.
    pub fn remove_tap_listener(&self, handle: ListenerHandle) -> bool {
        self.registry.remove(handle)
    }

    /// Remove every listener registered through this panel.
    pub fn remove_tap_listeners(&self) -> usize {
        self.registry.remove_all()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    pub fn listener_handles(&self) -> Vec<ListenerHandle> {
        self.registry.handles()
    }

    // ------------------------------------------------------------------
    // Retapping
    // ------------------------------------------------------------------

    /// Mark the start of code that retaps or that touches panel state after
    /// tapping. A close that arrives before the matching `end_retap` is deferred.
    ///
    /// Called automatically when the session starts a retap.
    pub fn begin_retap(&self) -> usize {
        if matches!(self.state(), PanelState::Closed | PanelState::Destroyed) {
            tlog!("[panel] '{}' begin_retap during or after teardown ignored", self.label());
            return 0;
        }
        self.lifecycle.retap_started()
    }

    /// Mark the end of a `begin_retap` block. If the user closed the panel in
    /// the meantime and this is the outermost block, the panel is torn down here.
    ///
    /// # Panics
    ///
    /// In debug builds, when called without a matching `begin_retap`.
    pub fn end_retap(&self) {
        // Closed is only entered at depth zero and begin_retap refuses from then on.
        if matches!(self.state(), PanelState::Closed | PanelState::Destroyed) {
            tlog!("[panel] '{}' end_retap during or after teardown ignored", self.label());
            return;
        }
        match self.lifecycle.retap_finished() {
            Ok(true) => {
                tlog!("[panel] '{}' last retap finished, running deferred close", self.label());
                self.teardown();
            }
            Ok(false) => {}
            Err(err) => {
                tlog!("[panel] '{}' {}", self.label(), err);
                if cfg!(debug_assertions) {
                    panic!("{}", err);
                }
            }
        }
    }

    /// `begin_retap` now, `end_retap` when the scope is dropped.
    pub fn retap_scope(&self) -> RetapScope<'_, H> {
        self.begin_retap();
        RetapScope { panel: self }
    }

    /// Ask the session to retap. Refused once the user has closed the panel or
    /// the session is closing; a retap already running is unaffected.
    pub fn retap(&self) -> Result<(), PanelError> {
        match self.state() {
            PanelState::Destroyed => return Err(PanelError::Destroyed),
            PanelState::ClosePending | PanelState::Closed => return Err(PanelError::ClosedByUser),
            PanelState::Open => {}
        }
        if !self.lifecycle.can_initiate_retap() {
            return Err(PanelError::SessionClosed);
        }
        let session = self.session().ok_or(PanelError::SessionClosed)?;
        if session.is_closed() {
            return Err(PanelError::SessionClosed);
        }

        let _scope = self.retap_scope();
        session.retap();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Closing
    // ------------------------------------------------------------------

    /// User confirmed the panel.
    pub fn accept(&self) {
        if self.state() != PanelState::Open {
            return;
        }
        self.hooks.on_accept(self);
        self.request_close("accepted");
    }

    /// User dismissed the panel.
    pub fn reject(&self) {
        if self.state() != PanelState::Open {
            return;
        }
        self.hooks.on_reject(self);
        self.request_close("rejected");
    }

    fn request_close(&self, how: &str) {
        match self.lifecycle.request_close() {
            CloseDecision::TeardownNow => {
                tlog!("[panel] '{}' {}, closing now", self.label(), how);
                self.teardown();
            }
            CloseDecision::Deferred { depth } => {
                tlog!(
                    "[panel] '{}' {} during retap (depth {}), close deferred",
                    self.label(),
                    how,
                    depth
                );
            }
            CloseDecision::Ignored => {}
        }
    }

    fn teardown(&self) {
        if !self.lifecycle.enter_closed() {
            return;
        }

        let removed = self.registry.remove_all();
        if let Some(id) = self.subscription.take() {
            if let Some(session) = self.session() {
                session.unsubscribe(id);
            }
        }
        self.hooks.on_destroyed(self);
        self.lifecycle.finish_teardown();
        tlog!(
            "[panel] '{}' destroyed ({} listener(s) removed)",
            self.label(),
            removed
        );

        let keep_alive = self.keep_alive.borrow_mut().take();
        drop(keep_alive);
    }

    // ------------------------------------------------------------------
    // Session notifications (via SessionEventBridge)
    // ------------------------------------------------------------------

    pub(crate) fn session_closing(&self) {
        if self.is_destroyed() || !self.lifecycle.session_closing() {
            return;
        }
        tlog!("[panel] '{}' session closing", self.label());
        self.registry.remove_all();
        self.hooks.on_session_closing(self);
        self.refresh();
    }

    pub(crate) fn session_closed(&self) {
        if self.is_destroyed() || !self.lifecycle.session_closed() {
            return;
        }
        tlog!("[panel] '{}' session closed", self.label());
        self.hooks.on_session_closed(self);
        self.refresh();
    }

    /// Recompute the window title, then run `refresh_presentation`.
    pub fn refresh(&self) {
        if self.is_destroyed() {
            return;
        }
        self.update_window_title();
        self.hooks.refresh_presentation(self);
    }
}

/// Keeps a retap bracket open for its lifetime. See `Panel::retap_scope`.
#[must_use = "the retap ends as soon as the scope is dropped"]
pub struct RetapScope<'a, H: PanelHooks> {
    panel: &'a Panel<H>,
}

impl<H: PanelHooks> Drop for RetapScope<'_, H> {
    fn drop(&mut self) {
        self.panel.end_retap();
    }
}
