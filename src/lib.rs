//! Base panel for analysis views over a shared capture session.
//!
//! A panel registers tap listeners with a [`CaptureSession`], asks it to
//! retap, and may be closed by the user at any moment, including from inside
//! a retap callback. The retap guard defers teardown until the outermost retap
//! unwinds, so listener removal and destruction happen exactly once, in order.
//!
//! Concrete panels implement [`PanelHooks`] and hold their panel through
//! `Weak` references. [`BufferSession`] is a small in-memory session for
//! wiring things up without a capture engine.

#[macro_use]
mod logging;

pub mod bridge;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod panel;
pub mod registry;
pub mod session;
pub mod settings;

pub use bridge::SessionEventBridge;
pub use error::{GuardUnderflow, PanelError, RegistrationError, RegistrationFailure, SettingsError};
pub use guard::{CloseRequest, RetapGuard, RetapRelease};
pub use lifecycle::{CloseDecision, LifecycleController, PanelState, SessionPhase};
pub use logging::{file_logging_active, init_file_logging, stop_file_logging};
pub use panel::{Panel, PanelHooks, PanelStatus, RetapScope};
pub use registry::{ListenerInfo, ListenerRegistry};
pub use session::{
    BufferSession, CaptureRecord, CaptureSession, ListenerFlags, ListenerHandle, RecordFilter,
    SessionEvent, SessionObserver, SubscriptionId, TapListener, TapPacketStatus,
};
pub use settings::PanelSettings;
