// src/session/mod.rs
//
// The capture-session collaborator: the interface the panel core consumes,
// plus the listener and event types that cross it.

pub mod buffer;
pub mod filter;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::RegistrationError;

pub use buffer::BufferSession;
pub use filter::RecordFilter;

/// One captured record as seen by tap listeners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// 1-based position in the capture
    pub number: u64,
    pub protocol: String, // e.g., "can", "modbus", "serial"
    /// Host UNIX timestamp in microseconds.
    pub timestamp_us: u64,
    pub frame_id: u32,
    pub bus: u8,
    pub bytes: Vec<u8>,
}

/// Opaque token for one listener registration with a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Registration flags passed through to the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ListenerFlags(u32);

impl ListenerFlags {
    pub const NONE: Self = Self(0);
    /// Call `draw` at the end of every retap, even if no packet asked for a redraw
    pub const ALWAYS_DRAW: Self = Self(1 << 0);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for ListenerFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// What a listener wants after seeing one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapPacketStatus {
    /// Nothing visible changed
    DontRedraw,
    /// `draw` should run at the end of the pass
    Redraw,
    /// The record could not be processed; the pass continues
    Failed,
}

/// The reset/packet/draw callback triple a session invokes during a retap.
///
/// Callbacks run synchronously inside `CaptureSession::retap` and may call
/// back into the panel (or the session) before returning.
pub trait TapListener {
    fn reset(&self) {}

    fn packet(&self, record: &CaptureRecord) -> TapPacketStatus;

    fn draw(&self) {}
}

/// Notifications a session pushes to its subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    /// A retap pass is about to call listeners
    RetapStarted,
    /// The retap pass returned
    RetapFinished,
    /// The session is about to close and is still valid
    Closing,
    /// The session has closed and must no longer be used for tapping
    Closed,
}

/// Receiver side of session notifications.
pub trait SessionObserver {
    fn on_session_event(&self, event: SessionEvent);
}

/// Identifies one `subscribe` call so it can be undone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// A shared, externally owned capture session.
///
/// Everything here runs on one thread. Implementations must not hold internal
/// borrows while invoking listeners or observers: both are allowed to call back
/// into the session.
pub trait CaptureSession {
    /// Short display name, typically the capture file name
    fn title(&self) -> String;

    /// True once the session has started closing
    fn is_closed(&self) -> bool;

    fn register_listener(
        &self,
        tap_name: &str,
        filter: &str,
        flags: ListenerFlags,
        listener: Rc<dyn TapListener>,
    ) -> Result<ListenerHandle, RegistrationError>;

    /// No-op for unknown or already removed handles.
    fn unregister_listener(&self, handle: ListenerHandle);

    fn subscribe(&self, observer: Rc<dyn SessionObserver>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);

    /// Re-run every registered listener over the captured records.
    fn retap(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_contains() {
        let flags = ListenerFlags::NONE | ListenerFlags::ALWAYS_DRAW;
        assert!(flags.contains(ListenerFlags::ALWAYS_DRAW));
        assert!(flags.contains(ListenerFlags::NONE));
        assert!(!ListenerFlags::NONE.contains(ListenerFlags::ALWAYS_DRAW));
        assert_eq!(flags.bits(), 1);
    }

    #[test]
    fn test_session_event_serializes_snake_case() {
        let json = serde_json::to_string(&SessionEvent::RetapStarted).unwrap();
        assert_eq!(json, "\"retap_started\"");
    }
}
