// src/session/buffer.rs
//
// In-memory capture session. Holds records in a Vec and replays them to
// registered tap listeners on retap. Everything is synchronous; listener and
// observer lists are snapshotted before dispatch so callbacks can re-enter.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{
    CaptureRecord, CaptureSession, ListenerFlags, ListenerHandle, RecordFilter, SessionEvent,
    SessionObserver, SubscriptionId, TapListener, TapPacketStatus,
};
use crate::error::{RegistrationError, RegistrationFailure};

/// Tap that sees every record regardless of protocol
pub const FRAME_TAP: &str = "frame";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Open,
    Closing,
    Closed,
}

struct TapEntry {
    handle: ListenerHandle,
    tap_name: String,
    filter: RecordFilter,
    flags: ListenerFlags,
    listener: Rc<dyn TapListener>,
    /// Cleared on unregister so a pass in progress skips the entry
    active: Cell<bool>,
}

impl TapEntry {
    fn wants(&self, record: &CaptureRecord) -> bool {
        (self.tap_name == FRAME_TAP || self.tap_name == record.protocol) && self.filter.matches(record)
    }
}

pub struct BufferSession {
    title: String,
    taps: Vec<String>,
    records: RefCell<Vec<CaptureRecord>>,
    listeners: RefCell<Vec<Rc<TapEntry>>>,
    observers: RefCell<Vec<(SubscriptionId, Rc<dyn SessionObserver>)>>,
    next_id: Cell<u64>,
    phase: Cell<Phase>,
    retap_count: Cell<u64>,
}

impl BufferSession {
    /// Create an open session named `title` that knows the given taps.
    /// The `"frame"` tap is always available.
    pub fn new(title: impl Into<String>, taps: &[&str]) -> Self {
        let mut known: Vec<String> = vec![FRAME_TAP.to_string()];
        for tap in taps {
            if !known.iter().any(|t| t == tap) {
                known.push(tap.to_string());
            }
        }
        Self {
            title: title.into(),
            taps: known,
            records: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            phase: Cell::new(Phase::Open),
            retap_count: Cell::new(0),
        }
    }

    /// Append a record, numbering it after the existing ones.
    /// Ignored once the session is closing.
    pub fn push_record(&self, protocol: &str, timestamp_us: u64, frame_id: u32, bus: u8, bytes: &[u8]) {
        if self.phase.get() != Phase::Open {
            return;
        }
        let mut records = self.records.borrow_mut();
        let number = records.len() as u64 + 1;
        records.push(CaptureRecord {
            number,
            protocol: protocol.to_string(),
            timestamp_us,
            frame_id,
            bus,
            bytes: bytes.to_vec(),
        });
    }

    pub fn record_count(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    pub fn is_registered(&self, handle: ListenerHandle) -> bool {
        self.listeners.borrow().iter().any(|e| e.handle == handle)
    }

    /// Number of retap passes run so far.
    pub fn retap_count(&self) -> u64 {
        self.retap_count.get()
    }

    /// Close the session: `Closing`, drop listeners and records, `Closed`.
    /// Later calls do nothing.
    pub fn close(&self) {
        if self.phase.get() != Phase::Open {
            return;
        }
        tlog!("[session] '{}' closing", self.title);
        self.phase.set(Phase::Closing);
        self.broadcast(SessionEvent::Closing);

        let leftover: Vec<Rc<TapEntry>> = self.listeners.borrow_mut().drain(..).collect();
        for entry in &leftover {
            entry.active.set(false);
        }
        if !leftover.is_empty() {
            tlog!(
                "[session] '{}' dropped {} listener(s) still registered at close",
                self.title,
                leftover.len()
            );
        }
        self.records.borrow_mut().clear();

        self.phase.set(Phase::Closed);
        self.broadcast(SessionEvent::Closed);
        tlog!("[session] '{}' closed", self.title);
    }

    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn broadcast(&self, event: SessionEvent) {
        let observers: Vec<Rc<dyn SessionObserver>> =
            self.observers.borrow().iter().map(|(_, o)| o.clone()).collect();
        for observer in observers {
            observer.on_session_event(event);
        }
    }
}

impl CaptureSession for BufferSession {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn is_closed(&self) -> bool {
        self.phase.get() != Phase::Open
    }

    fn register_listener(
        &self,
        tap_name: &str,
        filter: &str,
        flags: ListenerFlags,
        listener: Rc<dyn TapListener>,
    ) -> Result<ListenerHandle, RegistrationError> {
        if self.is_closed() {
            return Err(RegistrationError::new(tap_name, RegistrationFailure::SessionClosed));
        }
        if !self.taps.iter().any(|t| t == tap_name) {
            return Err(RegistrationError::new(tap_name, RegistrationFailure::UnknownTap));
        }
        let filter = RecordFilter::parse(filter)
            .map_err(|msg| RegistrationError::new(tap_name, RegistrationFailure::InvalidFilter(msg)))?;

        let duplicate = self
            .listeners
            .borrow()
            .iter()
            .any(|e| e.tap_name == tap_name && Rc::ptr_eq(&e.listener, &listener));
        if duplicate {
            return Err(RegistrationError::new(tap_name, RegistrationFailure::DuplicateListener));
        }

        let handle = ListenerHandle::new(self.allocate_id());
        self.listeners.borrow_mut().push(Rc::new(TapEntry {
            handle,
            tap_name: tap_name.to_string(),
            filter,
            flags,
            listener,
            active: Cell::new(true),
        }));
        Ok(handle)
    }

    fn unregister_listener(&self, handle: ListenerHandle) {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(pos) = listeners.iter().position(|e| e.handle == handle) {
            let entry = listeners.remove(pos);
            entry.active.set(false);
        }
    }

    fn subscribe(&self, observer: Rc<dyn SessionObserver>) -> SubscriptionId {
        let id = SubscriptionId::new(self.allocate_id());
        self.observers.borrow_mut().push((id, observer));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.observers.borrow_mut().retain(|(sid, _)| *sid != id);
    }

    fn retap(&self) {
        if self.is_closed() {
            tlog!("[session] '{}' retap ignored, session is closed", self.title);
            return;
        }
        self.retap_count.set(self.retap_count.get() + 1);
        self.broadcast(SessionEvent::RetapStarted);

        let entries: Vec<Rc<TapEntry>> = self.listeners.borrow().clone();
        let records: Vec<CaptureRecord> = self.records.borrow().clone();
        let mut redraw = vec![false; entries.len()];

        for entry in &entries {
            if entry.active.get() {
                entry.listener.reset();
            }
        }
        for record in &records {
            for (i, entry) in entries.iter().enumerate() {
                if !entry.active.get() || !entry.wants(record) {
                    continue;
                }
                match entry.listener.packet(record) {
                    TapPacketStatus::Redraw => redraw[i] = true,
                    TapPacketStatus::DontRedraw => {}
                    TapPacketStatus::Failed => {
                        tlog!(
                            "[session] {} on tap '{}' failed on record {}",
                            entry.handle,
                            entry.tap_name,
                            record.number
                        );
                    }
                }
            }
        }
        for (i, entry) in entries.iter().enumerate() {
            if entry.active.get() && (redraw[i] || entry.flags.contains(ListenerFlags::ALWAYS_DRAW)) {
                entry.listener.draw();
            }
        }

        self.broadcast(SessionEvent::RetapFinished);
    }
}
