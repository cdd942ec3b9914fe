// src/registry.rs
//
// Tracks the listeners a panel has registered with its session so they can be
// removed individually or all at once. Holds only a weak reference to the
// session: once the owner drops it, removal degrades to clearing local state.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Instant;

use serde::Serialize;

use crate::error::{RegistrationError, RegistrationFailure};
use crate::session::{CaptureSession, ListenerFlags, ListenerHandle, TapListener};

#[derive(Clone, Debug)]
struct RegisteredListener {
    handle: ListenerHandle,
    tap_name: String,
    filter: String,
    registered_at: Instant,
}

/// Info about a registered listener (for status snapshots)
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListenerInfo {
    pub handle: ListenerHandle,
    pub tap_name: String,
    pub filter: String,
    /// Seconds since registration
    pub registered_seconds_ago: u64,
}

pub struct ListenerRegistry {
    session: Weak<dyn CaptureSession>,
    listeners: RefCell<Vec<RegisteredListener>>,
}

impl ListenerRegistry {
    pub fn new(session: Weak<dyn CaptureSession>) -> Self {
        Self {
            session,
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Register with the session and start tracking the handle.
    pub fn register(
        &self,
        tap_name: &str,
        filter: &str,
        flags: ListenerFlags,
        listener: Rc<dyn TapListener>,
    ) -> Result<ListenerHandle, RegistrationError> {
        let session = self
            .session
            .upgrade()
            .ok_or_else(|| RegistrationError::new(tap_name, RegistrationFailure::SessionGone))?;

        let handle = session.register_listener(tap_name, filter, flags, listener)?;
        self.listeners.borrow_mut().push(RegisteredListener {
            handle,
            tap_name: tap_name.to_string(),
            filter: filter.to_string(),
            registered_at: Instant::now(),
        });
        tlog!(
            "[registry] Registered {} on tap '{}' (filter: '{}', total: {})",
            handle,
            tap_name,
            filter,
            self.len()
        );
        Ok(handle)
    }

    /// Remove one listener. Returns `false` if it was not tracked.
    pub fn remove(&self, handle: ListenerHandle) -> bool {
        let removed = {
            let mut listeners = self.listeners.borrow_mut();
            listeners
                .iter()
                .position(|l| l.handle == handle)
                .map(|pos| listeners.remove(pos))
        };
        let Some(removed) = removed else {
            return false;
        };

        if let Some(session) = self.session.upgrade() {
            session.unregister_listener(removed.handle);
        }
        tlog!(
            "[registry] Removed {} from tap '{}' (remaining: {})",
            removed.handle,
            removed.tap_name,
            self.len()
        );
        true
    }

    /// Remove every tracked listener. Returns how many were removed.
    pub fn remove_all(&self) -> usize {
        // Taken up front: unregistering may re-enter the session and, through it, us.
        let drained: Vec<RegisteredListener> = self.listeners.borrow_mut().drain(..).collect();
        if drained.is_empty() {
            return 0;
        }

        match self.session.upgrade() {
            Some(session) => {
                for listener in &drained {
                    session.unregister_listener(listener.handle);
                }
            }
            None => {
                tlog!(
                    "[registry] Session is gone, dropping {} listener record(s) locally",
                    drained.len()
                );
            }
        }
        tlog!("[registry] Removed all {} listener(s)", drained.len());
        drained.len()
    }

    pub fn contains(&self, handle: ListenerHandle) -> bool {
        self.listeners.borrow().iter().any(|l| l.handle == handle)
    }

    pub fn handles(&self) -> Vec<ListenerHandle> {
        self.listeners.borrow().iter().map(|l| l.handle).collect()
    }

    pub fn infos(&self) -> Vec<ListenerInfo> {
        let now = Instant::now();
        self.listeners
            .borrow()
            .iter()
            .map(|l| ListenerInfo {
                handle: l.handle,
                tap_name: l.tap_name.clone(),
                filter: l.filter.clone(),
                registered_seconds_ago: now.duration_since(l.registered_at).as_secs(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    pub fn session(&self) -> Option<Rc<dyn CaptureSession>> {
        self.session.upgrade()
    }
}
