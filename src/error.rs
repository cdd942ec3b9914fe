//! Error types for the panel core.

use thiserror::Error;

/// Why a session refused a listener registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationFailure {
    /// The session does not know a tap with this name
    UnknownTap,
    /// The display filter did not parse
    InvalidFilter(String),
    /// The same listener is already attached to this tap
    DuplicateListener,
    /// The session is closing or closed
    SessionClosed,
    /// The session has been dropped by its owner
    SessionGone,
}

impl std::fmt::Display for RegistrationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTap => write!(f, "no such tap"),
            Self::InvalidFilter(msg) => write!(f, "invalid filter: {}", msg),
            Self::DuplicateListener => write!(f, "listener is already registered"),
            Self::SessionClosed => write!(f, "capture session is closed"),
            Self::SessionGone => write!(f, "capture session no longer exists"),
        }
    }
}

/// A listener failed to register. Recoverable: the panel keeps running
/// with whatever listeners did attach.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to attach to tap \"{tap_name}\": {reason}")]
pub struct RegistrationError {
    pub tap_name: String,
    pub reason: RegistrationFailure,
}

impl RegistrationError {
    pub fn new(tap_name: impl Into<String>, reason: RegistrationFailure) -> Self {
        Self {
            tap_name: tap_name.into(),
            reason,
        }
    }
}

/// `end()` was called more times than `begin()`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("retap guard underflow: end() without a matching begin()")]
pub struct GuardUnderflow;

/// A user-initiated operation the panel refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelError {
    /// Teardown already ran
    #[error("panel has been destroyed")]
    Destroyed,

    /// The user closed the panel; in-flight retaps may finish but no new ones start
    #[error("panel was closed by the user")]
    ClosedByUser,

    /// The backing session is closing, closed or gone
    #[error("capture session is closed")]
    SessionClosed,
}

/// Errors loading panel settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_error_message_names_tap() {
        let err = RegistrationError::new(
            "can",
            RegistrationFailure::InvalidFilter("unknown field 'foo'".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Failed to attach to tap \"can\": invalid filter: unknown field 'foo'"
        );
    }

    #[test]
    fn test_panel_error_messages() {
        assert_eq!(PanelError::ClosedByUser.to_string(), "panel was closed by the user");
        assert_eq!(PanelError::SessionClosed.to_string(), "capture session is closed");
    }
}
