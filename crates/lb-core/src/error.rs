//! Error types for the lake-bridge session bridge

use crate::state::SessionState;
use thiserror::Error;

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("ROM error: {0}")]
    Rom(#[from] RomError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Whether this failure should be shown to the user as a transient
    /// notification.
    ///
    /// Session errors are expected races between host lifecycle and event
    /// delivery; they are logged and dropped instead. A lock timeout is the
    /// exception, the request was lost and the user should know.
    pub fn is_user_visible(&self) -> bool {
        match self {
            Self::Session(SessionError::Timeout(_)) => true,
            Self::Session(_) => false,
            _ => true,
        }
    }

    /// True if the session has been shut down
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Session(SessionError::SessionClosed))
    }
}

/// ROM loading errors
#[derive(Error, Debug)]
pub enum RomError {
    #[error("Invalid ROM image: {0}")]
    Invalid(String),

    #[error("ROM image is empty")]
    Empty,

    #[error("Failed to read '{identifier}': {source}")]
    ReadFailed {
        identifier: String,
        #[source]
        source: std::io::Error,
    },
}

/// Save/load state errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("No ROM is loaded")]
    NoActiveSession,

    #[error("State serialization failed: {0}")]
    SerializationFailed(String),

    #[error("State storage failed: {0}")]
    IoFailed(#[from] std::io::Error),
}

/// Session lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Session is closed")]
    SessionClosed,

    #[error("'{event}' is not accepted in state {state}")]
    IllegalStateTransition {
        event: &'static str,
        state: SessionState,
    },

    #[error("Timed out waiting for '{0}'")]
    Timeout(&'static str),

    #[error("Engine runtime is not initialized")]
    NotInitialized,

    #[error("Engine runtime is already initialized")]
    AlreadyInitialized,

    #[error("Unknown button index {0}")]
    UnknownButton(i32),

    #[error("Invalid pointer coordinates ({x}, {y})")]
    InvalidPointer { x: f32, y: f32 },
}

impl SessionError {
    pub fn illegal(event: &'static str, state: SessionState) -> Self {
        Self::IllegalStateTransition { event, state }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::illegal("set_button", SessionState::SurfaceLost);
        assert_eq!(
            format!("{}", err),
            "'set_button' is not accepted in state SurfaceLost"
        );

        let err = RomError::ReadFailed {
            identifier: "content://x".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(format!("{}", err), "Failed to read 'content://x': gone");
    }

    #[test]
    fn test_error_conversion() {
        let err: BridgeError = RomError::Empty.into();
        assert!(matches!(err, BridgeError::Rom(RomError::Empty)));
        assert!(err.is_user_visible());

        let err: BridgeError = SessionError::SessionClosed.into();
        assert!(err.is_closed());
        assert!(!err.is_user_visible());

        let err: BridgeError = StateError::NoActiveSession.into();
        assert!(err.is_user_visible());
    }

    #[test]
    fn test_lock_timeout_is_user_visible() {
        let err: BridgeError = SessionError::Timeout("save_state").into();
        assert!(err.is_user_visible());
        assert!(!err.is_closed());

        let err: BridgeError = SessionError::illegal("save_state", SessionState::Created).into();
        assert!(!err.is_user_visible());
    }
}
