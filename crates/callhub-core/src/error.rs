//! Unified application error types for CallHub.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Call-domain failures carry their own
//! [`ErrorKind`] so the transport layer can report them to the initiating
//! client with a stable code.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// An internal server error occurred.
    Internal,
    /// A database error occurred.
    Database,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// The service is temporarily unavailable.
    ServiceUnavailable,
    /// The caller already holds an active call.
    AlreadyInCall,
    /// The acceptor is a party to a different active call.
    AlreadyInOtherCall,
    /// Every invited participant is busy in another call.
    AllBusy,
    /// The referenced call does not exist.
    CallNotFound,
    /// The user is not an invited participant of the call.
    NotParticipant,
    /// The requested status change is not allowed by the call state machine.
    InvalidTransition,
    /// Local media capture failed (client-side only).
    MediaUnavailable,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::Internal => "INTERNAL",
            Self::Database => "DATABASE",
            Self::Configuration => "CONFIGURATION",
            Self::Serialization => "SERIALIZATION",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::AlreadyInCall => "ALREADY_IN_CALL",
            Self::AlreadyInOtherCall => "ALREADY_IN_OTHER_CALL",
            Self::AllBusy => "ALL_BUSY",
            Self::CallNotFound => "CALL_NOT_FOUND",
            Self::NotParticipant => "NOT_PARTICIPANT",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::MediaUnavailable => "MEDIA_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The unified application error used throughout CallHub.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// The caller is already a party to an active call.
    pub fn already_in_call() -> Self {
        Self::new(ErrorKind::AlreadyInCall, "You are already in a call")
    }

    /// The user is a party to a different active call.
    pub fn already_in_other_call() -> Self {
        Self::new(ErrorKind::AlreadyInOtherCall, "You are already in another call")
    }

    /// Every invited participant is busy.
    pub fn all_busy() -> Self {
        Self::new(ErrorKind::AllBusy, "All participants are busy")
    }

    /// No call exists with the given identifier.
    pub fn call_not_found(call_id: impl fmt::Display) -> Self {
        Self::new(ErrorKind::CallNotFound, format!("Call {call_id} not found"))
    }

    /// The user was not invited to the call.
    pub fn not_participant(user_id: impl fmt::Display, call_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::NotParticipant,
            format!("User {user_id} is not a participant of call {call_id}"),
        )
    }

    /// A call status change violated the transition table.
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidTransition, message)
    }

    /// Local media capture failed.
    pub fn media_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MediaUnavailable, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::with_source(ErrorKind::Validation, format!("Invalid request: {err}"), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_code() {
        let err = AppError::already_in_call();
        assert_eq!(err.to_string(), "ALREADY_IN_CALL: You are already in a call");
    }

    #[test]
    fn test_clone_drops_source() {
        let io = std::io::Error::other("boom");
        let err = AppError::from(io);
        assert!(err.source.is_some());
        let cloned = err.clone();
        assert!(cloned.source.is_none());
        assert_eq!(cloned.kind, ErrorKind::Internal);
    }
}
