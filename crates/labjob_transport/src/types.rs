use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Client could not be built (bad base URL, TLS setup).
    Setup,
    /// `POST /submit` was rejected or the backend was unreachable.
    Submission,
    /// `GET /cancel/{id}` was rejected or the backend was unreachable.
    Cancellation,
    /// The progress stream failed, dropped, or delivered a malformed payload.
    Stream,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Setup => write!(f, "setup"),
            TransportErrorKind::Submission => write!(f, "submission"),
            TransportErrorKind::Cancellation => write!(f, "cancellation"),
            TransportErrorKind::Stream => write!(f, "stream"),
        }
    }
}

/// A transport failure. `Display` is the human-readable message only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn submission(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Submission, message)
    }

    pub fn cancellation(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Cancellation, message)
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Stream, message)
    }
}
