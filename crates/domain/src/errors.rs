//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// Event payload is structurally invalid and can never be processed
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Event type/version pair this worker does not handle
    #[error("Unsupported event {event:?} with version {version}")]
    UnsupportedEvent { event: String, version: i64 },
}

impl DomainError {
    /// Create an invalid-event error
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidEvent(reason.into())
    }
}
