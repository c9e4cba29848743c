//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Idempotency store unreachable or misbehaving
    #[error("Storage error: {0}")]
    Storage(String),

    /// Search engine unreachable or rejecting writes
    #[error("Search error: {0}")]
    Search(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Check if this error is transient and worth retrying
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Search(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_is_retryable() {
        let err = ApplicationError::Storage("connection refused".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn search_error_is_retryable() {
        let err = ApplicationError::Search("503 from cluster".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn domain_error_is_not_retryable() {
        let err = ApplicationError::Domain(DomainError::invalid("broken envelope"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn internal_error_is_not_retryable() {
        let err = ApplicationError::Internal("unexpected".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn error_messages_are_correct() {
        assert_eq!(
            ApplicationError::Storage("down".to_string()).to_string(),
            "Storage error: down"
        );
        assert_eq!(
            ApplicationError::Search("down".to_string()).to_string(),
            "Search error: down"
        );
    }

    #[test]
    fn domain_error_converts_to_application_error() {
        let domain_err = DomainError::invalid("bad");
        let app_err: ApplicationError = domain_err.into();
        assert!(matches!(app_err, ApplicationError::Domain(_)));
    }
}
