//! Idempotency port - claim-based deduplication across competing workers

use async_trait::async_trait;

use crate::error::ApplicationError;

/// Outcome of a claim attempt for an `(event_id, resource_key)` pair.
///
/// `New` is never persisted; it is the signal that the caller just won the
/// claim and owns processing of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyStatus {
    /// The caller inserted the claim and owns processing
    New,
    /// Some worker (possibly the caller, on a crashed run) holds the claim
    InProgress,
    /// The event was fully processed before; terminal
    Completed,
}

/// Port for the persistent idempotency store.
///
/// Implementations must be safe under concurrent invocation from any number
/// of worker processes: at most one caller may ever observe `New` for a
/// given key.
#[async_trait]
pub trait IdempotencyPort: Send + Sync {
    /// Check the current status and claim the key when it is unknown.
    async fn check_and_claim(
        &self,
        event_id: &str,
        resource_key: &str,
    ) -> Result<IdempotencyStatus, ApplicationError>;

    /// Transition the key to completed. Idempotent; completed is terminal.
    async fn mark_completed(
        &self,
        event_id: &str,
        resource_key: &str,
    ) -> Result<(), ApplicationError>;

    /// Release the claim so a later delivery can retry the event.
    async fn mark_failed(
        &self,
        event_id: &str,
        resource_key: &str,
    ) -> Result<(), ApplicationError>;
}
