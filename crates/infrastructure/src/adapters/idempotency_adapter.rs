//! Idempotency adapter - Implements IdempotencyPort over Postgres
//!
//! Postgres is the single source of truth. The read in `check_and_claim` is
//! only a fast path; correctness rests on the atomic unique-key insert, so
//! the protocol stays safe no matter how the read and insert interleave
//! across workers.

use application::error::ApplicationError;
use application::ports::{IdempotencyPort, IdempotencyStatus};
use async_trait::async_trait;
use tracing::instrument;

use crate::persistence::{
    ClaimInsert, IdempotencyStoreError, KeyStatus, PgIdempotencyRepository,
};

/// Adapter mapping claim outcomes onto the shared Postgres table
#[derive(Debug, Clone)]
pub struct PostgresIdempotencyAdapter {
    repo: PgIdempotencyRepository,
}

impl PostgresIdempotencyAdapter {
    /// Create a new adapter over the given repository
    #[must_use]
    pub const fn new(repo: PgIdempotencyRepository) -> Self {
        Self { repo }
    }

    /// Map store errors onto the retryable storage class
    fn map_error(err: IdempotencyStoreError) -> ApplicationError {
        ApplicationError::Storage(err.to_string())
    }
}

#[async_trait]
impl IdempotencyPort for PostgresIdempotencyAdapter {
    #[instrument(skip(self))]
    async fn check_and_claim(
        &self,
        event_id: &str,
        resource_key: &str,
    ) -> Result<IdempotencyStatus, ApplicationError> {
        if let Some(record) = self
            .repo
            .get(event_id, resource_key)
            .await
            .map_err(Self::map_error)?
        {
            return Ok(match record.status {
                KeyStatus::Completed => IdempotencyStatus::Completed,
                KeyStatus::InProgress => IdempotencyStatus::InProgress,
            });
        }

        match self
            .repo
            .insert_in_progress(event_id, resource_key)
            .await
            .map_err(Self::map_error)?
        {
            ClaimInsert::Inserted => Ok(IdempotencyStatus::New),
            // Another worker claimed between our read and insert
            ClaimInsert::AlreadyClaimed => Ok(IdempotencyStatus::InProgress),
        }
    }

    #[instrument(skip(self))]
    async fn mark_completed(
        &self,
        event_id: &str,
        resource_key: &str,
    ) -> Result<(), ApplicationError> {
        self.repo
            .update_status(event_id, resource_key, KeyStatus::Completed)
            .await
            .map_err(Self::map_error)
    }

    #[instrument(skip(self))]
    async fn mark_failed(
        &self,
        event_id: &str,
        resource_key: &str,
    ) -> Result<(), ApplicationError> {
        // Plain delete; the race with a re-claimed key costs at most one
        // retry attempt
        self.repo
            .delete(event_id, resource_key)
            .await
            .map_err(Self::map_error)
    }
}
