//! Postgres repository for the `idempotency_keys` relation
//!
//! The table is an external contract shared with other services; the worker
//! neither creates nor migrates it:
//!
//! ```sql
//! CREATE TABLE idempotency_keys (
//!     idempotency_key TEXT NOT NULL,
//!     resource_path   TEXT NOT NULL,
//!     status          TEXT NOT NULL,
//!     UNIQUE (idempotency_key, resource_path)
//! );
//! ```
//!
//! The unique composite key is what makes claims race-safe: of N concurrent
//! inserts for the same pair exactly one succeeds, and the losers see a
//! unique violation rather than a second claim.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::{debug, instrument};

/// Error type for idempotency store operations
#[derive(Debug, Error)]
pub enum IdempotencyStoreError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Row carries a status string this worker does not know
    #[error("Unknown idempotency status: {0}")]
    UnknownStatus(String),
}

/// Persisted status values. A successful claim is reported to callers as
/// "new" but stored as `IN_PROGRESS`; `NEW` never reaches the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    InProgress,
    Completed,
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl std::str::FromStr for KeyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(format!("Unknown status: {s}")),
        }
    }
}

/// One row of the `idempotency_keys` relation
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub idempotency_key: String,
    pub resource_path: String,
    pub status: KeyStatus,
}

/// Result of attempting to insert a claim row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimInsert {
    /// The row was inserted; the caller owns the claim
    Inserted,
    /// Another worker inserted the row first
    AlreadyClaimed,
}

/// Connect a pool to the idempotency database, failing fast when the server
/// is unreachable.
pub async fn connect_pool(url: &str) -> Result<PgPool, IdempotencyStoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Repository over the shared `idempotency_keys` table
#[derive(Clone)]
pub struct PgIdempotencyRepository {
    pool: PgPool,
}

impl std::fmt::Debug for PgIdempotencyRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgIdempotencyRepository")
            .finish_non_exhaustive()
    }
}

impl PgIdempotencyRepository {
    /// Create a repository over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a record by composite key
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        idempotency_key: &str,
        resource_path: &str,
    ) -> Result<Option<IdempotencyRecord>, IdempotencyStoreError> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT idempotency_key, resource_path, status
             FROM idempotency_keys
             WHERE idempotency_key = $1 AND resource_path = $2",
        )
        .bind(idempotency_key)
        .bind(resource_path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(idempotency_key, resource_path, status)| {
            let status = status
                .parse()
                .map_err(IdempotencyStoreError::UnknownStatus)?;
            Ok(IdempotencyRecord {
                idempotency_key,
                resource_path,
                status,
            })
        })
        .transpose()
    }

    /// Insert a new `IN_PROGRESS` row, reporting a unique-key conflict as
    /// [`ClaimInsert::AlreadyClaimed`] rather than an error.
    #[instrument(skip(self))]
    pub async fn insert_in_progress(
        &self,
        idempotency_key: &str,
        resource_path: &str,
    ) -> Result<ClaimInsert, IdempotencyStoreError> {
        let result = sqlx::query(
            "INSERT INTO idempotency_keys (idempotency_key, resource_path, status)
             VALUES ($1, $2, 'IN_PROGRESS')",
        )
        .bind(idempotency_key)
        .bind(resource_path)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(ClaimInsert::Inserted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(
                    idempotency_key,
                    resource_path, "Claim row already exists; lost the insert race"
                );
                Ok(ClaimInsert::AlreadyClaimed)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Overwrite the status of an existing row. A no-op when the row is
    /// gone, which keeps completion idempotent.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        idempotency_key: &str,
        resource_path: &str,
        status: KeyStatus,
    ) -> Result<(), IdempotencyStoreError> {
        sqlx::query(
            "UPDATE idempotency_keys
             SET status = $1
             WHERE idempotency_key = $2 AND resource_path = $3",
        )
        .bind(status.to_string())
        .bind(idempotency_key)
        .bind(resource_path)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete the row so a later delivery can claim the key again
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        idempotency_key: &str,
        resource_path: &str,
    ) -> Result<(), IdempotencyStoreError> {
        sqlx::query(
            "DELETE FROM idempotency_keys
             WHERE idempotency_key = $1 AND resource_path = $2",
        )
        .bind(idempotency_key)
        .bind(resource_path)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
