//! Persistence - the Postgres-backed idempotency store

mod idempotency_repository;

pub use idempotency_repository::{
    ClaimInsert, IdempotencyRecord, IdempotencyStoreError, KeyStatus, PgIdempotencyRepository,
    connect_pool,
};
