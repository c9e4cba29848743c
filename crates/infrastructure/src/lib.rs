#![forbid(unsafe_code)]
//! Infrastructure layer - adapters for external systems
//!
//! Implements the ports defined in the application layer: the RabbitMQ
//! consumer dispatcher, the Postgres idempotency store and the
//! Elasticsearch index adapter, plus configuration and logging bootstrap.

pub mod adapters;
pub mod config;
pub mod messaging;
pub mod persistence;
pub mod telemetry;

pub use adapters::{ElasticsearchAdapter, PostgresIdempotencyAdapter};
pub use config::{LogLevel, WorkerConfig};
pub use messaging::{BackoffPolicy, ConsumerError, RabbitMqConsumer};
pub use persistence::{IdempotencyStoreError, PgIdempotencyRepository, connect_pool};
pub use telemetry::init_logging;
