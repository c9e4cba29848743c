//! Messaging - the RabbitMQ consumer dispatch core
//!
//! One connection, one channel, prefetch 1. Retries ride a time-delayed
//! retry queue instead of broker redelivery so the worker controls both the
//! delay and the attempt count; exhausted and unprocessable messages park in
//! a namespaced dead-letter queue with their full header history.

mod backoff;
mod consumer;
mod headers;
mod topology;

pub use backoff::BackoffPolicy;
pub use consumer::{ConsumerError, RabbitMqConsumer};
pub use headers::{ERROR_REASON_HEADER, ORIGINAL_QUEUE_HEADER, RETRY_COUNT_HEADER};
