//! Queue and exchange topology
//!
//! For a namespace `ns` and main queue `q` the worker declares:
//!
//! ```text
//!   ns.dlx  (direct, durable)  <--- dead-letter exchange, shared
//!   ns.dlq  (durable)          <--- bound to ns.dlx with rk "ns.dlq"
//!   q.retry (durable)          <--- TTL-delayed; expired messages
//!                                   dead-letter to ns.dlx with rk "q"
//!   q       (durable)          <--- dead-letters to ns.dlx with rk "ns.dlq";
//!                                   also bound to ns.dlx with rk "q" so
//!                                   expired retries route back in
//! ```
//!
//! Publishing to `q.retry` with a per-message expiration is what implements
//! delayed retry: the broker expires the message after the backoff delay and
//! routes it back to `q` via the DLX.

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};
use tracing::info;

/// Names of the shared dead-letter pair for one namespace
#[derive(Debug, Clone)]
pub(crate) struct DeadLetterNames {
    pub exchange: String,
    pub queue: String,
}

impl DeadLetterNames {
    pub(crate) fn for_namespace(namespace: &str) -> Self {
        Self {
            exchange: format!("{namespace}.dlx"),
            queue: format!("{namespace}.dlq"),
        }
    }
}

/// Retry queue name for a main queue
pub(crate) fn retry_queue_name(queue: &str) -> String {
    format!("{queue}.retry")
}

fn durable_queue() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    }
}

/// Declare the shared dead-letter exchange and queue.
pub(crate) async fn declare_dead_letter(
    channel: &Channel,
    namespace: &str,
) -> Result<DeadLetterNames, lapin::Error> {
    let names = DeadLetterNames::for_namespace(namespace);

    channel
        .exchange_declare(
            &names.exchange,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_declare(&names.queue, durable_queue(), FieldTable::default())
        .await?;

    channel
        .queue_bind(
            &names.queue,
            &names.exchange,
            &names.queue,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(
        exchange = %names.exchange,
        queue = %names.queue,
        "Declared dead-letter exchange and queue"
    );
    Ok(names)
}

/// Declare a main queue together with its retry companion.
#[allow(clippy::cast_possible_wrap)]
pub(crate) async fn declare_queue(
    channel: &Channel,
    queue: &str,
    dead_letter: &DeadLetterNames,
    max_backoff_seconds: u64,
) -> Result<(), lapin::Error> {
    // Retry queue: the TTL is an upper bound, per-message expirations
    // override it downward
    let mut retry_args = FieldTable::default();
    retry_args.insert(
        "x-message-ttl".into(),
        AMQPValue::LongLongInt((max_backoff_seconds * 1000) as i64),
    );
    retry_args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(dead_letter.exchange.as_str().into()),
    );
    retry_args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(queue.into()),
    );
    channel
        .queue_declare(&retry_queue_name(queue), durable_queue(), retry_args)
        .await?;

    // Main queue: definitive failures dead-letter straight to the DLQ
    let mut main_args = FieldTable::default();
    main_args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(dead_letter.exchange.as_str().into()),
    );
    main_args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(dead_letter.queue.as_str().into()),
    );
    channel
        .queue_declare(queue, durable_queue(), main_args)
        .await?;

    // Expired retry messages arrive on the DLX with rk = queue name
    channel
        .queue_bind(
            queue,
            &dead_letter.exchange,
            queue,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(queue = %queue, retry_queue = %retry_queue_name(queue), "Declared queue topology");
    Ok(())
}
