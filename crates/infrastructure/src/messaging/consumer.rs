//! RabbitMQ consumer dispatcher
//!
//! Owns the broker connection and a `(queue, handler)` registry. Each
//! delivery runs through the registered handler, whose outcome is routed to
//! exactly one broker action: `ack`, `ack` + republish, or
//! `nack(requeue)`. The routing decision itself is a pure function so the
//! dispatch table can be tested without a broker.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use application::ports::{HandlerOutcome, MessageHandler};
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::backoff::BackoffPolicy;
use super::headers;
use super::topology::{self, DeadLetterNames};

/// AMQP delivery mode for persistent messages
const PERSISTENT: u8 = 2;

/// Error type for the consumer dispatcher
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Broker connection or channel operation failed
    #[error("Broker error: {0}")]
    Broker(#[from] lapin::Error),

    /// The consumer was started without any registered handler
    #[error("No message handlers registered")]
    NoHandlers,
}

/// Broker action for one delivery, decided before any broker call is made
#[derive(Debug, Clone, PartialEq, Eq)]
enum BrokerAction {
    Ack,
    NackRequeue,
    /// Ack, then publish to the DLQ carrying `retry_count` and optionally an
    /// error reason
    AckThenDeadLetter {
        reason: Option<String>,
        retry_count: u32,
    },
    /// Ack, then publish to the retry queue with the given expiration
    AckThenRetry {
        next_retry_count: u32,
        delay_ms: u64,
    },
}

/// Map a handler outcome and the message's retry count to a broker action.
fn route(outcome: HandlerOutcome, retry_count: u32, policy: &BackoffPolicy) -> BrokerAction {
    match outcome {
        HandlerOutcome::Ack => BrokerAction::Ack,
        HandlerOutcome::NackRequeue => BrokerAction::NackRequeue,
        HandlerOutcome::AckAndDeadLetter { reason } => BrokerAction::AckThenDeadLetter {
            reason: Some(reason),
            retry_count,
        },
        HandlerOutcome::AckAndRetry => {
            if retry_count >= policy.max_retries {
                BrokerAction::AckThenDeadLetter {
                    reason: None,
                    retry_count,
                }
            } else {
                BrokerAction::AckThenRetry {
                    next_retry_count: retry_count + 1,
                    delay_ms: policy.delay_ms(retry_count),
                }
            }
        }
    }
}

/// Consumer dispatcher over one RabbitMQ connection
pub struct RabbitMqConsumer {
    url: String,
    namespace: String,
    policy: BackoffPolicy,
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl std::fmt::Debug for RabbitMqConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RabbitMqConsumer")
            .field("namespace", &self.namespace)
            .field("policy", &self.policy)
            .field("queues", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl RabbitMqConsumer {
    /// Create a dispatcher for the broker at `url`, with dead-letter names
    /// derived from `namespace`
    pub fn new(url: impl Into<String>, namespace: impl Into<String>, policy: BackoffPolicy) -> Self {
        Self {
            url: url.into(),
            namespace: namespace.into(),
            policy,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a queue
    #[must_use]
    pub fn with_handler(mut self, queue: impl Into<String>, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.insert(queue.into(), handler);
        self
    }

    /// Connect, declare the topology and consume until `shutdown` resolves.
    ///
    /// An in-flight message is always finished (acked or nacked) before the
    /// method returns; the shutdown signal is honored between deliveries.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), ConsumerError> {
        if self.handlers.is_empty() {
            return Err(ConsumerError::NoHandlers);
        }

        let connection = Connection::connect(&self.url, ConnectionProperties::default()).await?;
        info!("Connected to RabbitMQ");

        let channel = connection.create_channel().await?;

        // One unacknowledged message per worker process at a time
        channel.basic_qos(1, BasicQosOptions::default()).await?;

        let dead_letter = topology::declare_dead_letter(&channel, &self.namespace).await?;

        let mut streams = Vec::new();
        for queue in self.handlers.keys() {
            topology::declare_queue(&channel, queue, &dead_letter, self.policy.max_backoff_seconds)
                .await?;

            let consumer = channel
                .basic_consume(
                    queue,
                    &format!("worker-{queue}"),
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await?;
            info!(queue = %queue, "Registered consumer");

            let queue = queue.clone();
            streams.push(consumer.map(move |delivery| (queue.clone(), delivery)));
        }
        let mut deliveries = futures::stream::select_all(streams);

        info!(
            queues = ?self.handlers.keys().collect::<Vec<_>>(),
            "Waiting for messages"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown signal received; stopping consumer");
                    break;
                }
                next = deliveries.next() => {
                    match next {
                        Some((queue, Ok(delivery))) => {
                            if let Err(err) = self
                                .process_delivery(&channel, &queue, delivery, &dead_letter)
                                .await
                            {
                                error!(
                                    queue = %queue,
                                    error = %err,
                                    "Broker call failed while finishing message"
                                );
                            }
                        }
                        Some((queue, Err(err))) => {
                            error!(queue = %queue, error = %err, "Failed to receive delivery");
                        }
                        None => {
                            warn!("All consumer streams closed; stopping");
                            break;
                        }
                    }
                }
            }
        }

        connection.close(200, "worker shutdown").await?;
        info!("RabbitMQ connection closed");
        Ok(())
    }

    /// Run one delivery through its handler and execute the routed action.
    async fn process_delivery(
        &self,
        channel: &Channel,
        queue: &str,
        delivery: Delivery,
        dead_letter: &DeadLetterNames,
    ) -> Result<(), lapin::Error> {
        let retry_count = headers::retry_count(delivery.properties.headers().as_ref());

        info!(
            queue = %queue,
            delivery_tag = delivery.delivery_tag,
            retry = retry_count,
            max = self.policy.max_retries,
            "Processing message"
        );

        let Some(handler) = self.handlers.get(queue) else {
            // Only registered queues are consumed, so this cannot happen;
            // requeue rather than lose the message if it somehow does
            warn!(queue = %queue, "Delivery from unregistered queue; requeuing");
            return delivery
                .nack(BasicNackOptions {
                    requeue: true,
                    ..BasicNackOptions::default()
                })
                .await;
        };

        let outcome = match handler.handle(&delivery.data).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(queue = %queue, error = %err, "Handler failed; treating as retryable");
                HandlerOutcome::AckAndRetry
            }
        };

        match route(outcome, retry_count, &self.policy) {
            BrokerAction::Ack => {
                delivery.ack(BasicAckOptions::default()).await?;
                debug!(delivery_tag = delivery.delivery_tag, "Message acknowledged");
            }
            BrokerAction::NackRequeue => {
                info!(
                    delivery_tag = delivery.delivery_tag,
                    "Requeuing message immediately"
                );
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..BasicNackOptions::default()
                    })
                    .await?;
            }
            BrokerAction::AckThenDeadLetter {
                reason,
                retry_count,
            } => {
                delivery.ack(BasicAckOptions::default()).await?;
                error!(
                    queue = %queue,
                    retry = retry_count,
                    reason = reason.as_deref().unwrap_or("retries_exhausted"),
                    "Routing message to DLQ"
                );
                let table = headers::augmented(
                    delivery.properties.headers().as_ref(),
                    retry_count,
                    queue,
                    reason.as_deref(),
                );
                self.publish(
                    channel,
                    &dead_letter.exchange,
                    &dead_letter.queue,
                    &delivery.data,
                    BasicProperties::default()
                        .with_headers(table)
                        .with_delivery_mode(PERSISTENT),
                )
                .await?;
            }
            BrokerAction::AckThenRetry {
                next_retry_count,
                delay_ms,
            } => {
                delivery.ack(BasicAckOptions::default()).await?;
                warn!(
                    queue = %queue,
                    retry = next_retry_count,
                    max = self.policy.max_retries,
                    delay_ms,
                    "Message failed; republishing to retry queue"
                );
                let table = headers::augmented(
                    delivery.properties.headers().as_ref(),
                    next_retry_count,
                    queue,
                    None,
                );
                // Default exchange; the expiration makes the broker bounce
                // the message back to the main queue after the delay
                self.publish(
                    channel,
                    "",
                    &topology::retry_queue_name(queue),
                    &delivery.data,
                    BasicProperties::default()
                        .with_headers(table)
                        .with_expiration(delay_ms.to_string().into())
                        .with_delivery_mode(PERSISTENT),
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn publish(
        &self,
        channel: &Channel,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: BasicProperties,
    ) -> Result<(), lapin::Error> {
        channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy::default()
    }

    #[test]
    fn success_routes_to_ack() {
        assert_eq!(route(HandlerOutcome::Ack, 0, &policy()), BrokerAction::Ack);
        assert_eq!(route(HandlerOutcome::Ack, 99, &policy()), BrokerAction::Ack);
    }

    #[test]
    fn contention_routes_to_nack_requeue_without_counting() {
        assert_eq!(
            route(HandlerOutcome::NackRequeue, 2, &policy()),
            BrokerAction::NackRequeue
        );
    }

    #[test]
    fn invalid_message_routes_to_dlq_with_reason() {
        let action = route(
            HandlerOutcome::AckAndDeadLetter {
                reason: "invalid_message".to_string(),
            },
            0,
            &policy(),
        );

        assert_eq!(
            action,
            BrokerAction::AckThenDeadLetter {
                reason: Some("invalid_message".to_string()),
                retry_count: 0,
            }
        );
    }

    #[test]
    fn transient_failure_schedules_backoff_retries() {
        // retry n carries count n+1 and delay min(1 * 2^n, 60) seconds
        assert_eq!(
            route(HandlerOutcome::AckAndRetry, 0, &policy()),
            BrokerAction::AckThenRetry {
                next_retry_count: 1,
                delay_ms: 1_000,
            }
        );
        assert_eq!(
            route(HandlerOutcome::AckAndRetry, 1, &policy()),
            BrokerAction::AckThenRetry {
                next_retry_count: 2,
                delay_ms: 2_000,
            }
        );
        assert_eq!(
            route(HandlerOutcome::AckAndRetry, 2, &policy()),
            BrokerAction::AckThenRetry {
                next_retry_count: 3,
                delay_ms: 4_000,
            }
        );
    }

    #[test]
    fn exhausted_retries_route_to_dlq_without_reason() {
        let action = route(HandlerOutcome::AckAndRetry, 3, &policy());

        assert_eq!(
            action,
            BrokerAction::AckThenDeadLetter {
                reason: None,
                retry_count: 3,
            }
        );
    }

    #[test]
    fn zero_max_retries_dead_letters_on_first_failure() {
        let policy = BackoffPolicy {
            max_retries: 0,
            ..BackoffPolicy::default()
        };

        assert_eq!(
            route(HandlerOutcome::AckAndRetry, 0, &policy),
            BrokerAction::AckThenDeadLetter {
                reason: None,
                retry_count: 0,
            }
        );
    }

    #[test]
    fn delay_saturates_at_the_cap() {
        let policy = BackoffPolicy {
            max_retries: 10,
            ..BackoffPolicy::default()
        };

        assert_eq!(
            route(HandlerOutcome::AckAndRetry, 8, &policy),
            BrokerAction::AckThenRetry {
                next_retry_count: 9,
                delay_ms: 60_000,
            }
        );
    }

    #[tokio::test]
    async fn consumer_without_handlers_is_rejected() {
        let consumer = RabbitMqConsumer::new("amqp://localhost", "news", policy());

        let err = consumer.run(std::future::ready(())).await;
        assert!(matches!(err, Err(ConsumerError::NoHandlers)));
    }
}
