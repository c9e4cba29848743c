//! Message handler port - per-queue processing contract
//!
//! Handlers classify what happened to a message; the consumer dispatcher
//! maps the outcome to broker calls. Keeping the outcome a closed enum makes
//! the dispatcher's routing exhaustive.

use async_trait::async_trait;

use crate::error::ApplicationError;

/// Dead-letter reason recorded when a message cannot be decoded
pub const INVALID_MESSAGE_REASON: &str = "invalid_message";

/// Terminal decision for one delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Fully handled; acknowledge and move on
    Ack,
    /// Transient failure; acknowledge, then schedule a delayed retry
    AckAndRetry,
    /// Permanently unprocessable; acknowledge, then park in the DLQ
    AckAndDeadLetter {
        /// Short machine-readable reason, published as a message header
        reason: String,
    },
    /// Another worker owns the event; requeue without counting a retry
    NackRequeue,
}

/// Port implemented per queue; the dispatcher holds a `(queue, handler)`
/// registry and feeds each delivery's raw bytes through it.
///
/// Returning `Err` means the handler itself blew up unexpectedly; the
/// dispatcher treats that exactly like [`HandlerOutcome::AckAndRetry`].
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, body: &[u8]) -> Result<HandlerOutcome, ApplicationError>;
}
