//! Ports - capability interfaces implemented by infrastructure adapters

mod idempotency_port;
mod message_handler;
mod search_port;

pub use idempotency_port::{IdempotencyPort, IdempotencyStatus};
pub use message_handler::{HandlerOutcome, INVALID_MESSAGE_REASON, MessageHandler};
pub use search_port::SearchIndexPort;
