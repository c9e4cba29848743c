//! News event handler - the per-message state machine
//!
//! Decode, claim, index, mark complete. Every path collapses into one
//! [`HandlerOutcome`] so the dispatcher can route the message with a single
//! exhaustive match.

use std::sync::Arc;

use domain::{NEWS_CREATED_EVENT, NewsCreatedEvent, decode_news_event};
use tracing::{error, info, instrument, warn};

use crate::{
    error::ApplicationError,
    ports::{
        HandlerOutcome, INVALID_MESSAGE_REASON, IdempotencyPort, IdempotencyStatus, MessageHandler,
    },
    services::ArticleIndexer,
};

/// Handler for the `news.created` queue
pub struct NewsEventHandler {
    indexer: ArticleIndexer,
    idempotency: Arc<dyn IdempotencyPort>,
}

impl std::fmt::Debug for NewsEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsEventHandler").finish_non_exhaustive()
    }
}

impl NewsEventHandler {
    /// Create a new handler
    pub fn new(indexer: ArticleIndexer, idempotency: Arc<dyn IdempotencyPort>) -> Self {
        Self {
            indexer,
            idempotency,
        }
    }

    /// Index the claimed event and record completion.
    ///
    /// Called only after this worker won the claim; a failure anywhere in
    /// here releases the claim so a redelivery can start over.
    async fn process_claimed(&self, event: &NewsCreatedEvent) -> Result<(), ApplicationError> {
        self.indexer.index(&event.article).await?;
        self.idempotency
            .mark_completed(&event.event_id, NEWS_CREATED_EVENT)
            .await
    }
}

#[async_trait::async_trait]
impl MessageHandler for NewsEventHandler {
    #[instrument(skip(self, body))]
    async fn handle(&self, body: &[u8]) -> Result<HandlerOutcome, ApplicationError> {
        let event = match decode_news_event(body) {
            Ok(event) => event,
            Err(err) => {
                error!(error = %err, "Discarding undecodable message");
                return Ok(HandlerOutcome::AckAndDeadLetter {
                    reason: INVALID_MESSAGE_REASON.to_string(),
                });
            }
        };

        // Storage errors during the claim bubble up as Err; the dispatcher
        // treats them as transient.
        let status = self
            .idempotency
            .check_and_claim(&event.event_id, NEWS_CREATED_EVENT)
            .await?;

        match status {
            IdempotencyStatus::Completed => {
                info!(event_id = %event.event_id, "Event already processed; skipping");
                Ok(HandlerOutcome::Ack)
            }
            IdempotencyStatus::InProgress => {
                info!(
                    event_id = %event.event_id,
                    "Event currently in progress elsewhere; requeuing"
                );
                Ok(HandlerOutcome::NackRequeue)
            }
            IdempotencyStatus::New => match self.process_claimed(&event).await {
                Ok(()) => Ok(HandlerOutcome::Ack),
                Err(err) => {
                    error!(event_id = %event.event_id, error = %err, "Processing failed after claim");
                    if let Err(cleanup) = self
                        .idempotency
                        .mark_failed(&event.event_id, NEWS_CREATED_EVENT)
                        .await
                    {
                        warn!(
                            event_id = %event.event_id,
                            error = %cleanup,
                            "Could not release idempotency claim"
                        );
                    }
                    Ok(HandlerOutcome::AckAndRetry)
                }
            },
        }
    }
}
