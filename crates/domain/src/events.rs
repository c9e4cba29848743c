//! Enveloped domain events consumed from the message broker
//!
//! The API service publishes events wrapped in a JSON envelope:
//!
//! ```json
//! {
//!   "event": "news.created",
//!   "version": 1,
//!   "event_id": "<uuid>",
//!   "data": { "id": "<uuid>", "title": "...", ... }
//! }
//! ```
//!
//! Unknown fields at either level are tolerated so producers can add tracing
//! metadata without breaking older workers.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::Article;
use crate::errors::DomainError;

/// The only event type this worker handles
pub const NEWS_CREATED_EVENT: &str = "news.created";

/// The only envelope version this worker handles
pub const NEWS_CREATED_VERSION: i64 = 1;

/// Raw envelope as it appears on the wire
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    version: i64,
    event_id: String,
    data: serde_json::Value,
}

/// Payload of a `news.created` v1 event
#[derive(Debug, Deserialize)]
struct NewsCreatedData {
    id: String,
    title: String,
    content: String,
    source: String,
    author: String,
    link: String,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(rename = "updatedAt")]
    updated_at: String,
}

/// A fully decoded and validated `news.created` event
#[derive(Debug, Clone)]
pub struct NewsCreatedEvent {
    /// Producer-assigned event id, used verbatim as the idempotency key
    pub event_id: String,
    pub article: Article,
}

/// Decode a raw message body into a [`NewsCreatedEvent`].
///
/// Any failure here is terminal for the message: the body will never become
/// valid on redelivery.
pub fn decode_news_event(body: &[u8]) -> Result<NewsCreatedEvent, DomainError> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| DomainError::invalid(format!("malformed envelope: {e}")))?;

    if envelope.event != NEWS_CREATED_EVENT || envelope.version != NEWS_CREATED_VERSION {
        return Err(DomainError::UnsupportedEvent {
            event: envelope.event,
            version: envelope.version,
        });
    }

    if !envelope.data.is_object() {
        return Err(DomainError::invalid("'data' field must be an object"));
    }

    let data: NewsCreatedData = serde_json::from_value(envelope.data)
        .map_err(|e| DomainError::invalid(format!("invalid data payload: {e}")))?;

    let id = Uuid::parse_str(&data.id)
        .map_err(|_| DomainError::invalid(format!("invalid UUID for article id: {:?}", data.id)))?;

    let article = Article::new(
        id,
        data.title,
        data.content,
        data.source,
        data.author,
        data.link,
        parse_timestamp(&data.created_at)?,
        parse_timestamp(&data.updated_at)?,
    );

    Ok(NewsCreatedEvent {
        event_id: envelope.event_id,
        article,
    })
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts a trailing `Z`, a numeric offset, or no offset at all; the
/// offset-less form produced by standard library formatters is read as UTC.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DomainError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    value
        .parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|_| DomainError::invalid(format!("invalid timestamp: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn valid_body() -> serde_json::Value {
        serde_json::json!({
            "event": "news.created",
            "version": 1,
            "event_id": "11111111-2222-3333-4444-555555555555",
            "data": {
                "id": "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee",
                "title": "t",
                "content": "c",
                "source": "s",
                "author": "a",
                "link": "l",
                "createdAt": "2024-01-01T00:00:00",
                "updatedAt": "2024-01-02T12:30:00"
            }
        })
    }

    fn encode(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    #[test]
    fn decodes_valid_event() {
        let event = decode_news_event(&encode(&valid_body())).unwrap();

        assert_eq!(event.event_id, "11111111-2222-3333-4444-555555555555");
        assert_eq!(
            event.article.id,
            Uuid::parse_str("aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee").unwrap()
        );
        assert_eq!(event.article.title, "t");
        assert_eq!(
            event.article.created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            event.article.updated_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn rejects_invalid_json() {
        let err = decode_news_event(b"not json").unwrap_err();
        assert!(matches!(err, DomainError::InvalidEvent(_)));
    }

    #[test]
    fn rejects_missing_top_level_field() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("event_id");

        let err = decode_news_event(&encode(&body)).unwrap_err();
        assert!(err.to_string().contains("event_id"));
    }

    #[test]
    fn rejects_data_that_is_not_an_object() {
        let mut body = valid_body();
        body["data"] = serde_json::json!("oops");

        let err = decode_news_event(&encode(&body)).unwrap_err();
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn rejects_missing_data_field() {
        for field in [
            "id",
            "title",
            "content",
            "source",
            "author",
            "link",
            "createdAt",
            "updatedAt",
        ] {
            let mut body = valid_body();
            body["data"].as_object_mut().unwrap().remove(field);

            let err = decode_news_event(&encode(&body)).unwrap_err();
            assert!(
                matches!(err, DomainError::InvalidEvent(_)),
                "missing {field} should be invalid"
            );
        }
    }

    #[test]
    fn rejects_non_uuid_article_id() {
        let mut body = valid_body();
        body["data"]["id"] = serde_json::json!("x");

        let err = decode_news_event(&encode(&body)).unwrap_err();
        assert!(err.to_string().contains("UUID"));
    }

    #[test]
    fn rejects_unsupported_event_type() {
        let mut body = valid_body();
        body["event"] = serde_json::json!("news.deleted");

        let err = decode_news_event(&encode(&body)).unwrap_err();
        assert!(matches!(err, DomainError::UnsupportedEvent { .. }));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut body = valid_body();
        body["version"] = serde_json::json!(2);

        let err = decode_news_event(&encode(&body)).unwrap_err();
        assert!(matches!(
            err,
            DomainError::UnsupportedEvent { version: 2, .. }
        ));
    }

    #[test]
    fn tolerates_unknown_fields() {
        let mut body = valid_body();
        body["trace_id"] = serde_json::json!("abc");
        body["data"]["extra"] = serde_json::json!({"nested": true});

        assert!(decode_news_event(&encode(&body)).is_ok());
    }

    #[test]
    fn parses_timestamp_with_zulu_suffix() {
        let mut body = valid_body();
        body["data"]["createdAt"] = serde_json::json!("2024-01-01T00:00:00Z");

        let event = decode_news_event(&encode(&body)).unwrap();
        assert_eq!(
            event.article.created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn parses_timestamp_with_numeric_offset() {
        let mut body = valid_body();
        body["data"]["createdAt"] = serde_json::json!("2024-01-01T02:00:00+02:00");

        let event = decode_news_event(&encode(&body)).unwrap();
        assert_eq!(
            event.article.created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejects_garbage_timestamp() {
        let mut body = valid_body();
        body["data"]["updatedAt"] = serde_json::json!("yesterday");

        let err = decode_news_event(&encode(&body)).unwrap_err();
        assert!(err.to_string().contains("timestamp"));
    }
}
