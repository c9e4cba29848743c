//! Retry-tracking message headers
//!
//! Republishing copies the original header table and overrides only the
//! fields the dispatcher owns, so producer-side tracing headers survive
//! every hop through the retry and dead-letter topology.

use lapin::types::{AMQPValue, FieldTable};

/// Number of failed attempts so far
pub const RETRY_COUNT_HEADER: &str = "x-retry-count";

/// Queue the message was first consumed from
pub const ORIGINAL_QUEUE_HEADER: &str = "x-original-queue";

/// Why a message was dead-lettered without retrying
pub const ERROR_REASON_HEADER: &str = "x-error-reason";

/// Read the retry count from a header table, defaulting to 0.
///
/// Tolerant of the integer widths different publishers use.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn retry_count(headers: Option<&FieldTable>) -> u32 {
    let Some(table) = headers else {
        return 0;
    };

    match table.inner().get(RETRY_COUNT_HEADER) {
        Some(AMQPValue::LongUInt(n)) => *n,
        Some(AMQPValue::ShortUInt(n)) => u32::from(*n),
        Some(AMQPValue::ShortShortUInt(n)) => u32::from(*n),
        Some(AMQPValue::LongInt(n)) => (*n).try_into().unwrap_or(0),
        Some(AMQPValue::ShortInt(n)) => (*n).try_into().unwrap_or(0),
        Some(AMQPValue::LongLongInt(n)) => (*n).try_into().unwrap_or(0),
        _ => 0,
    }
}

/// Copy `headers` and override the dispatcher-owned fields.
#[must_use]
pub fn augmented(
    headers: Option<&FieldTable>,
    retry_count: u32,
    original_queue: &str,
    error_reason: Option<&str>,
) -> FieldTable {
    let mut table = headers.cloned().unwrap_or_default();

    table.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongUInt(retry_count));
    table.insert(
        ORIGINAL_QUEUE_HEADER.into(),
        AMQPValue::LongString(original_queue.into()),
    );
    if let Some(reason) = error_reason {
        table.insert(
            ERROR_REASON_HEADER.into(),
            AMQPValue::LongString(reason.into()),
        );
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_headers_default_to_zero() {
        assert_eq!(retry_count(None), 0);
        assert_eq!(retry_count(Some(&FieldTable::default())), 0);
    }

    #[test]
    fn reads_unsigned_and_signed_widths() {
        let mut table = FieldTable::default();
        table.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongUInt(2));
        assert_eq!(retry_count(Some(&table)), 2);

        table.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongLongInt(5));
        assert_eq!(retry_count(Some(&table)), 5);

        table.insert(RETRY_COUNT_HEADER.into(), AMQPValue::ShortShortUInt(7));
        assert_eq!(retry_count(Some(&table)), 7);
    }

    #[test]
    fn negative_or_non_numeric_counts_read_as_zero() {
        let mut table = FieldTable::default();
        table.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongInt(-3));
        assert_eq!(retry_count(Some(&table)), 0);

        table.insert(
            RETRY_COUNT_HEADER.into(),
            AMQPValue::LongString("two".into()),
        );
        assert_eq!(retry_count(Some(&table)), 0);
    }

    #[test]
    fn augmented_preserves_foreign_headers() {
        let mut original = FieldTable::default();
        original.insert("x-trace-id".into(), AMQPValue::LongString("abc123".into()));
        original.insert(RETRY_COUNT_HEADER.into(), AMQPValue::LongUInt(1));

        let table = augmented(Some(&original), 2, "news.created", None);

        assert_eq!(
            table.inner().get("x-trace-id"),
            Some(&AMQPValue::LongString("abc123".into()))
        );
        assert_eq!(retry_count(Some(&table)), 2);
        assert_eq!(
            table.inner().get(ORIGINAL_QUEUE_HEADER),
            Some(&AMQPValue::LongString("news.created".into()))
        );
        assert!(table.inner().get(ERROR_REASON_HEADER).is_none());
    }

    #[test]
    fn augmented_records_error_reason_when_given() {
        let table = augmented(None, 0, "news.created", Some("invalid_message"));

        assert_eq!(
            table.inner().get(ERROR_REASON_HEADER),
            Some(&AMQPValue::LongString("invalid_message".into()))
        );
    }
}
