//! Article entity - the in-memory projection of a published news article

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A news article as carried by `news.created` events.
///
/// Immutable after construction; the search index is keyed by `id`, so
/// re-indexing the same article is a safe overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Article identifier, doubles as the search document id
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// Publishing outlet the article originates from
    pub source: String,
    pub author: String,
    /// Canonical URL of the article
    pub link: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Create a new article projection
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        title: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
        author: impl Into<String>,
        link: impl Into<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            source: source.into(),
            author: author.into(),
            link: link.into(),
            created_at,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_construction() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let article = Article::new(
            id,
            "Title",
            "Body",
            "reuters",
            "Jane Doe",
            "https://example.com/a",
            now,
            now,
        );

        assert_eq!(article.id, id);
        assert_eq!(article.title, "Title");
        assert_eq!(article.source, "reuters");
        assert_eq!(article.created_at, now);
    }

    #[test]
    fn article_serializes_with_snake_case_timestamps() {
        let now = Utc::now();
        let article = Article::new(
            Uuid::new_v4(),
            "t",
            "c",
            "s",
            "a",
            "l",
            now,
            now,
        );

        let json = serde_json::to_value(&article).unwrap();
        assert!(json.get("created_at").is_some());
        assert!(json.get("updated_at").is_some());
    }
}
