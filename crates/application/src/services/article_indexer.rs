//! Article indexer - projects articles into the search index

use std::sync::Arc;

use domain::Article;
use tracing::{info, instrument};

use crate::{error::ApplicationError, ports::SearchIndexPort};

/// Service orchestrating article projection into the search index
pub struct ArticleIndexer {
    search: Arc<dyn SearchIndexPort>,
}

impl std::fmt::Debug for ArticleIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleIndexer").finish_non_exhaustive()
    }
}

impl ArticleIndexer {
    /// Create a new indexer over the given search port
    pub fn new(search: Arc<dyn SearchIndexPort>) -> Self {
        Self { search }
    }

    /// Write the article document, keyed by the article id
    #[instrument(skip(self, article), fields(article_id = %article.id))]
    pub async fn index(&self, article: &Article) -> Result<(), ApplicationError> {
        self.search.index_article(article).await?;
        info!(article_id = %article.id, "Article indexed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct RecordingSearch {
        indexed: Arc<Mutex<Vec<Article>>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl SearchIndexPort for RecordingSearch {
        async fn ensure_index_exists(&self) -> Result<(), ApplicationError> {
            Ok(())
        }

        async fn index_article(&self, article: &Article) -> Result<(), ApplicationError> {
            if self.fail_writes {
                return Err(ApplicationError::Search("cluster down".to_string()));
            }
            self.indexed.lock().await.push(article.clone());
            Ok(())
        }
    }

    fn article() -> Article {
        let now = Utc::now();
        Article::new(Uuid::new_v4(), "t", "c", "s", "a", "l", now, now)
    }

    #[tokio::test]
    async fn index_forwards_article_to_search_port() {
        let search = Arc::new(RecordingSearch::default());
        let indexer = ArticleIndexer::new(Arc::clone(&search) as Arc<dyn SearchIndexPort>);
        let article = article();

        indexer.index(&article).await.unwrap();

        let indexed = search.indexed.lock().await;
        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed[0].id, article.id);
    }

    #[tokio::test]
    async fn index_propagates_search_failures() {
        let search = Arc::new(RecordingSearch {
            fail_writes: true,
            ..RecordingSearch::default()
        });
        let indexer = ArticleIndexer::new(search as Arc<dyn SearchIndexPort>);

        let err = indexer.index(&article()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
