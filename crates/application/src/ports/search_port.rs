//! Search port - full-text index writes

use async_trait::async_trait;
use domain::Article;

use crate::error::ApplicationError;

/// Port for search indexing.
#[async_trait]
pub trait SearchIndexPort: Send + Sync {
    /// Ensure the backing index exists. Create-if-missing, never destructive.
    async fn ensure_index_exists(&self) -> Result<(), ApplicationError>;

    /// Write an article document keyed by its id. Rewriting the same id is
    /// a safe overwrite.
    async fn index_article(&self, article: &Article) -> Result<(), ApplicationError>;
}
