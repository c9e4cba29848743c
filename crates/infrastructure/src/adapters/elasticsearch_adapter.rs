//! Elasticsearch adapter - Implements SearchIndexPort over the REST API
//!
//! Documents are keyed by the article id, so re-indexing the same article is
//! a plain overwrite and concurrent writers converge on last-write-wins.

use std::time::Duration;

use application::error::ApplicationError;
use application::ports::SearchIndexPort;
use async_trait::async_trait;
use domain::Article;
use reqwest::{Client, StatusCode};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

const INDEX_NAME: &str = "articles";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Adapter for the Elasticsearch articles index
pub struct ElasticsearchAdapter {
    client: Client,
    base_url: String,
    ensured: OnceCell<()>,
}

impl std::fmt::Debug for ElasticsearchAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchAdapter")
            .field("base_url", &self.base_url)
            .field("index", &INDEX_NAME)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchAdapter {
    /// Create a new adapter for the cluster at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to initialize.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApplicationError::Internal(format!("HTTP client init failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ensured: OnceCell::new(),
        })
    }

    fn index_url(&self) -> String {
        format!("{}/{INDEX_NAME}", self.base_url)
    }

    fn document_url(&self, article: &Article) -> String {
        format!("{}/_doc/{}", self.index_url(), article.id)
    }

    /// Index mapping, matching what the API service queries against
    fn index_mapping() -> serde_json::Value {
        serde_json::json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "title": {
                        "type": "text",
                        "analyzer": "standard",
                        "fields": {
                            "raw": { "type": "keyword" },
                            "autocomplete": { "type": "search_as_you_type" }
                        }
                    },
                    "content": {
                        "type": "text",
                        "analyzer": "standard",
                        "fields": {
                            "raw": { "type": "keyword" }
                        }
                    },
                    "source": { "type": "keyword" },
                    "link": { "type": "keyword" },
                    "created_at": { "type": "date" },
                    "updated_at": { "type": "date" }
                }
            }
        })
    }

    fn transport_error(err: reqwest::Error) -> ApplicationError {
        ApplicationError::Search(format!("Elasticsearch unreachable: {err}"))
    }

    /// Create the index when absent; an existing index is left untouched.
    async fn create_index_if_missing(&self) -> Result<(), ApplicationError> {
        let existing = self
            .client
            .head(self.index_url())
            .send()
            .await
            .map_err(Self::transport_error)?;

        match existing.status() {
            status if status.is_success() => {
                debug!(index = INDEX_NAME, "Index already exists");
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                let response = self
                    .client
                    .put(self.index_url())
                    .json(&Self::index_mapping())
                    .send()
                    .await
                    .map_err(Self::transport_error)?;

                if response.status().is_success() {
                    info!(index = INDEX_NAME, "Created Elasticsearch index");
                    Ok(())
                } else {
                    Err(ApplicationError::Search(format!(
                        "index creation returned HTTP {}",
                        response.status()
                    )))
                }
            }
            status => Err(ApplicationError::Search(format!(
                "index existence check returned HTTP {status}"
            ))),
        }
    }
}

#[async_trait]
impl SearchIndexPort for ElasticsearchAdapter {
    #[instrument(skip(self))]
    async fn ensure_index_exists(&self) -> Result<(), ApplicationError> {
        // OnceCell caches only success, so a failed attempt is retried on
        // the next call
        self.ensured
            .get_or_try_init(|| self.create_index_if_missing())
            .await
            .copied()
    }

    #[instrument(skip(self, article), fields(article_id = %article.id))]
    async fn index_article(&self, article: &Article) -> Result<(), ApplicationError> {
        self.ensure_index_exists().await?;

        let document = serde_json::json!({
            "id": article.id.to_string(),
            "title": article.title,
            "content": article.content,
            "source": article.source,
            "link": article.link,
            "created_at": article.created_at.to_rfc3339(),
            "updated_at": article.updated_at.to_rfc3339(),
        });

        let response = self
            .client
            .put(self.document_url(article))
            .json(&document)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(ApplicationError::Search(format!(
                "document write returned HTTP {}",
                response.status()
            )));
        }

        debug!(article_id = %article.id, "Indexed article document");
        Ok(())
    }
}
