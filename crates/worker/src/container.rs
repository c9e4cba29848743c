//! Dependency wiring
//!
//! Static construction of every adapter, service and the consumer's handler
//! registry. No runtime plugin loading; what runs is what is wired here.

use std::sync::Arc;

use anyhow::Context;
use application::ports::{IdempotencyPort, MessageHandler, SearchIndexPort};
use application::{ArticleIndexer, NewsEventHandler};
use domain::NEWS_CREATED_EVENT;
use infrastructure::persistence::connect_pool;
use infrastructure::{
    BackoffPolicy, ElasticsearchAdapter, PgIdempotencyRepository, PostgresIdempotencyAdapter,
    RabbitMqConsumer, WorkerConfig,
};
use tracing::info;

/// Fully wired worker, ready to consume
#[derive(Debug)]
pub struct Container {
    pub consumer: RabbitMqConsumer,
}

/// Construct and wire all dependencies, failing fast when any backing
/// service is unreachable.
pub async fn build(config: &WorkerConfig) -> anyhow::Result<Container> {
    let pool = connect_pool(&config.postgres_url)
        .await
        .context("failed to connect to Postgres")?;
    info!("Connected to Postgres");

    let search = Arc::new(
        ElasticsearchAdapter::new(&config.elasticsearch_url)
            .context("failed to build Elasticsearch client")?,
    );
    // Creates the articles index on first boot and proves the cluster is
    // reachable before we start taking messages
    search
        .ensure_index_exists()
        .await
        .context("failed to reach Elasticsearch")?;
    info!("Elasticsearch index ready");

    let idempotency: Arc<dyn IdempotencyPort> = Arc::new(PostgresIdempotencyAdapter::new(
        PgIdempotencyRepository::new(pool),
    ));
    let indexer = ArticleIndexer::new(Arc::clone(&search) as Arc<dyn SearchIndexPort>);
    let handler: Arc<dyn MessageHandler> = Arc::new(NewsEventHandler::new(indexer, idempotency));

    let policy = BackoffPolicy {
        max_retries: config.max_retries,
        initial_backoff_seconds: config.initial_backoff_seconds,
        max_backoff_seconds: config.max_backoff_seconds,
        multiplier: config.backoff_multiplier,
    };

    let consumer = RabbitMqConsumer::new(&config.rabbitmq_url, &config.queue_namespace, policy)
        .with_handler(NEWS_CREATED_EVENT, handler);

    Ok(Container { consumer })
}
