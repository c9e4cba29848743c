//! Application services

mod article_indexer;
mod news_event_handler;

pub use article_indexer::ArticleIndexer;
pub use news_event_handler::NewsEventHandler;
