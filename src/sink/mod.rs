//! Sink writers: where upserted rows go.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::model::{ArticleKey, ArticleRow};

pub mod sql_file;
pub mod sqlite;

pub use sql_file::SqlFileSink;
pub use sqlite::SqliteSink;

#[async_trait]
pub trait ArticleSink: Send + Sync {
    /// Which of `candidates` already exist at the destination.
    async fn existing_keys(&self, candidates: &[ArticleKey]) -> Result<HashSet<ArticleKey>>;

    /// Insert or update one row keyed on `(slug, language)`.
    async fn upsert(&self, row: &ArticleRow) -> Result<()>;

    /// Flush buffered output once every record has been handled.
    async fn finish(&self) -> Result<()> {
        Ok(())
    }

    /// Whether writes go to a remote service and need the inter-record delay.
    fn paced(&self) -> bool {
        false
    }
}

/// Prints each row as JSON instead of writing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSink;

#[async_trait]
impl ArticleSink for DryRunSink {
    async fn existing_keys(&self, _candidates: &[ArticleKey]) -> Result<HashSet<ArticleKey>> {
        Ok(HashSet::new())
    }

    async fn upsert(&self, row: &ArticleRow) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(row)?);
        Ok(())
    }
}
