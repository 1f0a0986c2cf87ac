use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use super::ArticleSink;
use crate::db::{self, Pool};
use crate::model::{ArticleKey, ArticleRow};

/// Writes into the local SQLite mirror.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    pool: Pool,
    batch_size: usize,
}

impl SqliteSink {
    pub fn new(pool: Pool, batch_size: usize) -> Self {
        Self { pool, batch_size }
    }

    /// Open (creating if needed) and migrate the mirror at `database_url`.
    pub async fn open(database_url: &str, batch_size: usize) -> Result<Self> {
        let pool = db::init_pool(database_url).await?;
        db::run_migrations(&pool).await?;
        Ok(Self::new(pool, batch_size))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl ArticleSink for SqliteSink {
    async fn existing_keys(&self, candidates: &[ArticleKey]) -> Result<HashSet<ArticleKey>> {
        db::existing_keys(&self.pool, candidates, self.batch_size).await
    }

    async fn upsert(&self, row: &ArticleRow) -> Result<()> {
        db::upsert_article(&self.pool, row).await
    }
}
