use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::info;

use super::ArticleSink;
use crate::model::{ArticleKey, ArticleRow};
use crate::sql;

/// Appends one upsert statement per row to a script for separate execution.
#[derive(Debug)]
pub struct SqlFileSink {
    path: PathBuf,
    table: String,
    writer: Mutex<BufWriter<File>>,
}

impl SqlFileSink {
    /// Create (truncating) the script at `path` and write its header.
    pub async fn create(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = File::create(&path)
            .await
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(sql::script_header(table, &Utc::now().to_rfc3339()).as_bytes())
            .await?;
        Ok(Self {
            path,
            table: table.to_string(),
            writer: Mutex::new(writer),
        })
    }
}

#[async_trait]
impl ArticleSink for SqlFileSink {
    async fn existing_keys(&self, _candidates: &[ArticleKey]) -> Result<HashSet<ArticleKey>> {
        Ok(HashSet::new())
    }

    async fn upsert(&self, row: &ArticleRow) -> Result<()> {
        let statement = sql::render_upsert(&self.table, row);
        let mut writer = self.writer.lock().await;
        writer.write_all(statement.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer
            .flush()
            .await
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        info!(path = %self.path.display(), "wrote upsert script");
        Ok(())
    }
}
