//! Read → diff → upsert, one record at a time.

use anyhow::Result;
use chrono::Utc;
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::diff::{self, KnownKeys};
use crate::model::{Article, ArticleKey};
use crate::sink::ArticleSink;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Pause between writes to a paced sink.
    pub delay: Option<Duration>,
    /// Query the sink for existing keys before filtering.
    pub check_existing: bool,
    /// Upsert every candidate, ignoring known keys.
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<(ArticleKey, String)>,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total: {}, succeeded: {}, failed: {}, skipped: {}",
            self.total, self.succeeded, self.failed, self.skipped
        )
    }
}

/// Upsert every article not already known to the destination.
///
/// Per-record failures are logged and counted and never stop the run; only
/// an error from `sink.finish()` is returned.
#[instrument(skip_all, fields(candidates = articles.len()))]
pub async fn run(
    articles: Vec<Article>,
    mut known: KnownKeys,
    sink: &dyn ArticleSink,
    opts: &SyncOptions,
) -> Result<SyncReport> {
    let total = articles.len();

    let pending = if opts.force {
        articles
    } else {
        if opts.check_existing && !articles.is_empty() {
            let keys: Vec<ArticleKey> = articles.iter().map(Article::key).collect();
            match sink.existing_keys(&keys).await {
                Ok(existing) => known.extend_keys(existing),
                Err(err) => {
                    warn!(?err, "existence check failed; using configured known slugs only")
                }
            }
        }
        diff::filter_new(articles, &known)
    };

    let mut report = SyncReport {
        total,
        skipped: total - pending.len(),
        ..Default::default()
    };
    info!(
        total,
        pending = pending.len(),
        skipped = report.skipped,
        "starting upserts"
    );

    let delay = opts.delay.filter(|d| sink.paced() && !d.is_zero());
    let count = pending.len();
    for (idx, article) in pending.into_iter().enumerate() {
        let row = article.to_row(Utc::now());
        match sink.upsert(&row).await {
            Ok(()) => {
                report.succeeded += 1;
                info!(slug = %row.slug, language = %row.language, "upserted article");
            }
            Err(err) => {
                report.failed += 1;
                warn!(?err, slug = %row.slug, language = %row.language, "upsert failed");
                report.failures.push((row.key(), format!("{:#}", err)));
            }
        }
        if let Some(delay) = delay {
            if idx + 1 < count {
                tokio::time::sleep(delay).await;
            }
        }
    }

    sink.finish().await?;
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "sync finished"
    );
    Ok(report)
}
