use super::model::StoredArticle;
use crate::model::{ArticleKey, ArticleRow, Language};
use crate::sql;
use anyhow::{anyhow, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

/// Table created by `migrations/` in the mirror database.
pub const MIRROR_TABLE: &str = "blog_articles";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid SQLite URL: {}", normalized))?
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Insert or update one row keyed on `(slug, language)`, with the same
/// conflict clause as the generated scripts.
#[instrument(skip_all, fields(slug = %row.slug, language = %row.language))]
pub async fn upsert_article(pool: &Pool, row: &ArticleRow) -> Result<()> {
    let placeholders = vec!["?"; sql::INSERT_COLUMNS.len()].join(", ");
    let statement = format!(
        "INSERT INTO {MIRROR_TABLE} ({}) VALUES ({}) {}",
        sql::INSERT_COLUMNS.join(", "),
        placeholders,
        sql::conflict_clause()
    );
    sqlx::query(&statement)
        .bind(&row.slug)
        .bind(row.language.as_str())
        .bind(&row.title)
        .bind(row.excerpt.as_deref())
        .bind(&row.content)
        .bind(&row.content_format)
        .bind(row.author.as_deref())
        .bind(row.category.as_deref())
        .bind(row.featured)
        .bind(row.read_time.map(i64::from))
        .bind(row.published_at.as_deref())
        .execute(pool)
        .await
        .with_context(|| format!("failed to upsert {}", row.key()))?;
    Ok(())
}

/// Which of `candidates` already exist, queried in chunks of `batch_size` slugs.
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub async fn existing_keys(
    pool: &Pool,
    candidates: &[ArticleKey],
    batch_size: usize,
) -> Result<HashSet<ArticleKey>> {
    let wanted: HashSet<&ArticleKey> = candidates.iter().collect();
    let slugs: Vec<&str> = candidates
        .iter()
        .map(|k| k.slug.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut found = HashSet::new();
    for chunk in slugs.chunks(batch_size.max(1)) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT slug, language FROM {MIRROR_TABLE} WHERE slug IN ("
        ));
        let mut separated = qb.separated(", ");
        for slug in chunk {
            separated.push_bind(*slug);
        }
        separated.push_unseparated(")");

        let rows = qb.build().fetch_all(pool).await?;
        for row in rows {
            let slug: String = row.get("slug");
            let language: String = row.get("language");
            let Some(language) = Language::parse(&language) else {
                continue;
            };
            let key = ArticleKey::new(slug, language);
            if wanted.contains(&key) {
                found.insert(key);
            }
        }
    }
    Ok(found)
}

#[instrument(skip_all)]
pub async fn list_keys(pool: &Pool) -> Result<Vec<ArticleKey>> {
    let rows = sqlx::query(&format!(
        "SELECT slug, language FROM {MIRROR_TABLE} ORDER BY language, slug"
    ))
    .fetch_all(pool)
    .await?;
    rows.into_iter()
        .map(|row| {
            let slug: String = row.get("slug");
            let language: String = row.get("language");
            let language = Language::parse(&language)
                .ok_or_else(|| anyhow!("row {} has unknown language {}", slug, language))?;
            Ok(ArticleKey::new(slug, language))
        })
        .collect()
}

fn stored_from_row(row: &SqliteRow) -> Result<StoredArticle> {
    let language: String = row.get("language");
    Ok(StoredArticle {
        id: row.get("id"),
        slug: row.get("slug"),
        language: Language::parse(&language)
            .ok_or_else(|| anyhow!("unknown language {}", language))?,
        title: row.get("title"),
        excerpt: row.try_get::<Option<String>, _>("excerpt").ok().flatten(),
        content: row.get("content"),
        content_format: row.get("content_format"),
        author: row.try_get::<Option<String>, _>("author").ok().flatten(),
        category: row.try_get::<Option<String>, _>("category").ok().flatten(),
        featured: row.get("featured"),
        read_time: row.try_get::<Option<i64>, _>("read_time").ok().flatten(),
        published_at: row
            .try_get::<Option<String>, _>("published_at")
            .ok()
            .flatten(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[instrument(skip_all)]
pub async fn fetch_article(pool: &Pool, key: &ArticleKey) -> Result<Option<StoredArticle>> {
    let row = sqlx::query(&format!(
        "SELECT * FROM {MIRROR_TABLE} WHERE slug = ? AND language = ?"
    ))
    .bind(&key.slug)
    .bind(key.language.as_str())
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(stored_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn count_articles(pool: &Pool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {MIRROR_TABLE}"))
        .fetch_one(pool)
        .await?;
    Ok(count)
}
