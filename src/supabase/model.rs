use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ArticleKey, ArticleRow, Language};

/// Row shape returned by `select=slug,language`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KeyRow {
    pub slug: String,
    pub language: String,
}

impl KeyRow {
    pub fn key(&self) -> Option<ArticleKey> {
        Language::parse(&self.language).map(|l| ArticleKey::new(self.slug.clone(), l))
    }
}

/// PATCH body for an existing row: only the columns an upsert may overwrite.
#[derive(Serialize, Debug)]
pub struct ArticleUpdate<'a> {
    pub title: &'a str,
    pub excerpt: Option<&'a str>,
    pub content: &'a str,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a ArticleRow> for ArticleUpdate<'a> {
    fn from(row: &'a ArticleRow) -> Self {
        Self {
            title: &row.title,
            excerpt: row.excerpt.as_deref(),
            content: &row.content,
            updated_at: row.updated_at,
        }
    }
}
