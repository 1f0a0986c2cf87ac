//! Rows returned by the mirror repository.

use crate::model::Language;

/// A mirror row, including the columns the destination manages itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArticle {
    pub id: i64,
    pub slug: String,
    pub language: Language,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub content_format: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub featured: bool,
    pub read_time: Option<i64>,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
