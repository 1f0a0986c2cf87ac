use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value stored in `content_format` for every synced row.
pub const CONTENT_FORMAT_HTML: &str = "html";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Es,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" => Some(Language::Es),
            "en" => Some(Language::En),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural composite key of an article: `(slug, language)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArticleKey {
    pub slug: String,
    pub language: Language,
}

impl ArticleKey {
    pub fn new(slug: impl Into<String>, language: Language) -> Self {
        Self {
            slug: slug.into(),
            language,
        }
    }
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.language, self.slug)
    }
}

/// Article as read from a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub slug: String,
    pub language: Language,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub featured: bool,
    pub read_time: Option<u32>,
    pub published_at: Option<String>,
}

impl Article {
    pub fn key(&self) -> ArticleKey {
        ArticleKey::new(self.slug.clone(), self.language)
    }

    /// Project the article onto the destination row, stamping `updated_at`.
    pub fn to_row(&self, now: DateTime<Utc>) -> ArticleRow {
        ArticleRow {
            slug: self.slug.clone(),
            language: self.language,
            title: self.title.clone(),
            excerpt: self.excerpt.clone(),
            content: self.content.clone(),
            content_format: CONTENT_FORMAT_HTML.to_string(),
            author: self.author.clone(),
            category: self.category.clone(),
            featured: self.featured,
            read_time: self.read_time,
            published_at: self.published_at.clone(),
            updated_at: now,
        }
    }
}

/// Row written to the destination table. `id` and `created_at` are owned by
/// the destination and never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRow {
    pub slug: String,
    pub language: Language,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub content_format: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub featured: bool,
    pub read_time: Option<u32>,
    pub published_at: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ArticleRow {
    pub fn key(&self) -> ArticleKey {
        ArticleKey::new(self.slug.clone(), self.language)
    }
}
