//! Structured JSON/YAML article documents.
//!
//! The document is a mapping holding two lists, keyed either by the
//! configured list names (`articlesEs` / `articlesEn`) or by the plain
//! language codes (`es` / `en`).

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{SourceError, SourceLists};
use crate::config::ListNames;
use crate::model::{Article, Language};

/// One entry as authored; field names follow the site's camelCase data files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceEntry {
    slug: String,
    title: String,
    content: String,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    featured: bool,
    #[serde(default, alias = "read_time")]
    read_time: Option<u32>,
    #[serde(default, alias = "published_at", alias = "date")]
    published_at: Option<String>,
}

impl SourceEntry {
    fn into_article(self, language: Language) -> Option<Article> {
        if self.slug.trim().is_empty() {
            return None;
        }
        Some(Article {
            slug: self.slug,
            language,
            title: self.title,
            excerpt: self.excerpt,
            content: self.content,
            author: self.author,
            category: self.category,
            featured: self.featured,
            read_time: self.read_time,
            published_at: self.published_at,
        })
    }
}

fn list_of<'a>(doc: &'a Value, name: &str, code: &str) -> Option<&'a Vec<Value>> {
    doc.get(name)
        .or_else(|| doc.get(code))
        .and_then(Value::as_array)
}

fn convert_list(entries: &[Value], list: &str, language: Language) -> Vec<Article> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            match serde_json::from_value::<SourceEntry>(entry.clone()) {
                Ok(parsed) => {
                    let article = parsed.into_article(language);
                    if article.is_none() {
                        warn!(list, index = idx, "skipping article entry with empty slug");
                    }
                    article
                }
                Err(err) => {
                    warn!(list, index = idx, %err, "skipping malformed article entry");
                    None
                }
            }
        })
        .collect()
}

fn from_document(doc: &Value, names: &ListNames) -> Result<SourceLists, SourceError> {
    let es = list_of(doc, &names.es, Language::Es.as_str());
    let en = list_of(doc, &names.en, Language::En.as_str());
    if es.is_none() && en.is_none() {
        return Err(SourceError::ListsNotFound {
            es: names.es.clone(),
            en: names.en.clone(),
        });
    }
    Ok(SourceLists {
        es: es
            .map(|l| convert_list(l, &names.es, Language::Es))
            .unwrap_or_default(),
        en: en
            .map(|l| convert_list(l, &names.en, Language::En))
            .unwrap_or_default(),
    })
}

pub fn parse_json(text: &str, names: &ListNames) -> Result<SourceLists, SourceError> {
    let doc: Value = serde_json::from_str(text)?;
    from_document(&doc, names)
}

pub fn parse_yaml(text: &str, names: &ListNames) -> Result<SourceLists, SourceError> {
    let doc: Value = serde_yaml::from_str(text)?;
    from_document(&doc, names)
}
