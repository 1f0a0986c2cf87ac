//! Source readers: turn a source-of-truth file into per-language article lists.
//!
//! Three strategies are supported and none of them evaluates the input:
//! - `script`: text extraction from JS/TS modules holding array literals.
//! - `json` / `yaml`: structured documents with the two named lists.
//! - `sql`: an upsert script previously generated by this tool.

use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::ListNames;
use crate::model::{Article, Language};

pub mod extract;
pub mod structured;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("neither article list `{es}` nor `{en}` was found in the source")]
    ListsNotFound { es: String, en: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceFormat {
    Script,
    Json,
    Yaml,
    Sql,
}

impl SourceFormat {
    /// Infer the format from a file extension; unknown extensions are
    /// treated as script sources.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => SourceFormat::Json,
            Some("yaml") | Some("yml") => SourceFormat::Yaml,
            Some("sql") => SourceFormat::Sql,
            _ => SourceFormat::Script,
        }
    }
}

/// Articles read from a source, split by language in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLists {
    pub es: Vec<Article>,
    pub en: Vec<Article>,
}

impl SourceLists {
    pub fn len(&self) -> usize {
        self.es.len() + self.en.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spanish list first, then English.
    pub fn into_articles(self) -> Vec<Article> {
        let mut all = self.es;
        all.extend(self.en);
        all
    }

    fn from_articles(articles: Vec<Article>) -> Self {
        let (es, en) = articles
            .into_iter()
            .partition(|a| a.language == Language::Es);
        Self { es, en }
    }
}

/// Parse already-loaded source text.
pub fn parse_articles(
    text: &str,
    format: SourceFormat,
    names: &ListNames,
) -> Result<SourceLists, SourceError> {
    match format {
        SourceFormat::Script => extract::extract_lists(text, names),
        SourceFormat::Json => structured::parse_json(text, names),
        SourceFormat::Yaml => structured::parse_yaml(text, names),
        SourceFormat::Sql => Ok(SourceLists::from_articles(crate::sql::parse_upserts(text))),
    }
}

/// Read and parse a source file. `format` defaults to the one inferred from
/// the file extension.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn read_articles(
    path: &Path,
    format: Option<SourceFormat>,
    names: &ListNames,
) -> Result<SourceLists, SourceError> {
    let format = format.unwrap_or_else(|| SourceFormat::from_path(path));
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
    let lists = parse_articles(&text, format, names)?;
    info!(
        ?format,
        es = lists.es.len(),
        en = lists.en.len(),
        "read articles from source"
    );
    Ok(lists)
}
