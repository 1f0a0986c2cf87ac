//! Configuration loader and validator for the article sync pipeline.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const URL_KEYS: [&str; 2] = ["SUPABASE_URL", "VITE_SUPABASE_URL"];
pub const API_KEY_KEYS: [&str; 2] = ["SUPABASE_SERVICE_ROLE_KEY", "SUPABASE_ANON_KEY"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Missing Supabase credentials: set {url} and either {service_key} or {anon_key}")]
    MissingCredentials {
        url: &'static str,
        service_key: &'static str,
        anon_key: &'static str,
    },
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub source: Source,
    pub destination: Destination,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Source {
    pub path: String,
    pub lists: ListNames,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            path: "src/data/blogArticles.js".into(),
            lists: ListNames::default(),
        }
    }
}

/// Names of the two per-language article lists inside a source file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListNames {
    pub es: String,
    pub en: String,
}

impl Default for ListNames {
    fn default() -> Self {
        Self {
            es: "articlesEs".into(),
            en: "articlesEn".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Destination {
    pub table: String,
    pub sql_output: String,
    pub sqlite_url: String,
}

impl Default for Destination {
    fn default() -> Self {
        Self {
            table: "blog_articles".into(),
            sql_output: "upsert_blog_articles.sql".into(),
            sqlite_url: "sqlite://./data/articles.db".into(),
        }
    }
}

impl Destination {
    /// `DATABASE_URL` takes precedence over the configured SQLite URL.
    pub fn resolved_sqlite_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| self.sqlite_url.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncSettings {
    pub delay_ms: u64,
    pub batch_size: usize,
    pub known_slugs: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            delay_ms: 500,
            batch_size: 50,
            known_slugs: Vec::new(),
        }
    }
}

/// Supabase endpoint and key, read from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve credentials through `lookup`; the first non-empty value of
    /// each alias list wins.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        match (first(&URL_KEYS), first(&API_KEY_KEYS)) {
            (Some(url), Some(api_key)) => Ok(Self { url, api_key }),
            _ => Err(ConfigError::MissingCredentials {
                url: URL_KEYS[0],
                service_key: API_KEY_KEYS[0],
                anon_key: API_KEY_KEYS[1],
            }),
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, the built-in defaults are used.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let cfg = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        }
        None => Config::default(),
    };
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.source.path.trim().is_empty() {
        return Err(ConfigError::Invalid("source.path must be non-empty"));
    }
    if cfg.source.lists.es.trim().is_empty() {
        return Err(ConfigError::Invalid("source.lists.es must be non-empty"));
    }
    if cfg.source.lists.en.trim().is_empty() {
        return Err(ConfigError::Invalid("source.lists.en must be non-empty"));
    }
    validate_table(&cfg.destination.table)?;
    if cfg.sync.batch_size == 0 {
        return Err(ConfigError::Invalid("sync.batch_size must be > 0"));
    }
    Ok(())
}

/// Check that a table name is a plain SQL identifier.
pub fn validate_table(table: &str) -> Result<(), ConfigError> {
    if is_identifier(table) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(
            "destination.table must be a plain SQL identifier",
        ))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Example configuration file.
pub fn example() -> &'static str {
    r#"source:
  path: "src/data/blogArticles.js"
  lists:
    es: "articlesEs"
    en: "articlesEn"

destination:
  table: "blog_articles"
  sql_output: "upsert_blog_articles.sql"
  sqlite_url: "sqlite://./data/articles.db"

sync:
  delay_ms: 500
  batch_size: 50
  known_slugs:
    - "dolar-blue-bolivia-hoy"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.sync.known_slugs, vec!["dolar-blue-bolivia-hoy"]);
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg: Config = serde_yaml::from_str("sync:\n  delay_ms: 0\n").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.sync.delay_ms, 0);
        assert_eq!(cfg.sync.batch_size, 50);
        assert_eq!(cfg.destination.table, "blog_articles");
        assert_eq!(cfg.source.lists.es, "articlesEs");
    }

    #[test]
    fn invalid_table_name() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.destination.table = "blog_articles; DROP TABLE x".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("destination.table")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn table_override_must_be_an_identifier() {
        assert!(validate_table("blog_articles").is_ok());
        assert!(validate_table("_t2").is_ok());
        for bad in ["", "2fast", "blog articles", "x;drop", "public.blog_articles"] {
            assert!(
                matches!(validate_table(bad), Err(ConfigError::Invalid(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn invalid_list_names_and_batch_size() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.source.lists.en = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.sync.batch_size = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.source.path = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("sync.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.sync.delay_ms, 500);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let td = tempdir().unwrap();
        let err = load(Some(&td.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn credentials_prefer_service_role_key() {
        let env: HashMap<&str, &str> = [
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]
        .into_iter()
        .collect();
        let creds = Credentials::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.url, "https://x.supabase.co");
        assert_eq!(creds.api_key, "service");
    }

    #[test]
    fn credentials_fall_back_to_aliases() {
        let env: HashMap<&str, &str> = [
            ("VITE_SUPABASE_URL", "https://y.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", ""),
            ("SUPABASE_ANON_KEY", "anon"),
        ]
        .into_iter()
        .collect();
        let creds = Credentials::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.url, "https://y.supabase.co");
        assert_eq!(creds.api_key, "anon");
    }

    #[test]
    fn missing_credentials_names_both_keys() {
        let err = Credentials::from_lookup(|k| {
            (k == "SUPABASE_URL").then(|| "https://x.supabase.co".to_string())
        })
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("SUPABASE_SERVICE_ROLE_KEY"));
        assert!(msg.contains("SUPABASE_ANON_KEY"));
    }
}
