use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::model::{ArticleKey, ArticleRow};
use crate::sink::ArticleSink;
use crate::supabase::model::{ArticleUpdate, KeyRow};

pub mod model;

const REST_PATH: &str = "rest/v1/";
const CONFLICT_TARGET: &str = "slug,language";
const LIST_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: Url,
    api_key: String,
    table: String,
    batch_size: usize,
}

impl fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = raw.trim().to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    Url::parse(&url).with_context(|| format!("invalid Supabase URL: {}", raw))
}

/// Quote a value for a PostgREST `in.(...)` list.
fn quote_in_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

impl SupabaseClient {
    pub fn new(creds: &Credentials, table: &str) -> Result<Self> {
        let base_url = parse_base_url(&creds.url)?;
        Self::with_base_url(creds.api_key.clone(), table, base_url)
    }

    pub fn with_base_url(api_key: String, table: &str, base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent("article-sync/0.1")
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
            table: table.to_string(),
            batch_size: 50,
        })
    }

    /// Number of slugs per existence query.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn table_url(&self) -> Result<Url> {
        self.base_url
            .join(&format!("{}{}", REST_PATH, self.table))
            .context("invalid Supabase base URL")
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// Insert `rows`, leaving existing `(slug, language)` rows untouched.
    /// The response lists only the keys that were actually inserted.
    pub fn build_insert_request(&self, rows: &[ArticleRow]) -> Result<reqwest::Request> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("on_conflict", CONFLICT_TARGET)
            .append_pair("select", CONFLICT_TARGET);
        self.authorized(self.http.post(url))
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(rows)
            .build()
            .context("failed to build Supabase insert request")
    }

    /// Overwrite the updatable columns of the existing row for `row`'s key.
    pub fn build_update_request(&self, row: &ArticleRow) -> Result<reqwest::Request> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("slug", &format!("eq.{}", row.slug))
            .append_pair("language", &format!("eq.{}", row.language));
        self.authorized(self.http.patch(url))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(&ArticleUpdate::from(row))
            .build()
            .context("failed to build Supabase update request")
    }

    pub fn build_existing_keys_request(&self, slugs: &[&str]) -> Result<reqwest::Request> {
        let mut url = self.table_url()?;
        let list = slugs
            .iter()
            .map(|s| quote_in_value(s))
            .collect::<Vec<_>>()
            .join(",");
        url.query_pairs_mut()
            .append_pair("select", CONFLICT_TARGET)
            .append_pair("slug", &format!("in.({})", list));
        self.authorized(self.http.get(url))
            .build()
            .context("failed to build Supabase select request")
    }

    pub fn build_list_keys_request(&self, offset: usize, limit: usize) -> Result<reqwest::Request> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("select", CONFLICT_TARGET)
            .append_pair("order", "language.asc,slug.asc")
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        self.authorized(self.http.get(url))
            .build()
            .context("failed to build Supabase select request")
    }

    async fn send(&self, request: reqwest::Request) -> Result<Response> {
        debug!(method = %request.method(), url = %request.url(), "sending supabase request");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Supabase")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!("rate limited by Supabase: {}", body);
            return Err(anyhow!("received 429 from Supabase: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("supabase error {}: {}", status, body));
        }
        Ok(res)
    }

    async fn fetch_key_rows(&self, request: reqwest::Request) -> Result<Vec<KeyRow>> {
        self.send(request)
            .await?
            .json()
            .await
            .context("invalid Supabase response")
    }

    /// Insert `rows`, returning the keys that did not exist yet.
    pub async fn insert_rows(&self, rows: &[ArticleRow]) -> Result<Vec<ArticleKey>> {
        let request = self.build_insert_request(rows)?;
        Ok(keys_from_rows(self.fetch_key_rows(request).await?))
    }

    pub async fn update_row(&self, row: &ArticleRow) -> Result<()> {
        let request = self.build_update_request(row)?;
        self.send(request).await?;
        Ok(())
    }

    /// Batched existence query for `candidates`.
    pub async fn fetch_existing_keys(
        &self,
        candidates: &[ArticleKey],
    ) -> Result<HashSet<ArticleKey>> {
        let wanted: HashSet<&ArticleKey> = candidates.iter().collect();
        let slugs: Vec<&str> = candidates
            .iter()
            .map(|k| k.slug.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut found = HashSet::new();
        for chunk in slugs.chunks(self.batch_size) {
            let request = self.build_existing_keys_request(chunk)?;
            for key in keys_from_rows(self.fetch_key_rows(request).await?) {
                if wanted.contains(&key) {
                    found.insert(key);
                }
            }
        }
        info!(
            candidates = candidates.len(),
            existing = found.len(),
            "checked destination for existing articles"
        );
        Ok(found)
    }

    /// Every key in the table, fetched page by page.
    pub async fn list_keys(&self) -> Result<Vec<ArticleKey>> {
        collect_pages(LIST_PAGE_SIZE, |offset, limit| async move {
            let request = self.build_list_keys_request(offset, limit)?;
            self.fetch_key_rows(request).await
        })
        .await
    }
}

/// Keys for rows with a known language; other rows are logged and dropped.
fn keys_from_rows(rows: Vec<KeyRow>) -> Vec<ArticleKey> {
    rows.into_iter()
        .filter_map(|row| {
            let key = row.key();
            if key.is_none() {
                warn!(slug = %row.slug, language = %row.language, "ignoring row with unknown language");
            }
            key
        })
        .collect()
}

/// Page through `fetch(offset, limit)` until an empty page. Offsets advance
/// by raw row count, so dropped rows or a server-side row cap below `limit`
/// do not end the listing early.
async fn collect_pages<F, Fut>(limit: usize, mut fetch: F) -> Result<Vec<ArticleKey>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<KeyRow>>>,
{
    let mut keys = Vec::new();
    let mut offset = 0;
    loop {
        let page = fetch(offset, limit).await?;
        if page.is_empty() {
            break;
        }
        offset += page.len();
        keys.extend(keys_from_rows(page));
    }
    Ok(keys)
}

#[async_trait]
impl ArticleSink for SupabaseClient {
    async fn existing_keys(&self, candidates: &[ArticleKey]) -> Result<HashSet<ArticleKey>> {
        self.fetch_existing_keys(candidates).await
    }

    async fn upsert(&self, row: &ArticleRow) -> Result<()> {
        let inserted = self.insert_rows(std::slice::from_ref(row)).await?;
        if inserted.is_empty() {
            debug!(slug = %row.slug, language = %row.language, "row exists; updating");
            self.update_row(row).await?;
        }
        Ok(())
    }

    fn paced(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Article, Language};
    use chrono::Utc;

    fn client() -> SupabaseClient {
        let creds = Credentials {
            url: "https://abc.supabase.co".into(),
            api_key: "secret".into(),
        };
        SupabaseClient::new(&creds, "blog_articles").unwrap()
    }

    fn query(request: &reqwest::Request, key: &str) -> Option<String> {
        request
            .url()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    fn header<'a>(request: &'a reqwest::Request, name: &str) -> &'a str {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .unwrap()
    }

    fn row() -> ArticleRow {
        Article {
            slug: "a-2".into(),
            language: Language::Es,
            title: "T".into(),
            excerpt: Some("E".into()),
            content: "C".into(),
            author: Some("Equipo".into()),
            category: Some("cat".into()),
            featured: true,
            read_time: Some(4),
            published_at: None,
        }
        .to_row(Utc::now())
    }

    fn json_body(request: &reqwest::Request) -> serde_json::Value {
        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(body).unwrap()
    }

    #[test]
    fn insert_request_ignores_existing_keys() {
        let request = client().build_insert_request(&[row()]).unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/rest/v1/blog_articles");
        assert_eq!(query(&request, "on_conflict").as_deref(), Some("slug,language"));
        assert_eq!(query(&request, "select").as_deref(), Some("slug,language"));
        assert_eq!(header(&request, "apikey"), "secret");
        assert_eq!(header(&request, "Authorization"), "Bearer secret");
        assert_eq!(header(&request, "Content-Type"), "application/json");
        let prefer = header(&request, "Prefer");
        assert!(prefer.contains("resolution=ignore-duplicates"));
        assert!(prefer.contains("return=representation"));
        assert!(!prefer.contains("merge-duplicates"));

        let json = json_body(&request);
        assert_eq!(json[0]["slug"], "a-2");
        assert_eq!(json[0]["language"], "es");
        assert_eq!(json[0]["content_format"], "html");
        assert_eq!(json[0]["author"], "Equipo");
    }

    #[test]
    fn update_request_patches_only_updatable_columns() {
        let request = client().build_update_request(&row()).unwrap();

        assert_eq!(request.method(), reqwest::Method::PATCH);
        assert_eq!(request.url().path(), "/rest/v1/blog_articles");
        assert_eq!(query(&request, "slug").as_deref(), Some("eq.a-2"));
        assert_eq!(query(&request, "language").as_deref(), Some("eq.es"));
        assert_eq!(header(&request, "Authorization"), "Bearer secret");

        let json = json_body(&request);
        let mut columns: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        columns.sort_unstable();
        let mut expected: Vec<&str> = crate::sql::UPDATE_COLUMNS.to_vec();
        expected.push("updated_at");
        expected.sort_unstable();
        assert_eq!(columns, expected);
        assert_eq!(json["title"], "T");
        assert_eq!(json["excerpt"], "E");
    }

    fn key_row(slug: &str, language: &str) -> KeyRow {
        KeyRow {
            slug: slug.into(),
            language: language.into(),
        }
    }

    #[tokio::test]
    async fn pagination_advances_past_dropped_rows() {
        let pages = vec![
            vec![key_row("a", "es"), key_row("b", "fr")],
            vec![key_row("c", "en"), key_row("d", "en")],
            vec![key_row("e", "es")],
            vec![],
        ];
        let mut calls = Vec::new();
        let keys = collect_pages(2, |offset, limit| {
            calls.push((offset, limit));
            let page = pages.get(calls.len() - 1).cloned().unwrap_or_default();
            async move { Ok(page) }
        })
        .await
        .unwrap();

        let slugs: Vec<&str> = keys.iter().map(|k| k.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "c", "d", "e"]);
        assert_eq!(calls, vec![(0, 2), (2, 2), (4, 2), (5, 2)]);
    }

    #[tokio::test]
    async fn pagination_propagates_errors() {
        let result = collect_pages(10, |_, _| async { Err(anyhow!("boom")) }).await;
        assert!(result.is_err());
    }

    #[test]
    fn existing_keys_request_uses_in_filter() {
        let request = client()
            .build_existing_keys_request(&["a-1", "with\"quote"])
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(query(&request, "select").as_deref(), Some("slug,language"));
        assert_eq!(
            query(&request, "slug").as_deref(),
            Some(r#"in.("a-1","with\"quote")"#)
        );
    }

    #[test]
    fn list_keys_request_pages_with_limit_and_offset() {
        let request = client().build_list_keys_request(1000, 1000).unwrap();
        assert_eq!(query(&request, "limit").as_deref(), Some("1000"));
        assert_eq!(query(&request, "offset").as_deref(), Some("1000"));
    }

    #[test]
    fn base_url_with_path_keeps_prefix() {
        let creds = Credentials {
            url: "http://localhost:54321/".into(),
            api_key: "k".into(),
        };
        let client = SupabaseClient::new(&creds, "blog_articles").unwrap();
        let request = client.build_list_keys_request(0, 10).unwrap();
        assert_eq!(request.url().path(), "/rest/v1/blog_articles");
        assert_eq!(request.url().port(), Some(54321));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let rendered = format!("{:?}", client());
        assert!(!rendered.contains("secret"));
    }
}
