//! Upsert statement rendering and reading back previously generated scripts.
//!
//! Statements target Postgres but stay within the subset SQLite also accepts
//! (`ON CONFLICT ... DO UPDATE`, `EXCLUDED`, `TRUE`/`FALSE`), so the same text
//! can be replayed against the local mirror.

use crate::model::{Article, ArticleRow, Language};
use std::fmt::Write as _;
use tracing::warn;

/// Columns set on insert, in statement order.
pub const INSERT_COLUMNS: [&str; 11] = [
    "slug",
    "language",
    "title",
    "excerpt",
    "content",
    "content_format",
    "author",
    "category",
    "featured",
    "read_time",
    "published_at",
];

/// Columns overwritten when the `(slug, language)` key already exists.
pub const UPDATE_COLUMNS: [&str; 3] = ["title", "excerpt", "content"];

/// Quote a string literal, doubling embedded single quotes.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn opt_literal(s: Option<&str>) -> String {
    s.map(quote_literal).unwrap_or_else(|| "NULL".to_string())
}

/// The `ON CONFLICT` tail shared by generated scripts and the SQLite mirror.
pub fn conflict_clause() -> String {
    let mut out = String::from("ON CONFLICT (slug, language) DO UPDATE SET\n");
    for col in UPDATE_COLUMNS {
        let _ = writeln!(out, "  {col} = EXCLUDED.{col},");
    }
    out.push_str("  updated_at = CURRENT_TIMESTAMP");
    out
}

/// Render one idempotent upsert statement, terminated by `;`.
pub fn render_upsert(table: &str, row: &ArticleRow) -> String {
    let values = [
        quote_literal(&row.slug),
        quote_literal(row.language.as_str()),
        quote_literal(&row.title),
        opt_literal(row.excerpt.as_deref()),
        quote_literal(&row.content),
        quote_literal(&row.content_format),
        opt_literal(row.author.as_deref()),
        opt_literal(row.category.as_deref()),
        if row.featured { "TRUE" } else { "FALSE" }.to_string(),
        row.read_time
            .map(|m| m.to_string())
            .unwrap_or_else(|| "NULL".to_string()),
        opt_literal(row.published_at.as_deref()),
    ];
    format!(
        "INSERT INTO {table} ({})\nVALUES ({})\n{};\n",
        INSERT_COLUMNS.join(", "),
        values.join(", "),
        conflict_clause()
    )
}

/// Header written at the top of every generated script.
pub fn script_header(table: &str, generated_at: &str) -> String {
    format!(
        "-- Upsert script for {table}\n-- Generated at {generated_at}\n-- Safe to run repeatedly: each statement is keyed on (slug, language).\n\n"
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SqlValue {
    Text(String),
    Null,
    Bool(bool),
    Number(i64),
    Raw(String),
}

impl SqlValue {
    fn into_text(self) -> Option<String> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Split a script into statements on `;` outside string literals and
/// `--` comments.
fn split_statements(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            current.push(c);
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    current.push('\'');
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match c {
            '\'' => {
                in_string = true;
                current.push(c);
            }
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
                current.push('\n');
            }
            ';' => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    out.push(stmt.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// Return the contents of the parenthesized group starting at byte `open`,
/// honoring string literals, plus the index just after the closing paren.
fn paren_group(s: &str, open: usize) -> Option<(&str, usize)> {
    let bytes = s.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 1;
                } else {
                    in_string = false;
                }
            }
        } else {
            match b {
                b'\'' => in_string = true,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((&s[open + 1..i], i + 1));
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

fn parse_values(tuple: &str) -> Option<Vec<SqlValue>> {
    let mut values = Vec::new();
    let mut chars = tuple.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.peek() {
            None => break,
            Some('\'') => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next()? {
                        '\'' if chars.peek() == Some(&'\'') => {
                            chars.next();
                            s.push('\'');
                        }
                        '\'' => break,
                        c => s.push(c),
                    }
                }
                values.push(SqlValue::Text(s));
            }
            Some(_) => {
                let mut token = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ',' {
                        break;
                    }
                    token.push(c);
                    chars.next();
                }
                let token = token.trim();
                let value = match token.to_ascii_uppercase().as_str() {
                    "NULL" => SqlValue::Null,
                    "TRUE" => SqlValue::Bool(true),
                    "FALSE" => SqlValue::Bool(false),
                    _ => match token.parse::<i64>() {
                        Ok(n) => SqlValue::Number(n),
                        Err(_) => SqlValue::Raw(token.to_string()),
                    },
                };
                values.push(value);
            }
        }
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(_) => return None,
        }
    }
    Some(values)
}

fn parse_statement(stmt: &str) -> Option<Article> {
    let upper = stmt.to_ascii_uppercase();
    if !upper.starts_with("INSERT INTO") {
        return None;
    }
    let cols_open = stmt.find('(')?;
    let (cols, after_cols) = paren_group(stmt, cols_open)?;
    let values_at = after_cols + upper[after_cols..].find("VALUES")? + "VALUES".len();
    let values_open = values_at + stmt[values_at..].find('(')?;
    let (tuple, _) = paren_group(stmt, values_open)?;

    let columns: Vec<String> = cols
        .split(',')
        .map(|c| c.trim().trim_matches('"').to_ascii_lowercase())
        .collect();
    let values = parse_values(tuple)?;
    if columns.len() != values.len() {
        return None;
    }

    let mut slug = None;
    let mut language = None;
    let mut title = None;
    let mut content = None;
    let mut article = Article {
        slug: String::new(),
        language: Language::Es,
        title: String::new(),
        excerpt: None,
        content: String::new(),
        author: None,
        category: None,
        featured: false,
        read_time: None,
        published_at: None,
    };
    for (col, value) in columns.into_iter().zip(values) {
        match col.as_str() {
            "slug" => slug = value.into_text(),
            "language" => language = value.into_text().and_then(|l| Language::parse(&l)),
            "title" => title = value.into_text(),
            "content" => content = value.into_text(),
            "excerpt" => article.excerpt = value.into_text(),
            "author" => article.author = value.into_text(),
            "category" => article.category = value.into_text(),
            "published_at" => article.published_at = value.into_text(),
            "featured" => {
                article.featured = match value {
                    SqlValue::Bool(b) => b,
                    SqlValue::Number(n) => n != 0,
                    _ => false,
                }
            }
            "read_time" => {
                article.read_time = match value {
                    SqlValue::Number(n) => u32::try_from(n).ok(),
                    _ => None,
                }
            }
            _ => {}
        }
    }
    article.slug = slug.filter(|s| !s.is_empty())?;
    article.language = language?;
    article.title = title?;
    article.content = content?;
    Some(article)
}

/// Read articles back out of a generated upsert script. Statements that are
/// not recognizable upserts are skipped with a warning.
pub fn parse_upserts(text: &str) -> Vec<Article> {
    let mut articles = Vec::new();
    for (idx, stmt) in split_statements(text).into_iter().enumerate() {
        match parse_statement(&stmt) {
            Some(article) => articles.push(article),
            None => {
                let preview: String = stmt.chars().take(60).collect();
                warn!(statement = idx + 1, %preview, "skipping unrecognized SQL statement");
            }
        }
    }
    articles
}
