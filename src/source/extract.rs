//! Text extraction of article lists from JS/TS modules.
//!
//! A list is located with a bounding pattern (`articlesEs = [`, `articlesEs: [`
//! or `articlesEs: Article[] = [`), its body is split into top-level object
//! blocks, and each field is pulled out with its own pattern. Patterns run
//! over a view of the block where nested objects, comments and string
//! interiors are blanked, so neither `seo: { title: ... }` nor text inside
//! another field's value can shadow the article's own `title`. Values are
//! then read from the original block at the matched offsets.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::{SourceError, SourceLists};
use crate::config::ListNames;
use crate::model::{Article, Language};

const STRING_VALUE: &str =
    r#"(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'|`((?:[^`\\]|\\.)*)`)"#;

fn key_prefix(key: &str) -> String {
    format!(r#"(?ms)(?:^|[{{,])\s*["']?{}["']?\s*:\s*"#, regex::escape(key))
}

fn string_field(key: &str) -> Regex {
    Regex::new(&format!("{}{}", key_prefix(key), STRING_VALUE)).expect("valid field pattern")
}

static SLUG: Lazy<Regex> = Lazy::new(|| string_field("slug"));
static TITLE: Lazy<Regex> = Lazy::new(|| string_field("title"));
static EXCERPT: Lazy<Regex> = Lazy::new(|| string_field("excerpt"));
static CONTENT: Lazy<Regex> = Lazy::new(|| string_field("content"));
static AUTHOR: Lazy<Regex> = Lazy::new(|| string_field("author"));
static CATEGORY: Lazy<Regex> = Lazy::new(|| string_field("category"));
static DATES: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        string_field("publishedAt"),
        string_field("published_at"),
        string_field("date"),
    ]
});
static READ_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"{}(?:(\d+)|{})", key_prefix("readTime"), STRING_VALUE))
        .expect("valid pattern")
});
static FEATURED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"{}(true|false)\b", key_prefix("featured"))).expect("valid pattern")
});

fn list_pattern(name: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"\b{}\s*(?::\s*[A-Za-z_][\w<>,\s]*(?:\[\])?\s*)?[=:]\s*\[",
        regex::escape(name)
    ))
}

/// Byte scanner that steps over string literals and comments.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str, pos: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos,
        }
    }

    /// Advance past a string literal or comment starting at `pos`, returning
    /// true if one was skipped.
    fn skip_literal(&mut self) -> bool {
        let b = self.bytes[self.pos];
        match b {
            b'"' | b'\'' | b'`' => {
                self.pos += 1;
                while self.pos < self.bytes.len() {
                    match self.bytes[self.pos] {
                        b'\\' => self.pos += 2,
                        c if c == b => {
                            self.pos += 1;
                            return true;
                        }
                        _ => self.pos += 1,
                    }
                }
                true
            }
            b'/' if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                    self.pos += 1;
                }
                true
            }
            b'/' if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                self.pos += 2;
                while self.pos + 1 < self.bytes.len()
                    && !(self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/')
                {
                    self.pos += 1;
                }
                self.pos = (self.pos + 2).min(self.bytes.len());
                true
            }
            _ => false,
        }
    }

    /// Position of the bracket closing the one at `pos`.
    fn matching_close(mut self) -> Option<usize> {
        let mut depth = 0usize;
        while self.pos < self.bytes.len() {
            if self.skip_literal() {
                continue;
            }
            match self.bytes[self.pos] {
                b'[' | b'{' | b'(' => depth += 1,
                b']' | b'}' | b')' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(self.pos);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        None
    }
}

/// Locate the body of the array literal bound to `name`.
fn find_list<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let pattern = list_pattern(name).ok()?;
    let m = pattern.find(text)?;
    let open = m.end() - 1;
    let close = Scanner::new(text, open).matching_close()?;
    Some(&text[open + 1..close])
}

/// Split an array body into its top-level `{ ... }` blocks.
fn split_objects(body: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut scanner = Scanner::new(body, 0);
    while scanner.pos < scanner.bytes.len() {
        if scanner.skip_literal() {
            continue;
        }
        if scanner.bytes[scanner.pos] == b'{' {
            let start = scanner.pos;
            match Scanner::new(body, start).matching_close() {
                Some(end) => {
                    blocks.push(&body[start..=end]);
                    scanner.pos = end + 1;
                }
                None => {
                    warn!(offset = start, "unterminated article block");
                    break;
                }
            }
        } else {
            scanner.pos += 1;
        }
    }
    blocks
}

/// Copy of `block` with nested bracket regions, comments and string-literal
/// interiors replaced by spaces. Quotes are kept and byte offsets match
/// `block`.
fn top_level_view(block: &str) -> String {
    let bytes = block.as_bytes();
    let mut out = bytes.to_vec();
    let mut scanner = Scanner::new(block, 1);
    let end = block.len().saturating_sub(1);
    while scanner.pos < end {
        let start = scanner.pos;
        if scanner.skip_literal() {
            let stop = scanner.pos.min(end);
            if is_property_key(bytes, start, stop) {
                continue;
            }
            let (from, to) = match bytes[start] {
                q @ (b'"' | b'\'' | b'`') if stop > start + 1 && bytes[stop - 1] == q => {
                    (start + 1, stop - 1)
                }
                b'"' | b'\'' | b'`' => (start + 1, stop),
                _ => (start, stop),
            };
            blank(&mut out[from..to]);
            continue;
        }
        match bytes[start] {
            b'{' | b'[' | b'(' => {
                let close = Scanner::new(block, start).matching_close().unwrap_or(end);
                blank(&mut out[start..=close.min(end)]);
                scanner.pos = close + 1;
            }
            _ => scanner.pos += 1,
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| " ".repeat(block.len()))
}

/// A quoted literal followed by `:` names a property and stays visible.
fn is_property_key(bytes: &[u8], start: usize, stop: usize) -> bool {
    matches!(bytes[start], b'"' | b'\'')
        && bytes[stop..]
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b':')
}

fn blank(region: &mut [u8]) {
    region.fill(b' ');
}

/// Decode JS string escapes.
pub fn unescape_js(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\n') => {}
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\x");
                        out.push_str(&hex);
                    }
                }
            }
            Some('u') => {
                let hex: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Text of the first participating group of `re` matched against `view`,
/// taken from `block` at the same offsets.
fn capture_raw<'a>(re: &Regex, view: &str, block: &'a str) -> Option<&'a str> {
    let caps = re.captures(view)?;
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .and_then(|m| block.get(m.range()))
}

fn capture_string(re: &Regex, view: &str, block: &str) -> Option<String> {
    capture_raw(re, view, block).map(unescape_js)
}

fn leading_number(raw: &str) -> Option<u32> {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Extract one article from an object block. Returns None when a required
/// field (`slug`, `title`, `content`) is missing.
pub fn extract_article(block: &str, language: Language) -> Option<Article> {
    let view = top_level_view(block);
    let slug = capture_string(&SLUG, &view, block).filter(|s| !s.trim().is_empty())?;
    let title = capture_string(&TITLE, &view, block)?;
    let content = capture_string(&CONTENT, &view, block)?;
    Some(Article {
        slug,
        language,
        title,
        excerpt: capture_string(&EXCERPT, &view, block),
        content,
        author: capture_string(&AUTHOR, &view, block),
        category: capture_string(&CATEGORY, &view, block),
        featured: FEATURED
            .captures(&view)
            .map(|c| &c[1] == "true")
            .unwrap_or(false),
        read_time: capture_raw(&READ_TIME, &view, block).and_then(leading_number),
        published_at: DATES
            .iter()
            .find_map(|re| capture_string(re, &view, block)),
    })
}

fn extract_list(body: &str, list: &str, language: Language) -> Vec<Article> {
    split_objects(body)
        .into_iter()
        .enumerate()
        .filter_map(|(idx, block)| {
            let article = extract_article(block, language);
            if article.is_none() {
                warn!(list, index = idx, "skipping malformed article entry");
            }
            article
        })
        .collect()
}

/// Extract both language lists from script text.
pub fn extract_lists(text: &str, names: &ListNames) -> Result<SourceLists, SourceError> {
    let es = find_list(text, &names.es);
    let en = find_list(text, &names.en);
    if es.is_none() && en.is_none() {
        return Err(SourceError::ListsNotFound {
            es: names.es.clone(),
            en: names.en.clone(),
        });
    }
    if es.is_none() {
        warn!(list = %names.es, "article list not found; treating as empty");
    }
    if en.is_none() {
        warn!(list = %names.en, "article list not found; treating as empty");
    }
    Ok(SourceLists {
        es: es
            .map(|body| extract_list(body, &names.es, Language::Es))
            .unwrap_or_default(),
        en: en
            .map(|body| extract_list(body, &names.en, Language::En))
            .unwrap_or_default(),
    })
}
