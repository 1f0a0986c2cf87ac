//! Diff filter: drop candidates whose key already exists at the destination.

use std::collections::HashSet;

use crate::model::{Article, ArticleKey};

/// Keys considered already present at the destination.
///
/// Slugs match in either language (the hand-maintained list in config);
/// full keys come from a live existence query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownKeys {
    slugs: HashSet<String>,
    keys: HashSet<ArticleKey>,
}

impl KnownKeys {
    pub fn from_slugs<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slugs: slugs.into_iter().map(Into::into).collect(),
            keys: HashSet::new(),
        }
    }

    pub fn extend_keys<I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = ArticleKey>,
    {
        self.keys.extend(keys);
    }

    pub fn contains(&self, key: &ArticleKey) -> bool {
        self.slugs.contains(&key.slug) || self.keys.contains(key)
    }
}

/// Keep the articles whose key is not known, preserving input order.
pub fn filter_new(articles: Vec<Article>, known: &KnownKeys) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|a| !known.contains(&a.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Language;

    fn article(slug: &str, language: Language) -> Article {
        Article {
            slug: slug.into(),
            language,
            title: "T".into(),
            excerpt: None,
            content: "C".into(),
            author: None,
            category: None,
            featured: false,
            read_time: None,
            published_at: None,
        }
    }

    #[test]
    fn known_slugs_match_both_languages() {
        let known = KnownKeys::from_slugs(["a-1"]);
        let input = vec![
            article("a-1", Language::Es),
            article("a-2", Language::Es),
            article("a-1", Language::En),
            article("a-3", Language::En),
        ];
        let kept: Vec<String> = filter_new(input, &known)
            .into_iter()
            .map(|a| a.slug)
            .collect();
        assert_eq!(kept, vec!["a-2", "a-3"]);
    }

    #[test]
    fn full_keys_match_only_their_language() {
        let mut known = KnownKeys::default();
        known.extend_keys([ArticleKey::new("a-1", Language::Es)]);
        let kept = filter_new(
            vec![article("a-1", Language::Es), article("a-1", Language::En)],
            &known,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].language, Language::En);
    }

    #[test]
    fn empty_known_set_keeps_everything_in_order() {
        let input = vec![article("z", Language::En), article("a", Language::Es)];
        let kept = filter_new(input.clone(), &KnownKeys::default());
        assert_eq!(kept, input);
    }
}
