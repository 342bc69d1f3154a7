//! Defines the [`TagIndex`] type, which groups [`Article`]s by tag.

use crate::article::Article;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Maps each tag to the non-hidden articles carrying it, newest first. Tags
/// are kept in sorted order so that anything derived from the index (e.g.,
/// the `tags` object in `global.json`) is stable from one build to the next.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct TagIndex<'a>(BTreeMap<String, Vec<&'a Article>>);

impl<'a> TagIndex<'a> {
    /// Indexes `articles`. Hidden articles are skipped. Within a tag,
    /// articles are ordered by `create_date` descending; articles without one
    /// come last, and ties keep their input order.
    pub fn build<I>(articles: I) -> TagIndex<'a>
    where
        I: IntoIterator<Item = &'a Article>,
    {
        let buckets = articles.into_iter().filter(|article| !article.hidden).fold(
            BTreeMap::new(),
            |mut buckets: BTreeMap<String, Vec<&'a Article>>, article| {
                for tag in &article.tags {
                    buckets.entry(tag.clone()).or_default().push(article);
                }
                buckets
            },
        );

        TagIndex(
            buckets
                .into_iter()
                .map(|(tag, mut bucket)| {
                    bucket.sort_by(|a, b| newest_first(a, b));
                    (tag, bucket)
                })
                .collect(),
        )
    }

    /// Returns the articles for `tag`, or `None` if no visible article has it.
    pub fn get(&self, tag: &str) -> Option<&[&'a Article]> {
        self.0.get(tag).map(|bucket| bucket.as_slice())
    }

    /// Iterates over tags in sorted order along with their articles.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[&'a Article])> {
        self.0
            .iter()
            .map(|(tag, bucket)| (tag.as_str(), bucket.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn newest_first(a: &Article, b: &Article) -> Ordering {
    let key = |article: &Article| article.create_date.unwrap_or(f64::NEG_INFINITY);
    key(b).total_cmp(&key(a))
}
