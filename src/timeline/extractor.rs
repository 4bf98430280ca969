use anyhow::{Context, Result};
use url::Url;

use crate::domain::{fingerprint, Post, PostStats};

use super::source::{NitterPage, StatKind, TimelineItem, TimelineSource};

/// Mirrors list newest first; anything past this is old news.
pub const MAX_ITEMS: usize = 10;
pub const MAX_CONTENT_CHARS: usize = 500;

#[derive(Debug)]
enum Skip {
    Placeholder,
    NoStatusLink,
    EmptyContent,
}

#[derive(Debug, Clone)]
pub struct PostExtractor {
    link_base: Url,
}

impl PostExtractor {
    pub fn new(link_base: &str) -> Result<Self> {
        let link_base =
            Url::parse(link_base).with_context(|| format!("invalid link base {link_base}"))?;
        Ok(Self { link_base })
    }

    /// Parses `markup` into posts. A page without a timeline yields an empty list.
    pub fn extract(&self, markup: &str, username: &str) -> Vec<Post> {
        self.extract_from(&NitterPage::parse(markup), username)
    }

    pub fn extract_from<S: TimelineSource>(&self, source: &S, username: &str) -> Vec<Post> {
        let Some(items) = source.items(MAX_ITEMS) else {
            tracing::warn!(target: "extract", username, "timeline container not found");
            return Vec::new();
        };
        tracing::debug!(target: "extract", username, candidates = items.len(), "found timeline items");

        let mut posts = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match self.parse_item(item, username) {
                Ok(Ok(post)) => posts.push(post),
                Ok(Err(skip)) => {
                    tracing::trace!(target: "extract", index, reason = ?skip, "skipped timeline item");
                }
                Err(err) => {
                    tracing::warn!(target: "extract", index, error = %err, "failed to parse timeline item");
                }
            }
        }
        posts
    }

    fn parse_item<I: TimelineItem>(
        &self,
        item: &I,
        username: &str,
    ) -> Result<std::result::Result<Post, Skip>> {
        if item.is_placeholder() {
            return Ok(Err(Skip::Placeholder));
        }
        let Some(href) = item.status_href() else {
            return Ok(Err(Skip::NoStatusLink));
        };
        let content = item.content();
        if content.is_empty() {
            return Ok(Err(Skip::EmptyContent));
        }

        let url = self.canonical_url(&href)?;
        let stats: PostStats = StatKind::ALL
            .into_iter()
            .filter_map(|kind| {
                item.stat(kind)
                    .filter(|text| !text.is_empty() && text != "0")
                    .map(|text| (kind.name().to_string(), text))
            })
            .collect();

        Ok(Ok(Post {
            id: fingerprint(&url),
            username: username.to_string(),
            content: truncate_chars(&content, MAX_CONTENT_CHARS),
            time_token: item.date_label().unwrap_or_default(),
            url,
            stats,
        }))
    }

    /// Rebases the status path onto the link base and drops query and fragment,
    /// so every mirror yields the same url for the same post.
    fn canonical_url(&self, href: &str) -> Result<String> {
        let resolved = self
            .link_base
            .join(href)
            .with_context(|| format!("unusable status link {href}"))?;
        let mut canonical = self
            .link_base
            .join(resolved.path())
            .with_context(|| format!("unusable status path {}", resolved.path()))?;
        canonical.set_query(None);
        canonical.set_fragment(None);
        Ok(canonical.to_string())
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
