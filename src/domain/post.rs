use std::collections::BTreeMap;

/// Interaction counters in display form, keyed by stat name.
pub type PostStats = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub username: String,
    pub content: String,
    pub time_token: String,
    pub url: String,
    pub stats: PostStats,
}

/// Dedup key of a post: hex md5 of its canonical url.
pub fn fingerprint(canonical_url: &str) -> String {
    format!("{:x}", md5::compute(canonical_url.as_bytes()))
}
