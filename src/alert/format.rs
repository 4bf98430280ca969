use crate::{domain::Post, timeline::StatKind};

pub const DEFAULT_TITLE: &str = "@{username} posted a new tweet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    /// Short line used by voice/SMS channels.
    pub brief: String,
    pub details: String,
}

pub fn format_alert(post: &Post, title: Option<&str>) -> AlertMessage {
    let brief = title
        .unwrap_or(DEFAULT_TITLE)
        .replace("{username}", &post.username);

    let mut details = format!(
        "🐦 @{} posted a new tweet\n\n📝 Content:\n{}\n\n🕒 Time: {}\n",
        post.username, post.content, post.time_token
    );
    if let Some(stats) = format_stats(post) {
        details.push_str("📊 Stats: ");
        details.push_str(&stats);
        details.push('\n');
    }
    details.push_str("🔗 Link: ");
    details.push_str(&post.url);

    AlertMessage { brief, details }
}

/// Present stats in fixed order, or `None` when the post carries none.
pub fn format_stats(post: &Post) -> Option<String> {
    let parts: Vec<String> = StatKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let value = post.stats.get(kind.name())?;
            let icon = match kind {
                StatKind::Comments => "💬",
                StatKind::Retweets => "🔁",
                StatKind::Likes => "❤️",
            };
            Some(format!("{icon} {value}"))
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}
