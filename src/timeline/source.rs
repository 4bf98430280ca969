use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

/// Tree-query capability over a timeline page, independent of the markup library.
pub trait TimelineSource {
    type Item<'a>: TimelineItem
    where
        Self: 'a;

    /// Candidate post nodes of the timeline container in document order, at most
    /// `limit` of them. `None` when the page has no timeline container.
    fn items(&self, limit: usize) -> Option<Vec<Self::Item<'_>>>;
}

pub trait TimelineItem {
    /// "Load more" rows and similar non-post entries.
    fn is_placeholder(&self) -> bool;
    /// Href of the link pointing at the post's status page.
    fn status_href(&self) -> Option<String>;
    /// Visible text of the post body, whitespace-collapsed.
    fn content(&self) -> String;
    fn date_label(&self) -> Option<String>;
    /// Display text next to the icon of `stat`.
    fn stat(&self, stat: StatKind) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Comments,
    Retweets,
    Likes,
}

impl StatKind {
    pub const ALL: [StatKind; 3] = [StatKind::Comments, StatKind::Retweets, StatKind::Likes];

    pub fn name(self) -> &'static str {
        match self {
            StatKind::Comments => "comments",
            StatKind::Retweets => "retweets",
            StatKind::Likes => "likes",
        }
    }

    fn icon_selector(self) -> &'static Selector {
        match self {
            StatKind::Comments => &*ICON_COMMENT,
            StatKind::Retweets => &*ICON_RETWEET,
            StatKind::Likes => &*ICON_HEART,
        }
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid timeline selector")
}

static TIMELINE: Lazy<Selector> = Lazy::new(|| selector("div.timeline"));
static TIMELINE_ITEM: Lazy<Selector> = Lazy::new(|| selector("div.timeline-item"));
static TWEET_LINK: Lazy<Selector> = Lazy::new(|| selector("a.tweet-link"));
static DATE_LINK: Lazy<Selector> = Lazy::new(|| selector(".tweet-date a"));
static TWEET_CONTENT: Lazy<Selector> = Lazy::new(|| selector("div.tweet-content"));
static TWEET_DATE: Lazy<Selector> = Lazy::new(|| selector("span.tweet-date, a.tweet-date"));
static TWEET_STATS: Lazy<Selector> = Lazy::new(|| selector("div.tweet-stats"));
static ICON_COMMENT: Lazy<Selector> = Lazy::new(|| selector("span.icon-comment"));
static ICON_RETWEET: Lazy<Selector> = Lazy::new(|| selector("span.icon-retweet"));
static ICON_HEART: Lazy<Selector> = Lazy::new(|| selector("span.icon-heart"));

/// Nitter-style markup (`.timeline > .timeline-item`).
pub struct NitterPage {
    document: Html,
}

impl NitterPage {
    pub fn parse(markup: &str) -> Self {
        Self {
            document: Html::parse_document(markup),
        }
    }
}

impl TimelineSource for NitterPage {
    type Item<'a> = NitterItem<'a>;

    fn items(&self, limit: usize) -> Option<Vec<NitterItem<'_>>> {
        let timeline = self.document.select(&TIMELINE).next()?;
        Some(
            timeline
                .select(&TIMELINE_ITEM)
                .take(limit)
                .map(NitterItem)
                .collect(),
        )
    }
}

pub struct NitterItem<'a>(ElementRef<'a>);

impl TimelineItem for NitterItem<'_> {
    fn is_placeholder(&self) -> bool {
        self.0.value().classes().any(|class| class == "show-more")
    }

    fn status_href(&self) -> Option<String> {
        self.0
            .select(&TWEET_LINK)
            .chain(self.0.select(&DATE_LINK))
            .filter_map(|link| link.value().attr("href"))
            .find(|href| href.contains("/status/"))
            .map(str::to_string)
    }

    fn content(&self) -> String {
        self.0
            .select(&TWEET_CONTENT)
            .next()
            .map(|el| joined_text(el, " "))
            .unwrap_or_default()
    }

    fn date_label(&self) -> Option<String> {
        self.0
            .select(&TWEET_DATE)
            .next()
            .map(|el| joined_text(el, ""))
    }

    fn stat(&self, stat: StatKind) -> Option<String> {
        let stats = self.0.select(&TWEET_STATS).next()?;
        let icon = stats.select(stat.icon_selector()).next()?;
        let holder = icon.parent().and_then(ElementRef::wrap)?;
        Some(joined_text(holder, ""))
    }
}

fn joined_text(el: ElementRef<'_>, separator: &str) -> String {
    el.text()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}
