use chrono::{DateTime, Utc};
use feed_rs::parser;

/// A parsed syndication document, reduced to what aggregation needs.
///
/// Items keep document order; syndication feeds list newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

/// One entry of a [`Feed`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: Option<String>,
    /// Rich text, usually HTML.
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
    /// All links in document order; the first one is the canonical link.
    pub links: Vec<String>,
}

/// Parses RSS, Atom or JSON Feed bytes.
pub fn parse_feed(bytes: &[u8]) -> Result<Feed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| FeedItem {
            title: entry.title.map(|t| t.content),
            summary: entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body)),
            published: entry.published.or(entry.updated),
            links: entry.links.into_iter().map(|l| l.href).collect(),
        })
        .collect();

    Ok(Feed {
        title: feed.title.map(|t| t.content),
        items,
    })
}
