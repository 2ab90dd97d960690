use crate::feed::parser::{Feed, FeedItem};
use crate::util::normalize_title;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use thiserror::Error;

/// Invariant short date (month/day/year).
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// Errors raised while turning a feed into a post.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The feed parsed fine but lists no entries
    #[error("Feed has no items")]
    EmptyFeed,
}

#[derive(Debug, Error)]
#[error("Invalid date format pattern: {0:?}")]
pub struct InvalidDateFormat(pub String);

/// A validated `strftime` pattern for publish dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat(String);

impl DateFormat {
    pub fn new(pattern: &str) -> Result<Self, InvalidDateFormat> {
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(InvalidDateFormat(pattern.to_string()));
        }
        Ok(Self(pattern.to_string()))
    }

    pub fn format(&self, date: &DateTime<Utc>) -> String {
        let mut out = String::new();
        if write!(out, "{}", date.format(&self.0)).is_err() {
            out.clear();
        }
        out
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self(DEFAULT_DATE_FORMAT.to_string())
    }
}

/// The latest entry of one feed, flattened to display fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtractedPost {
    pub title: String,
    /// HTML as published by the feed, not sanitized.
    pub summary: String,
    /// Empty when the entry carries no date.
    pub publish_date: String,
    /// First link of the entry, empty when it has none.
    pub link: String,
}

/// One aggregated feed: its title plus its latest post.
///
/// `items` is a single post, not a list; only the newest entry is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeedDigest {
    pub title: String,
    pub items: ExtractedPost,
}

/// Picks the first item of `feed` as its latest post.
///
/// Feeds are expected newest-first, so no sorting happens here.
///
/// # Errors
///
/// [`ExtractError::EmptyFeed`] when the feed has no items.
pub fn extract_latest(feed: &Feed, date_format: &DateFormat) -> Result<ExtractedPost, ExtractError> {
    let item = feed.items.first().ok_or(ExtractError::EmptyFeed)?;
    Ok(to_post(item, date_format))
}

/// Like [`extract_latest`], paired with the feed title.
pub fn digest(feed: &Feed, date_format: &DateFormat) -> Result<FeedDigest, ExtractError> {
    let items = extract_latest(feed, date_format)?;
    Ok(FeedDigest {
        title: feed.title.as_deref().map(normalize_title).unwrap_or_default(),
        items,
    })
}

fn to_post(item: &FeedItem, date_format: &DateFormat) -> ExtractedPost {
    ExtractedPost {
        title: item.title.as_deref().map(normalize_title).unwrap_or_default(),
        summary: item.summary.clone().unwrap_or_default(),
        publish_date: item
            .published
            .as_ref()
            .map(|date| date_format.format(date))
            .unwrap_or_default(),
        link: item.links.first().cloned().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn item(title: &str, day: u32) -> FeedItem {
        FeedItem {
            title: Some(title.to_string()),
            summary: Some(format!("<p>{title}</p>")),
            published: Some(Utc.with_ymd_and_hms(2024, 2, day, 8, 0, 0).unwrap()),
            links: vec![
                format!("https://blog.example/{title}"),
                format!("https://mirror.example/{title}"),
            ],
        }
    }

    #[test]
    fn test_first_item_wins_without_sorting() {
        let feed = Feed {
            title: Some("Blog".to_string()),
            // Deliberately oldest date first: position decides, not date
            items: vec![item("T2", 1), item("T1", 20)],
        };

        let post = extract_latest(&feed, &DateFormat::default()).unwrap();
        assert_eq!(post.title, "T2");
    }

    #[test]
    fn test_fields_are_normalized() {
        let feed = Feed {
            title: Some("  My\n Blog ".to_string()),
            items: vec![item("T2", 9)],
        };

        let digest = digest(&feed, &DateFormat::default()).unwrap();
        assert_eq!(
            digest,
            FeedDigest {
                title: "My Blog".to_string(),
                items: ExtractedPost {
                    title: "T2".to_string(),
                    summary: "<p>T2</p>".to_string(),
                    publish_date: "02/09/2024".to_string(),
                    link: "https://blog.example/T2".to_string(),
                },
            }
        );
    }

    #[test]
    fn test_empty_feed_is_error() {
        let feed = Feed {
            title: Some("Quiet".to_string()),
            items: vec![],
        };
        assert_eq!(
            extract_latest(&feed, &DateFormat::default()),
            Err(ExtractError::EmptyFeed)
        );
    }

    #[test]
    fn test_missing_fields_become_empty_strings() {
        let feed = Feed {
            title: None,
            items: vec![FeedItem::default()],
        };

        let digest = digest(&feed, &DateFormat::default()).unwrap();
        assert_eq!(digest.title, "");
        assert_eq!(digest.items.title, "");
        assert_eq!(digest.items.summary, "");
        assert_eq!(digest.items.publish_date, "");
        assert_eq!(digest.items.link, "");
    }

    #[test]
    fn test_custom_date_format() {
        let format = DateFormat::new("%Y-%m-%d").unwrap();
        let feed = Feed {
            title: None,
            items: vec![item("T", 3)],
        };
        let post = extract_latest(&feed, &format).unwrap();
        assert_eq!(post.publish_date, "2024-02-03");
    }

    #[test]
    fn test_invalid_date_format_rejected() {
        assert!(DateFormat::new("%Q").is_err());
        assert!(DateFormat::new("%d.%m.%Y").is_ok());
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(FeedDigest {
            title: "B".to_string(),
            items: ExtractedPost {
                title: "P".to_string(),
                summary: "S".to_string(),
                publish_date: "01/01/2024".to_string(),
                link: "L".to_string(),
            },
        })
        .unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "Title": "B",
                "Items": {
                    "Title": "P",
                    "Summary": "S",
                    "PublishDate": "01/01/2024",
                    "Link": "L"
                }
            })
        );
    }
}
