//! JSON rendering of aggregation results.
//!
//! All output goes through one [`SerializerOptions`] value built at startup,
//! so every response shares the same layout. Rendering happens into a
//! buffer first; callers either get the complete document or an error.

use crate::feed::{FeedDigest, FeedSource};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use thiserror::Error;

const DEFAULT_INDENT: usize = 2;

#[derive(Debug, Error)]
pub enum SerializeError {
    /// The value contains something JSON cannot express (e.g. non-string map keys)
    #[error("Unsupported value for JSON output: {0}")]
    Unsupported(#[from] serde_json::Error),
    #[error("JSON output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Immutable layout settings for JSON output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializerOptions {
    indent: String,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self::with_indent(DEFAULT_INDENT)
    }
}

impl SerializerOptions {
    /// Pretty-printing with `width` spaces per nesting level.
    pub fn with_indent(width: usize) -> Self {
        Self {
            indent: " ".repeat(width),
        }
    }

    /// Renders `value` as indented JSON.
    ///
    /// Nothing is returned unless the whole value serialized successfully.
    pub fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, SerializeError> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(self.indent.as_bytes());
        let mut serializer = Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut serializer)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Entry of the feed listing output.
#[derive(Debug, Serialize)]
struct SourceEntry<'a> {
    #[serde(rename = "feedUrl")]
    feed_url: &'a FeedSource,
}

/// Renders aggregated posts as a JSON array, preserving order.
pub fn serialize_posts(
    posts: &[FeedDigest],
    options: &SerializerOptions,
) -> Result<String, SerializeError> {
    options.to_json(posts)
}

/// Renders the feed list as `[{"feedUrl": ...}, ...]`.
pub fn serialize_sources(
    sources: &[FeedSource],
    options: &SerializerOptions,
) -> Result<String, SerializeError> {
    let entries: Vec<SourceEntry<'_>> = sources
        .iter()
        .map(|feed_url| SourceEntry { feed_url })
        .collect();
    options.to_json(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ExtractedPost;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn post(feed: &str, title: &str) -> FeedDigest {
        FeedDigest {
            title: feed.to_string(),
            items: ExtractedPost {
                title: title.to_string(),
                summary: format!("<p>{title} &amp; more</p>"),
                publish_date: "03/15/2024".to_string(),
                link: format!("https://{feed}.example/{title}"),
            },
        }
    }

    #[test]
    fn test_posts_layout() {
        let json = serialize_posts(&[post("a", "One")], &SerializerOptions::default()).unwrap();
        let expected = r#"[
  {
    "Title": "a",
    "Items": {
      "Title": "One",
      "Summary": "<p>One &amp; more</p>",
      "PublishDate": "03/15/2024",
      "Link": "https://a.example/One"
    }
  }
]"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn test_posts_reparse_keeps_order_and_values() {
        let posts = vec![post("a", "One"), post("b", "Two"), post("c", "Three")];
        let json = serialize_posts(&posts, &SerializerOptions::default()).unwrap();

        let parsed: Vec<FeedDigest> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, posts);
    }

    #[test]
    fn test_empty_result() {
        let json = serialize_posts(&[], &SerializerOptions::default()).unwrap();
        assert_eq!(json, "[]");
    }

    #[test]
    fn test_custom_indent() {
        let json = SerializerOptions::with_indent(4)
            .to_json(&vec![1, 2])
            .unwrap();
        assert_eq!(json, "[\n    1,\n    2\n]");
    }

    #[test]
    fn test_sources_layout() {
        let sources = vec![
            FeedSource::new("https://a.example/feed"),
            FeedSource::new("https://b.example/feed"),
        ];
        let json = serialize_sources(&sources, &SerializerOptions::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                { "feedUrl": "https://a.example/feed" },
                { "feedUrl": "https://b.example/feed" }
            ])
        );
    }

    #[test]
    fn test_unsupported_value_fails_whole_document() {
        let mut bad = HashMap::new();
        bad.insert((1, 2), "tuple keys are not JSON");

        let err = SerializerOptions::default().to_json(&bad).unwrap_err();
        assert!(matches!(err, SerializeError::Unsupported(_)));
    }
}
