use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Characters that separate identifiers in a feed list file.
const DELIMITERS: [char; 4] = ['\r', '\n', ';', ' '];

/// Errors raised while reading the feed list itself.
///
/// Both variants are fatal for an aggregation pass: without the list there
/// is nothing to fetch.
#[derive(Debug, Error)]
pub enum SourceListError {
    /// The feed list file does not exist.
    #[error("Feed list file not found: {}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Any other failure while reading the feed list file.
    #[error("Failed to read feed list file: {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single feed source identifier (URL or local path).
///
/// Surrounding whitespace is trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FeedSource(String);

impl FeedSource {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.len() == id.len() {
            Self(id)
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeedSource {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Splits a feed list into source identifiers.
///
/// Identifiers may be separated by carriage returns, line feeds, semicolons
/// or spaces. Empty tokens are discarded, so any mix of separators is fine
/// and an empty input gives an empty list.
///
/// # Examples
///
/// ```
/// use blogroll::feed::parse_sources;
///
/// let sources = parse_sources("https://a.example/feed\nhttps://b.example/feed;https://c.example/feed");
/// assert_eq!(sources.len(), 3);
/// assert_eq!(sources[1].as_str(), "https://b.example/feed");
/// ```
pub fn parse_sources(raw: &str) -> Vec<FeedSource> {
    raw.split(DELIMITERS)
        .filter(|token| !token.is_empty())
        .map(FeedSource::new)
        .filter(|source| !source.is_empty())
        .collect()
}

/// Reads and parses the feed list file at `path`.
///
/// # Errors
///
/// - [`SourceListError::NotFound`] if the file does not exist
/// - [`SourceListError::Io`] for any other read failure (permissions,
///   invalid UTF-8, path is a directory, ...)
pub async fn load_sources(path: &Path) -> Result<Vec<FeedSource>, SourceListError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SourceListError::NotFound {
                path: path.to_path_buf(),
                source: e,
            }
        } else {
            SourceListError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let sources = parse_sources(&content);
    tracing::debug!(path = %path.display(), count = sources.len(), "Loaded feed list");
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ids(sources: &[FeedSource]) -> Vec<&str> {
        sources.iter().map(FeedSource::as_str).collect()
    }

    #[test]
    fn test_mixed_delimiters() {
        let sources =
            parse_sources("https://a.example/feed\nhttps://b.example/feed;https://c.example/feed");
        assert_eq!(
            ids(&sources),
            vec![
                "https://a.example/feed",
                "https://b.example/feed",
                "https://c.example/feed"
            ]
        );
    }

    #[test]
    fn test_crlf_and_repeated_separators() {
        let sources = parse_sources("\r\n\r\nhttps://a.example/rss;;  ;\r\nhttps://b.example/atom \r\n");
        assert_eq!(
            ids(&sources),
            vec!["https://a.example/rss", "https://b.example/atom"]
        );
    }

    #[test]
    fn test_empty_input_gives_empty_list() {
        assert!(parse_sources("").is_empty());
        assert!(parse_sources(" ;\r\n ; ").is_empty());
    }

    #[test]
    fn test_tabs_are_not_separators() {
        // Only CR, LF, ';' and ' ' split; a tab is trimmed from the token edges
        let sources = parse_sources("\thttps://a.example/feed\t");
        assert_eq!(ids(&sources), vec!["https://a.example/feed"]);
    }

    #[test]
    fn test_feed_source_trims() {
        assert_eq!(FeedSource::new("  x  ").as_str(), "x");
        assert!(FeedSource::new("   ").is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_not_found() {
        let path = Path::new("/tmp/blogroll_test_missing_feed_list.txt");
        let err = load_sources(path).await.unwrap_err();
        assert!(matches!(err, SourceListError::NotFound { .. }));
        assert!(err.to_string().contains("blogroll_test_missing_feed_list.txt"));
    }

    #[tokio::test]
    async fn test_load_directory_is_io_error() {
        let dir = std::env::temp_dir().join("blogroll_sources_test_dir");
        std::fs::create_dir_all(&dir).unwrap();

        let err = load_sources(&dir).await.unwrap_err();
        assert!(matches!(err, SourceListError::Io { .. }));
        assert!(err.to_string().contains("blogroll_sources_test_dir"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_load_file() {
        let dir = std::env::temp_dir().join("blogroll_sources_test_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.txt");
        std::fs::write(&path, "https://a.example/feed;https://b.example/feed\n").unwrap();

        let sources = load_sources(&path).await.unwrap();
        assert_eq!(
            ids(&sources),
            vec!["https://a.example/feed", "https://b.example/feed"]
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    proptest! {
        #[test]
        fn prop_tokens_never_contain_delimiters(raw in "[a-z:/.;\r\n ]{0,64}") {
            for source in parse_sources(&raw) {
                prop_assert!(!source.is_empty());
                prop_assert!(!source.as_str().contains(DELIMITERS));
            }
        }

        #[test]
        fn prop_joined_tokens_round_trip(
            tokens in proptest::collection::vec("[a-z0-9./:]{1,20}", 0..8),
            sep in prop::sample::select(vec!["\n", "\r\n", ";", " ", " ;\n"]),
        ) {
            let raw = tokens.join(sep);
            let parsed = parse_sources(&raw);
            let parsed: Vec<&str> = parsed.iter().map(FeedSource::as_str).collect();
            prop_assert_eq!(parsed, tokens.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
