//! The operations exposed to callers: latest posts and the feed listing.
//!
//! Per-feed problems are absorbed by the aggregator. Only failures that
//! leave nothing meaningful to return (unreadable feed list, aborted pass,
//! serialization error) surface as [`ServiceError`].

use crate::config::Config;
use crate::feed::{
    load_sources, AggregateError, Aggregator, FeedFetcher, FeedSource, HttpFetcher,
    InvalidDateFormat, SourceListError,
};
use crate::output::{serialize_posts, serialize_sources, SerializeError, SerializerOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Feed list unavailable: {0}")]
    SourceListUnavailable(#[from] SourceListError),
    #[error("Aggregation failed: {0}")]
    Aggregation(#[from] AggregateError),
    #[error("Failed to serialize result: {0}")]
    Serialization(#[from] SerializeError),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] InvalidDateFormat),
}

/// Feed list location, aggregator and output layout, ready to serve requests.
pub struct Blogroll<F> {
    feeds_file: PathBuf,
    aggregator: Aggregator<F>,
    serializer: SerializerOptions,
}

impl Blogroll<HttpFetcher> {
    /// Builds the production pipeline from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ServiceError> {
        let fetcher = HttpFetcher::new(config.fetch_settings())?;
        let aggregator = Aggregator::new(fetcher)
            .with_strategy(config.strategy())
            .with_date_format(config.date_format()?)
            .with_deadline(config.aggregation_deadline());
        Ok(Self::new(
            config.feeds_file.clone(),
            aggregator,
            config.serializer_options(),
        ))
    }
}

impl<F: FeedFetcher> Blogroll<F> {
    pub fn new(
        feeds_file: impl Into<PathBuf>,
        aggregator: Aggregator<F>,
        serializer: SerializerOptions,
    ) -> Self {
        Self {
            feeds_file: feeds_file.into(),
            aggregator,
            serializer,
        }
    }

    pub fn feeds_file(&self) -> &Path {
        &self.feeds_file
    }

    /// Configured sources, in file order.
    pub async fn sources(&self) -> Result<Vec<FeedSource>, ServiceError> {
        load_sources(&self.feeds_file).await.map_err(|e| {
            tracing::error!(error = %e, "Cannot read feed list");
            ServiceError::SourceListUnavailable(e)
        })
    }

    /// Latest post of every reachable feed as a JSON array.
    ///
    /// Succeeds even when some or all feeds fail; those are left out.
    pub async fn latest_posts_json(&self) -> Result<String, ServiceError> {
        self.latest_posts_json_until(std::future::pending()).await
    }

    /// Like [`Self::latest_posts_json`], aborting with
    /// [`AggregateError::Cancelled`] once `cancel` completes.
    pub async fn latest_posts_json_until(
        &self,
        cancel: impl Future<Output = ()>,
    ) -> Result<String, ServiceError> {
        let sources = self.sources().await?;
        let posts = self.aggregator.aggregate_until(&sources, cancel).await?;
        Ok(serialize_posts(&posts, &self.serializer)?)
    }

    /// The configured feed list as `[{"feedUrl": ...}]`.
    pub async fn feed_sources_json(&self) -> Result<String, ServiceError> {
        let sources = self.sources().await?;
        Ok(serialize_sources(&sources, &self.serializer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FetchSettings, FetchStrategy};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rss(title: &str, items: &[&str]) -> String {
        let items: String = items
            .iter()
            .map(|t| {
                format!(
                    "<item><title>{t}</title><link>https://{title}.example/{t}</link>\
                     <description>&lt;em&gt;{t}&lt;/em&gt;</description>\
                     <pubDate>Fri, 15 Mar 2024 09:30:00 GMT</pubDate></item>"
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>{title}</title>{items}</channel></rss>"#
        )
    }

    async fn mount(server: &MockServer, route: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    fn service(feeds_file: PathBuf) -> Blogroll<HttpFetcher> {
        let fetcher = HttpFetcher::new(FetchSettings {
            allow_private_hosts: true,
            ..FetchSettings::default()
        })
        .unwrap();
        let aggregator = Aggregator::new(fetcher).with_strategy(FetchStrategy::from_limit(2));
        Blogroll::new(feeds_file, aggregator, SerializerOptions::default())
    }

    #[tokio::test]
    async fn test_latest_posts_skip_broken_feeds() {
        let server = MockServer::start().await;
        mount(&server, "/a", 200, rss("a", &["A2", "A1"])).await;
        mount(&server, "/b", 500, String::new()).await;
        mount(&server, "/c", 200, rss("c", &["C1"])).await;
        mount(&server, "/empty", 200, rss("empty", &[])).await;

        let dir = std::env::temp_dir().join("blogroll_service_test_posts");
        std::fs::create_dir_all(&dir).unwrap();
        let list = dir.join("feeds.txt");
        let uri = server.uri();
        std::fs::write(
            &list,
            format!("{uri}/a\n{uri}/b;{uri}/empty {uri}/c\r\n"),
        )
        .unwrap();

        let json = service(list).latest_posts_json().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                {
                    "Title": "a",
                    "Items": {
                        "Title": "A2",
                        "Summary": "<em>A2</em>",
                        "PublishDate": "03/15/2024",
                        "Link": "https://a.example/A2"
                    }
                },
                {
                    "Title": "c",
                    "Items": {
                        "Title": "C1",
                        "Summary": "<em>C1</em>",
                        "PublishDate": "03/15/2024",
                        "Link": "https://c.example/C1"
                    }
                }
            ])
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_missing_feed_list_is_fatal() {
        let svc = service(PathBuf::from("/tmp/blogroll_service_test_missing/feeds.txt"));

        let err = svc.latest_posts_json().await.unwrap_err();
        assert!(matches!(err, ServiceError::SourceListUnavailable(_)));
        assert!(err.to_string().contains("blogroll_service_test_missing"));

        let err = svc.feed_sources_json().await.unwrap_err();
        assert!(matches!(err, ServiceError::SourceListUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_feed_list_gives_empty_array() {
        let dir = std::env::temp_dir().join("blogroll_service_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let list = dir.join("feeds.txt");
        std::fs::write(&list, "\n\n").unwrap();

        let json = service(list).latest_posts_json().await.unwrap();
        assert_eq!(json, "[]");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_feed_sources_json() {
        let dir = std::env::temp_dir().join("blogroll_service_test_sources");
        std::fs::create_dir_all(&dir).unwrap();
        let list = dir.join("feeds.txt");
        std::fs::write(&list, "https://a.example/feed;https://b.example/feed").unwrap();

        let json = service(list).feed_sources_json().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                { "feedUrl": "https://a.example/feed" },
                { "feedUrl": "https://b.example/feed" }
            ])
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let dir = std::env::temp_dir().join("blogroll_service_test_cancel");
        std::fs::create_dir_all(&dir).unwrap();
        let list = dir.join("feeds.txt");
        std::fs::write(&list, "https://a.example/feed").unwrap();

        let err = service(list)
            .latest_posts_json_until(std::future::ready(()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Aggregation(AggregateError::Cancelled)
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_from_config_rejects_bad_date_format() {
        let config = Config {
            date_format: "%Q".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            Blogroll::from_config(&config),
            Err(ServiceError::Config(_))
        ));
    }
}
