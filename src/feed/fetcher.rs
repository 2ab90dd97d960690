use crate::feed::parser::{parse_feed, Feed};
use crate::feed::sources::FeedSource;
use crate::util::{check_remote_host, validate_source, SourceLocation, UrlValidationError};
use futures::StreamExt;
use std::error::Error as _;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const MAX_REDIRECTS: usize = 10;

/// Underlying failure carried by a [`FetchError`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while retrieving and parsing one feed.
///
/// Every variant except [`FetchError::InvalidSource`] names the offending
/// source and keeps the underlying failure reachable through
/// [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source identifier is empty
    #[error("Feed source identifier is empty")]
    InvalidSource,
    /// Retrieval refused by address policy, HTTP 401/403 or file permissions
    #[error("Access denied to feed {url}: {cause}")]
    AccessDenied {
        url: String,
        #[source]
        cause: Cause,
    },
    /// Nothing exists at the given location (HTTP 404/410, missing file)
    #[error("Feed not found at {url}: {cause}")]
    NotFound {
        url: String,
        #[source]
        cause: Cause,
    },
    /// The identifier is not a well-formed, supported URL
    #[error("Malformed feed URL {url}: {cause}")]
    MalformedSource {
        url: String,
        #[source]
        cause: Cause,
    },
    /// Network-level failure (DNS, connection, TLS, timeout, bad status, oversized body)
    #[error("Failed to retrieve feed {url}: {cause}")]
    TransportFailure {
        url: String,
        #[source]
        cause: Cause,
    },
    /// Content was retrieved but is not RSS, Atom or JSON Feed
    #[error("Failed to parse feed {url}: {cause}")]
    ParseFailure {
        url: String,
        #[source]
        cause: Cause,
    },
    /// The fetcher itself is unusable; not specific to this source
    #[error("Feed client unavailable while fetching {url}: {cause}")]
    ClientUnavailable {
        url: String,
        #[source]
        cause: Cause,
    },
}

impl FetchError {
    /// Short machine-friendly name of the failure class, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSource => "invalid_source",
            Self::AccessDenied { .. } => "access_denied",
            Self::NotFound { .. } => "not_found",
            Self::MalformedSource { .. } => "malformed_source",
            Self::TransportFailure { .. } => "transport_failure",
            Self::ParseFailure { .. } => "parse_failure",
            Self::ClientUnavailable { .. } => "client_unavailable",
        }
    }

    /// The source identifier the failure belongs to (empty for `InvalidSource`).
    pub fn url(&self) -> &str {
        match self {
            Self::InvalidSource => "",
            Self::AccessDenied { url, .. }
            | Self::NotFound { url, .. }
            | Self::MalformedSource { url, .. }
            | Self::TransportFailure { url, .. }
            | Self::ParseFailure { url, .. }
            | Self::ClientUnavailable { url, .. } => url,
        }
    }

    /// True when the failure is not confined to one source and should abort
    /// the whole aggregation.
    pub fn is_systemic(&self) -> bool {
        matches!(self, Self::ClientUnavailable { .. })
    }
}

/// Retrieves one feed source and parses it.
///
/// Implementations perform a single attempt; a failure is final for that
/// source.
pub trait FeedFetcher: Send + Sync {
    fn fetch(&self, source: &FeedSource) -> impl Future<Output = Result<Feed, FetchError>> + Send;
}

/// Tunables for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Upper bound for one retrieval, connection through last byte.
    pub request_timeout: Duration,
    /// Largest accepted document, remote or local.
    pub max_feed_bytes: usize,
    /// Skip the localhost/private address check.
    pub allow_private_hosts: bool,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_TIMEOUT,
            max_feed_bytes: DEFAULT_MAX_FEED_SIZE,
            allow_private_hosts: false,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// [`FeedFetcher`] for http(s) URLs and local files.
///
/// Cloning is cheap; the underlying `reqwest::Client` is shared.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

/// Body read failures that are reported as [`FetchError::TransportFailure`].
#[derive(Debug, Error)]
enum BodyError {
    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("incomplete response: expected {expected} bytes, received {received}")]
    Incomplete { expected: u64, received: usize },
}

impl HttpFetcher {
    /// Builds a fetcher with its own HTTP client.
    pub fn new(settings: FetchSettings) -> Result<Self, reqwest::Error> {
        let client = Self::client_builder(&settings).build()?;
        Ok(Self::with_client(client, settings))
    }

    /// Client configuration used by [`HttpFetcher::new`].
    ///
    /// Every redirect hop goes through the same address policy as the
    /// source URL, unless `allow_private_hosts` is set.
    pub fn client_builder(settings: &FetchSettings) -> reqwest::ClientBuilder {
        let allow_private_hosts = settings.allow_private_hosts;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error(format!("more than {MAX_REDIRECTS} redirects"));
            }
            if allow_private_hosts {
                return attempt.follow();
            }
            match check_remote_host(attempt.url()) {
                Ok(()) => attempt.follow(),
                Err(e) => {
                    tracing::warn!(target_url = %attempt.url(), error = %e, "Refusing redirect");
                    attempt.error(e)
                }
            }
        });

        reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .redirect(policy)
    }

    /// Builds a fetcher around an existing client (caller controls configuration).
    pub fn with_client(client: reqwest::Client, settings: FetchSettings) -> Self {
        Self { client, settings }
    }

    async fn retrieve(&self, id: &str, location: SourceLocation) -> Result<Vec<u8>, FetchError> {
        match location {
            SourceLocation::Remote(url) => self.retrieve_remote(id, url).await,
            SourceLocation::Local(path) => self.retrieve_local(id, &path).await,
        }
    }

    async fn retrieve_remote(&self, id: &str, url: url::Url) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_request_error(id, e))?;

        let response = response
            .error_for_status()
            .map_err(|e| classify_status_error(id, e))?;

        read_limited_bytes(response, self.settings.max_feed_bytes)
            .await
            .map_err(|cause| FetchError::TransportFailure {
                url: id.to_string(),
                cause,
            })
    }

    async fn retrieve_local(&self, id: &str, path: &Path) -> Result<Vec<u8>, FetchError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| classify_io_error(id, e))?;

        let limit = self.settings.max_feed_bytes;
        if metadata.len() > limit as u64 {
            return Err(FetchError::TransportFailure {
                url: id.to_string(),
                cause: Box::new(BodyError::TooLarge { limit }),
            });
        }

        tokio::fs::read(path)
            .await
            .map_err(|e| classify_io_error(id, e))
    }
}

impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<Feed, FetchError> {
        let id = source.as_str();
        let location = validate_source(id, self.settings.allow_private_hosts)
            .map_err(|e| classify_validation_error(id, e))?;

        let timeout = self.settings.request_timeout;
        let bytes = tokio::time::timeout(timeout, self.retrieve(id, location))
            .await
            .map_err(|elapsed| FetchError::TransportFailure {
                url: id.to_string(),
                cause: Box::new(elapsed),
            })??;

        let feed = parse_feed(&bytes).map_err(|e| FetchError::ParseFailure {
            url: id.to_string(),
            cause: Box::new(e),
        })?;

        tracing::debug!(source = %id, items = feed.items.len(), "Fetched feed");
        Ok(feed)
    }
}

fn classify_validation_error(id: &str, e: UrlValidationError) -> FetchError {
    match e {
        UrlValidationError::Empty => FetchError::InvalidSource,
        e if e.is_policy_violation() => FetchError::AccessDenied {
            url: id.to_string(),
            cause: Box::new(e),
        },
        e => FetchError::MalformedSource {
            url: id.to_string(),
            cause: Box::new(e),
        },
    }
}

fn classify_request_error(id: &str, e: reqwest::Error) -> FetchError {
    let url = id.to_string();
    let refused_redirect = e.is_redirect()
        && std::iter::successors(e.source(), |cause| (*cause).source())
            .any(|cause| cause.is::<UrlValidationError>());
    if refused_redirect {
        FetchError::AccessDenied {
            url,
            cause: Box::new(e),
        }
    } else if e.is_builder() {
        // URL was already validated, so a builder error comes from the client setup
        FetchError::ClientUnavailable {
            url,
            cause: Box::new(e),
        }
    } else {
        FetchError::TransportFailure {
            url,
            cause: Box::new(e),
        }
    }
}

fn classify_status_error(id: &str, e: reqwest::Error) -> FetchError {
    let url = id.to_string();
    let status = e.status();
    let cause: Cause = Box::new(e);
    match status {
        Some(reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN) => {
            FetchError::AccessDenied { url, cause }
        }
        Some(reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::GONE) => {
            FetchError::NotFound { url, cause }
        }
        _ => FetchError::TransportFailure { url, cause },
    }
}

fn classify_io_error(id: &str, e: std::io::Error) -> FetchError {
    let url = id.to_string();
    match e.kind() {
        std::io::ErrorKind::NotFound => FetchError::NotFound {
            url,
            cause: Box::new(e),
        },
        std::io::ErrorKind::PermissionDenied => FetchError::AccessDenied {
            url,
            cause: Box::new(e),
        },
        _ => FetchError::TransportFailure {
            url,
            cause: Box::new(e),
        },
    }
}

async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, Cause> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(Box::new(BodyError::TooLarge { limit }));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(Box::new(BodyError::TooLarge { limit }));
        }
        bytes.extend_from_slice(&chunk);
    }

    check_complete(expected_length, bytes.len())?;
    Ok(bytes)
}

fn check_complete(expected: Option<u64>, received: usize) -> Result<(), BodyError> {
    match expected {
        Some(expected) if (received as u64) < expected => {
            Err(BodyError::Incomplete { expected, received })
        }
        _ => Ok(()),
    }
}
