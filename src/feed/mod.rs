//! Feed retrieval and aggregation.
//!
//! This module provides the core pipeline:
//!
//! - **Sources**: Split a feed list file into source identifiers
//! - **Fetching**: Retrieve one source over HTTP or from disk and parse it
//! - **Extraction**: Reduce a parsed feed to its latest post
//! - **Aggregation**: Fan out over all sources with per-source failure isolation
//!
//! # Architecture
//!
//! - [`sources`] - Feed list parsing
//! - [`parser`] - Feed parsing using the `feed-rs` crate
//! - [`fetcher`] - The [`FeedFetcher`] seam and its HTTP/file implementation
//! - [`extract`] - Latest-post selection and date formatting
//! - [`aggregate`] - Sequential or bounded-concurrent aggregation
//!
//! # Example
//!
//! ```ignore
//! use blogroll::feed::{load_sources, Aggregator, FetchSettings, HttpFetcher};
//!
//! let sources = load_sources(Path::new("BlogsFeedUrl.txt")).await?;
//! let aggregator = Aggregator::new(HttpFetcher::new(FetchSettings::default())?);
//! let posts = aggregator.aggregate(&sources).await?;
//! ```

pub mod aggregate;
pub mod extract;
pub mod fetcher;
pub mod parser;
pub mod sources;

pub use aggregate::{AggregateError, AggregationResult, Aggregator, FetchStrategy};
pub use extract::{
    digest, extract_latest, DateFormat, ExtractError, ExtractedPost, FeedDigest,
    InvalidDateFormat, DEFAULT_DATE_FORMAT,
};
pub use fetcher::{FeedFetcher, FetchError, FetchSettings, HttpFetcher};
pub use parser::{parse_feed, Feed, FeedItem};
pub use sources::{load_sources, parse_sources, FeedSource, SourceListError};
