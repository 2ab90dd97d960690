//! Aggregates the latest post of many RSS/Atom feeds into one JSON document.
//!
//! The pipeline reads a feed list ([`feed::load_sources`]), fetches every
//! source ([`feed::HttpFetcher`]), keeps the newest entry of each
//! ([`feed::extract_latest`]) and renders the collection
//! ([`output::serialize_posts`]). [`service::Blogroll`] wires these together
//! behind the two operations the binary exposes.

pub mod config;
pub mod feed;
pub mod output;
pub mod service;
pub mod util;
