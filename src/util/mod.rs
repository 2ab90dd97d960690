//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **Source validation**: Classifies feed identifiers as remote URLs or local
//!   paths and applies the SSRF address policy
//! - **Text processing**: Whitespace and control-character normalization for titles
//!
//! # Examples
//!
//! ```
//! use blogroll::util::{normalize_title, validate_source};
//!
//! // Validate a feed URL
//! let location = validate_source("https://example.com/feed.xml", false).unwrap();
//!
//! // Clean up a title pulled out of feed XML
//! let title = normalize_title("  Weekly\n  digest ");
//! assert_eq!(title, "Weekly digest");
//! ```

mod text;
mod url_validator;

pub use text::normalize_title;
pub use url_validator::{check_remote_host, validate_source, SourceLocation, UrlValidationError};
