use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a feed source identifier.
///
/// These errors cover both parsing failures and security policy violations
/// designed to prevent SSRF (Server-Side Request Forgery) attacks.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The identifier is empty or whitespace only.
    #[error("Empty source identifier")]
    Empty,
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http, https or file.
    #[error("Unsupported scheme: {0} (only http/https/file allowed)")]
    UnsupportedScheme(String),
    /// A `file://` URL that does not map to a local path.
    #[error("Not a local file URL: {0}")]
    InvalidFileUrl(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

impl UrlValidationError {
    /// True when the identifier was well formed but refused by the address policy.
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Self::PrivateIp(_) | Self::Localhost)
    }
}

/// Where a validated feed source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// An http(s) URL.
    Remote(Url),
    /// A filesystem path, given directly or as a `file://` URL.
    Local(PathBuf),
}

/// Classifies and validates a feed source identifier.
///
/// Identifiers without a scheme are treated as filesystem paths. HTTP(S)
/// URLs are checked against the address policy unless `allow_private_hosts`
/// is set:
/// - Localhost addresses (`localhost`, `127.0.0.1`, `::1`)
/// - Private IP ranges (RFC 1918, link-local, unique local IPv6)
///
/// # Errors
///
/// Returns [`UrlValidationError`] if:
/// - The identifier is empty ([`UrlValidationError::Empty`])
/// - The URL cannot be parsed ([`UrlValidationError::InvalidUrl`])
/// - The scheme is not `http`, `https` or `file` ([`UrlValidationError::UnsupportedScheme`])
/// - The host is localhost ([`UrlValidationError::Localhost`])
/// - The host is a private IP address ([`UrlValidationError::PrivateIp`])
///
/// # Examples
///
/// ```
/// use blogroll::util::{validate_source, SourceLocation};
///
/// let loc = validate_source("https://example.com/feed.xml", false).unwrap();
/// assert!(matches!(loc, SourceLocation::Remote(_)));
///
/// // Rejects private hosts unless explicitly allowed
/// assert!(validate_source("http://192.168.1.1/feed", false).is_err());
/// assert!(validate_source("http://192.168.1.1/feed", true).is_ok());
///
/// // Bare paths are local files
/// let loc = validate_source("feeds/local.xml", false).unwrap();
/// assert!(matches!(loc, SourceLocation::Local(_)));
/// ```
pub fn validate_source(
    source: &str,
    allow_private_hosts: bool,
) -> Result<SourceLocation, UrlValidationError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    let url = match Url::parse(source) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Ok(SourceLocation::Local(PathBuf::from(source)));
        }
        Err(e) => return Err(UrlValidationError::InvalidUrl(e)),
    };

    match url.scheme() {
        "http" | "https" => {}
        "file" => {
            return url
                .to_file_path()
                .map(SourceLocation::Local)
                .map_err(|()| UrlValidationError::InvalidFileUrl(source.to_owned()));
        }
        // Windows drive letters parse as one-letter schemes
        scheme if scheme.len() == 1 => {
            return Ok(SourceLocation::Local(PathBuf::from(source)));
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if !allow_private_hosts {
        check_remote_host(&url)?;
    }

    Ok(SourceLocation::Remote(url))
}

/// Applies the localhost/private address policy to an http(s) URL.
///
/// Used for the source URL itself and again for every redirect hop.
pub fn check_remote_host(url: &Url) -> Result<(), UrlValidationError> {
    let Some(host) = url.host_str() else {
        return Ok(());
    };

    // "localhost." is the same host as "localhost"
    let name = host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase();
    if name == "localhost" || name.ends_with(".localhost") {
        return Err(UrlValidationError::Localhost);
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
        let ip = canonical_ip(ip);
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(())
}

/// Unwraps IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) so the IPv4 rules apply.
fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(ipv6) => ipv6
            .to_ipv4_mapped()
            .map_or(IpAddr::V6(ipv6), IpAddr::V4),
        v4 => v4,
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            // Shared address space (100.64.0.0/10, RFC 6598)
            let is_shared = octets[0] == 100 && (octets[1] & 0xc0) == 64;
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_unspecified()
                || is_shared
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
