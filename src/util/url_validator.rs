use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors returned when a configured API base URL is rejected.
#[derive(Error, Debug)]
pub enum BaseUrlError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP pointed at a non-loopback host.
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    Insecure,
}

/// Validates an API base URL from configuration.
///
/// Credentials (tokens, cookies, API keys) are attached to every request sent
/// to these endpoints, so plain `http://` is only accepted for loopback hosts,
/// which is what mock servers in tests bind to.
///
/// A trailing slash is stripped so callers can `format!("{base}/path")`.
///
/// ```
/// use trendpress::util::validate_base_url;
///
/// assert!(validate_base_url("https://dev.to/api").is_ok());
/// assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
/// assert!(validate_base_url("http://example.com").is_err());
/// assert!(validate_base_url("ftp://example.com").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<String, BaseUrlError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => {}
        "http" => {
            if !is_loopback_host(&url) {
                tracing::error!(base_url = %url_str, "Rejecting non-HTTPS base URL");
                return Err(BaseUrlError::Insecure);
            }
            tracing::warn!(base_url = %url_str, "Using non-HTTPS base URL (localhost only)");
        }
        scheme => return Err(BaseUrlError::UnsupportedScheme(scheme.to_owned())),
    }

    Ok(url_str.trim_end_matches('/').to_string())
}

fn is_loopback_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host == "localhost" {
        return true;
    }
    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host_for_parse
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
