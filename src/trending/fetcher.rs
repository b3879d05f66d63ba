use super::parser::{parse_trending, ParseResult};
use super::{RepositoryRecord, TrendingQuery};
use crate::util::{validate_base_url, BaseUrlError};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Public listing endpoint.
pub const DEFAULT_TRENDING_URL: &str = "https://github.com/trending";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_LIMIT: usize = 10;
const MAX_PAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that abort a listing fetch.
///
/// Markup problems are not errors: they degrade to an empty or partial
/// listing inside the parser.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Listing page was not valid UTF-8
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    /// The listing URL could not be built from the base URL and query
    #[error("Invalid listing URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Fetches and parses GitHub Trending listings.
#[derive(Debug, Clone)]
pub struct TrendingFetcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    limit: usize,
}

impl TrendingFetcher {
    /// Creates a fetcher for `base_url` (normally [`DEFAULT_TRENDING_URL`]).
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, BaseUrlError> {
        Ok(Self {
            client,
            base_url: validate_base_url(base_url)?,
            timeout: DEFAULT_TIMEOUT,
            limit: DEFAULT_LIMIT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Maximum number of records returned by [`fetch`](Self::fetch).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Builds `<base>[/<language>]?since=<range>[&spoken_language_code=<code>]`.
    pub fn listing_url(&self, query: &TrendingQuery) -> Result<Url, FetchError> {
        let mut raw = self.base_url.clone();
        if !query.language.is_empty() {
            raw.push('/');
            raw.push_str(query.language.trim_matches('/'));
        }

        let mut url = Url::parse(&raw)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("since", query.since.as_str());
            if let Some(code) = query.spoken_language.as_deref().filter(|c| !c.is_empty()) {
                pairs.append_pair("spoken_language_code", code);
            }
        }
        Ok(url)
    }

    /// Fetches one listing and returns at most `limit` deduplicated records.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] / [`FetchError::Timeout`] - transport failures
    /// - [`FetchError::HttpStatus`] - any non-2xx response
    /// - [`FetchError::ResponseTooLarge`] - body over 10MB
    ///
    /// An empty `Ok` vector means the page held no recognisable entries; the
    /// caller decides how loudly to report it.
    pub async fn fetch(&self, query: &TrendingQuery) -> Result<Vec<RepositoryRecord>, FetchError> {
        let url = self.listing_url(query)?;
        tracing::info!(url = %url, limit = self.limit, "Fetching trending listing");

        let response = tokio::time::timeout(self.timeout, self.client.get(url.clone()).send())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
            .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            tracing::error!(url = %url, status = %response.status(), "Trending listing request failed");
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_PAGE_SIZE).await?;
        let html = String::from_utf8(bytes).map_err(|_| FetchError::InvalidUtf8)?;

        let ParseResult {
            mut repositories,
            skipped,
            duplicates,
        } = parse_trending(&html, &query.language);

        if duplicates > 0 {
            tracing::debug!(duplicates = duplicates, "Deduplicated trending entries");
        }
        repositories.truncate(self.limit);

        tracing::info!(
            count = repositories.len(),
            skipped = skipped,
            "Parsed trending listing"
        );
        Ok(repositories)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trending::parser::fixtures::{entry, page};
    use crate::trending::TimeRange;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(server: &MockServer) -> TrendingFetcher {
        TrendingFetcher::new(reqwest::Client::new(), &format!("{}/trending", server.uri())).unwrap()
    }

    #[test]
    fn test_listing_url_variants() {
        let f = TrendingFetcher::new(reqwest::Client::new(), DEFAULT_TRENDING_URL).unwrap();

        let all = f.listing_url(&TrendingQuery::new("", TimeRange::Daily)).unwrap();
        assert_eq!(all.as_str(), "https://github.com/trending?since=daily");

        let mut q = TrendingQuery::new("rust", TimeRange::Monthly);
        q.spoken_language = Some("zh".to_string());
        let rust = f.listing_url(&q).unwrap();
        assert_eq!(
            rust.as_str(),
            "https://github.com/trending/rust?since=monthly&spoken_language_code=zh"
        );
    }

    #[test]
    fn test_insecure_base_rejected() {
        assert!(TrendingFetcher::new(reqwest::Client::new(), "http://github.com/trending").is_err());
    }

    #[tokio::test]
    async fn test_fetch_success_respects_limit() {
        let server = MockServer::start().await;
        let entries: Vec<String> = (0..5)
            .map(|i| entry(&format!("octo/repo{i}"), None, Some("Rust"), "1,000", "10"))
            .collect();
        Mock::given(method("GET"))
            .and(path("/trending/rust"))
            .and(query_param("since", "weekly"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&entries)))
            .mount(&server)
            .await;

        let repos = fetcher(&server)
            .with_limit(3)
            .fetch(&TrendingQuery::new("rust", TimeRange::Weekly))
            .await
            .unwrap();

        assert_eq!(repos.len(), 3);
        assert_eq!(repos[0].name, "octo/repo0");
        assert_eq!(repos[0].stars, 1000);
    }

    #[tokio::test]
    async fn test_fetch_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher(&server)
            .fetch(&TrendingQuery::default())
            .await
            .unwrap_err();
        match err {
            FetchError::HttpStatus(503) => {}
            e => panic!("Expected HttpStatus(503), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let err = fetcher(&server)
            .with_timeout(Duration::from_millis(50))
            .fetch(&TrendingQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_fetch_changed_markup_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
            .mount(&server)
            .await;

        let repos = fetcher(&server).fetch(&TrendingQuery::default()).await.unwrap();
        assert!(repos.is_empty());
    }
}
