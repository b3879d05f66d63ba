//! Secondary per-repository lookups against the GitHub REST API.
//!
//! Enrichment is best effort: every lookup that fails (transport error,
//! non-200, malformed body) leaves its fields at their defaults and the
//! rest of the record is still filled in.

mod dto;

use crate::trending::RepositoryRecord;
use crate::util::{truncate_chars, validate_base_url, BaseUrlError};
use base64::Engine;
use chrono::{DateTime, Utc};
use dto::{ReadmeResponse, RepoMetadata};
use futures::stream::{self, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// README previews are cut to this many characters.
pub const README_PREVIEW_CHARS: usize = 500;
/// Number of contributor logins kept per repository.
pub const MAX_CONTRIBUTORS: usize = 5;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONCURRENCY: usize = 4;

/// Details not present on the listing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailRecord {
    pub description: Option<String>,
    /// README preview, at most [`README_PREVIEW_CHARS`] chars plus "...".
    pub readme: String,
    pub contributors: Vec<String>,
    pub license: Option<String>,
    pub topics: Vec<String>,
    pub homepage: Option<String>,
    pub open_issues: u64,
    pub watchers: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DetailRecord {
    pub fn is_empty(&self) -> bool {
        *self == DetailRecord::default()
    }
}

/// GitHub REST client for repository details.
pub struct Enricher {
    client: reqwest::Client,
    api_base: String,
    token: SecretString,
    timeout: Duration,
    concurrency: usize,
}

impl Enricher {
    pub fn new(
        client: reqwest::Client,
        api_base: &str,
        token: SecretString,
    ) -> Result<Self, BaseUrlError> {
        Ok(Self {
            client,
            api_base: validate_base_url(api_base)?,
            token,
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upper bound on repositories enriched at the same time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Looks up metadata, README and contributors for `owner/repo`.
    ///
    /// Never fails; see the module docs.
    pub async fn enrich(&self, owner: &str, repo: &str) -> DetailRecord {
        let base = format!("{}/repos/{}/{}", self.api_base, owner, repo);
        let metadata_url = base.clone();
        let readme_url = format!("{base}/readme");
        let contributors_url = format!("{base}/contributors?per_page={MAX_CONTRIBUTORS}");

        let (metadata, readme, contributors) = tokio::join!(
            self.get_json::<RepoMetadata>(&metadata_url),
            self.get_json::<ReadmeResponse>(&readme_url),
            self.get_json::<Vec<serde_json::Value>>(&contributors_url),
        );

        let mut details = DetailRecord::default();

        if let Some(meta) = metadata {
            details.description = meta.description.filter(|d| !d.trim().is_empty());
            details.license = meta.license.and_then(|l| l.name).filter(|n| !n.is_empty());
            details.topics = meta.topics.unwrap_or_default();
            details.homepage = meta.homepage.filter(|h| !h.trim().is_empty());
            details.open_issues = meta.open_issues.unwrap_or(0);
            details.watchers = meta.watchers.unwrap_or(0);
            details.last_updated = meta.updated_at.as_deref().and_then(|raw| {
                match DateTime::parse_from_rfc3339(raw) {
                    Ok(ts) => Some(ts.with_timezone(&Utc)),
                    Err(e) => {
                        tracing::warn!(repo = %format!("{owner}/{repo}"), raw = %raw, error = %e, "Unparseable updated_at");
                        None
                    }
                }
            });
        }

        if let Some(readme) = readme {
            details.readme = decode_readme(&readme, owner, repo);
        }

        if let Some(list) = contributors {
            details.contributors = list
                .iter()
                .filter_map(|c| c.get("login").and_then(|l| l.as_str()))
                .take(MAX_CONTRIBUTORS)
                .map(str::to_string)
                .collect();
        }

        details
    }

    /// Enriches a batch with bounded concurrency, preserving input order.
    pub async fn enrich_all(&self, records: Vec<RepositoryRecord>) -> Vec<RepositoryRecord> {
        let total = records.len();
        let enriched: Vec<RepositoryRecord> = stream::iter(records)
            .map(|record| async move {
                let details = self.enrich(record.owner(), record.repo()).await;
                if details.is_empty() {
                    tracing::warn!(repo = %record.name, "No details available for repository");
                }
                record.with_details(details)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        tracing::info!(total = total, concurrency = self.concurrency, "Enrichment finished");
        enriched
    }

    /// GET + JSON decode; any failure is logged and becomes `None`.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Option<T> {
        let request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header(
                "Authorization",
                format!("Bearer {}", self.token.expose_secret()),
            );

        let response = match tokio::time::timeout(self.timeout, request.send()).await {
            Err(_) => {
                tracing::warn!(url = %url, "GitHub API request timed out");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(url = %url, error = %e, "GitHub API request failed");
                return None;
            }
            Ok(Ok(response)) => response,
        };

        if response.status() != reqwest::StatusCode::OK {
            tracing::warn!(url = %url, status = %response.status(), "GitHub API returned non-200");
            return None;
        }

        let body = match tokio::time::timeout(self.timeout, response.bytes()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => {
                tracing::warn!(url = %url, error = %e, "Failed to read GitHub API response");
                return None;
            }
            Err(_) => {
                tracing::warn!(url = %url, "GitHub API response body timed out");
                return None;
            }
        };

        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Unexpected GitHub API response shape");
                None
            }
        }
    }
}

fn decode_readme(readme: &ReadmeResponse, owner: &str, repo: &str) -> String {
    let Some(content) = readme.content.as_deref() else {
        return String::new();
    };
    if let Some(encoding) = readme.encoding.as_deref() {
        if encoding != "base64" {
            tracing::warn!(repo = %format!("{owner}/{repo}"), encoding = %encoding, "Unsupported README encoding");
            return String::new();
        }
    }

    // The API wraps base64 at 60 columns
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = match base64::engine::general_purpose::STANDARD.decode(compact) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(repo = %format!("{owner}/{repo}"), error = %e, "Failed to decode README");
            return String::new();
        }
    };
    match String::from_utf8(bytes) {
        Ok(text) => truncate_chars(&text, README_PREVIEW_CHARS).into_owned(),
        Err(_) => {
            tracing::warn!(repo = %format!("{owner}/{repo}"), "README is not valid UTF-8");
            String::new()
        }
    }
}
