//! Publishing destinations and the dispatcher that fans an article out to them.
//!
//! Every destination implements [`Publisher`]. The WeCom summary is a
//! [`SummaryPublisher`]: it runs after all the others and receives the URLs
//! they produced.

mod confluence;
mod devto;
mod dispatch;
mod juejin;
mod csdn;
mod local_file;
mod registry;
mod wechat_mp;
mod wecom;
mod yuque;

pub use confluence::ConfluencePublisher;
pub use csdn::CsdnPublisher;
pub use devto::DevtoPublisher;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use juejin::JuejinPublisher;
pub use local_file::LocalFilePublisher;
pub use registry::{build_publishers, PublisherSet};
pub use wechat_mp::WechatMpPublisher;
pub use wecom::{WecomReply, WecomSummary};
pub use yuque::YuquePublisher;

use crate::article::ArticleDocument;
use crate::util::{truncate_chars, BaseUrlError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP error: status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    /// The destination answered 2xx but reported a failure in its payload.
    #[error("API error: {0}")]
    Api(String),
    #[error("Response is missing field `{0}`")]
    MissingField(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] BaseUrlError),
}

/// Identifies a destination. Ordering follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DestinationId {
    Devto,
    Juejin,
    Csdn,
    Yuque,
    WechatMp,
    Confluence,
    LocalFile,
    Wecom,
}

impl DestinationId {
    /// Which URL the summary card links to when several are available.
    ///
    /// WeChat MP only yields a URL in direct-publish mode; drafts fall
    /// through to the next entry.
    pub const URL_PRIORITY: [DestinationId; 7] = [
        DestinationId::WechatMp,
        DestinationId::Juejin,
        DestinationId::Csdn,
        DestinationId::Devto,
        DestinationId::Yuque,
        DestinationId::Confluence,
        DestinationId::LocalFile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DestinationId::Devto => "devto",
            DestinationId::Juejin => "juejin",
            DestinationId::Csdn => "csdn",
            DestinationId::Yuque => "yuque",
            DestinationId::WechatMp => "wechat_mp",
            DestinationId::Confluence => "confluence",
            DestinationId::LocalFile => "local_file",
            DestinationId::Wecom => "wecom",
        }
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URLs produced by successful destinations, keyed by destination.
pub type UrlMap = BTreeMap<DestinationId, String>;

/// Outcome of one destination in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub destination: DestinationId,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl PublishResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A publishing destination.
///
/// `Ok(None)` means the article was accepted but the destination has no
/// public URL for it (drafts, chat messages).
#[async_trait]
pub trait Publisher: Send + Sync {
    fn id(&self) -> DestinationId;

    async fn publish(&self, article: &ArticleDocument) -> Result<Option<String>, PublishError>;
}

/// A destination that links to what the other destinations produced.
#[async_trait]
pub trait SummaryPublisher: Send + Sync {
    fn id(&self) -> DestinationId;

    async fn publish_summary(
        &self,
        article: &ArticleDocument,
        urls: &UrlMap,
    ) -> Result<(), PublishError>;
}

/// First URL in [`DestinationId::URL_PRIORITY`] order.
pub fn preferred_url(urls: &UrlMap) -> Option<&str> {
    DestinationId::URL_PRIORITY
        .iter()
        .find_map(|id| urls.get(id))
        .map(String::as_str)
}

/// Sends `request` with the publish timeout and rejects non-2xx responses.
pub(crate) async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, PublishError> {
    let response = tokio::time::timeout(PUBLISH_TIMEOUT, request.send())
        .await
        .map_err(|_| PublishError::Timeout(PUBLISH_TIMEOUT))??;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PublishError::HttpStatus {
            status: status.as_u16(),
            body: truncate_chars(&body, ERROR_BODY_CHARS).into_owned(),
        });
    }
    Ok(response)
}

/// [`send`] followed by JSON decoding of the body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, PublishError> {
    Ok(send(request).await?.json().await?)
}

/// First prose line of the article, used for digests and card descriptions.
pub(crate) fn summary_line(article: &ArticleDocument, max_chars: usize) -> String {
    let line = article
        .body
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('<'))
        .unwrap_or(article.title.as_str());
    truncate_chars(line, max_chars).into_owned()
}
