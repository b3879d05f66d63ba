use super::{send_json, DestinationId, PublishError, Publisher};
use crate::article::{ArticleDocument, ArticleFormat};
use crate::util::{validate_base_url, BaseUrlError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const YUQUE_API_BASE: &str = "https://www.yuque.com";
const YUQUE_WEB_BASE: &str = "https://www.yuque.com";
const DEFAULT_SLUG_PREFIX: &str = "github-trending";

#[derive(Serialize)]
struct CreateDoc<'a> {
    title: &'a str,
    slug: &'a str,
    body: &'a str,
    format: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CreateDocReply {
    data: Option<CreatedDoc>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CreatedDoc {
    slug: Option<String>,
    url: Option<String>,
}

/// Yuque knowledge-base documents API (`X-Auth-Token`).
pub struct YuquePublisher {
    client: reqwest::Client,
    endpoint: String,
    token: SecretString,
    namespace: String,
    slug_prefix: String,
}

impl YuquePublisher {
    /// `namespace` is `<group>/<book>`. Each run creates a new document whose
    /// slug is `<slug_prefix>-<YYYYMMDD>`.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        token: SecretString,
        namespace: &str,
        slug_prefix: Option<&str>,
    ) -> Result<Self, BaseUrlError> {
        let base = validate_base_url(base_url)?;
        let namespace = namespace.trim_matches('/').to_string();
        Ok(Self {
            client,
            endpoint: format!("{base}/api/v2/repos/{namespace}/docs"),
            token,
            namespace,
            slug_prefix: slug_prefix.unwrap_or(DEFAULT_SLUG_PREFIX).to_string(),
        })
    }
}

#[async_trait]
impl Publisher for YuquePublisher {
    fn id(&self) -> DestinationId {
        DestinationId::Yuque
    }

    async fn publish(&self, article: &ArticleDocument) -> Result<Option<String>, PublishError> {
        let slug = format!(
            "{}-{}",
            self.slug_prefix,
            article.generated_at.format("%Y%m%d")
        );
        let body = CreateDoc {
            title: &article.title,
            slug: &slug,
            body: &article.body,
            format: match article.format {
                ArticleFormat::Markdown => "markdown",
                ArticleFormat::Html => "html",
            },
        };
        let reply: CreateDocReply = send_json(
            self.client
                .post(&self.endpoint)
                .header("X-Auth-Token", self.token.expose_secret())
                .json(&body),
        )
        .await?;

        let doc = reply.data.ok_or(PublishError::MissingField("data"))?;
        let url = match doc.url {
            Some(url) if !url.is_empty() => url,
            _ => {
                let slug = doc.slug.unwrap_or(slug);
                format!("{YUQUE_WEB_BASE}/{}/{slug}", self.namespace)
            }
        };
        tracing::info!(url = %url, "Published to Yuque");
        Ok(Some(url))
    }
}
