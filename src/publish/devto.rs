use super::{send_json, DestinationId, PublishError, Publisher};
use crate::article::ArticleDocument;
use crate::util::{validate_base_url, BaseUrlError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const DEVTO_API_BASE: &str = "https://dev.to";

#[derive(Serialize)]
struct CreateArticle<'a> {
    article: ArticleBody<'a>,
}

#[derive(Serialize)]
struct ArticleBody<'a> {
    title: &'a str,
    body_markdown: &'a str,
    published: bool,
    tags: &'a [String],
}

#[derive(Deserialize)]
struct CreatedArticle {
    url: Option<String>,
}

/// DEV Community articles API. Authenticates with the `api-key` header.
pub struct DevtoPublisher {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    tags: Vec<String>,
}

impl DevtoPublisher {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: SecretString,
        tags: Vec<String>,
    ) -> Result<Self, BaseUrlError> {
        let base = validate_base_url(base_url)?;
        Ok(Self {
            client,
            endpoint: format!("{base}/api/articles"),
            api_key,
            tags,
        })
    }
}

#[async_trait]
impl Publisher for DevtoPublisher {
    fn id(&self) -> DestinationId {
        DestinationId::Devto
    }

    async fn publish(&self, article: &ArticleDocument) -> Result<Option<String>, PublishError> {
        // DEV renders inline HTML inside body_markdown, so either format is accepted
        let body = CreateArticle {
            article: ArticleBody {
                title: &article.title,
                body_markdown: &article.body,
                published: true,
                tags: &self.tags,
            },
        };
        let created: CreatedArticle = send_json(
            self.client
                .post(&self.endpoint)
                .header("api-key", self.api_key.expose_secret())
                .json(&body),
        )
        .await?;

        let url = created.url.ok_or(PublishError::MissingField("url"))?;
        tracing::info!(url = %url, "Published to DEV");
        Ok(Some(url))
    }
}
