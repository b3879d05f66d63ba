use super::{send_json, DestinationId, PublishError, Publisher};
use crate::article::ArticleDocument;
use crate::util::{validate_base_url, BaseUrlError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const CSDN_API_BASE: &str = "https://mp.csdn.net";

#[derive(Serialize)]
struct SaveArticle<'a> {
    title: &'a str,
    content: &'a str,
    markdowncontent: &'a str,
    categories: &'a str,
    tags: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SaveReply {
    code: Option<i64>,
    msg: String,
    data: Option<SavedArticle>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SavedArticle {
    url: Option<String>,
}

/// CSDN blog editor API, authenticated with a session cookie.
pub struct CsdnPublisher {
    client: reqwest::Client,
    endpoint: String,
    cookie: SecretString,
    categories: String,
    tags: String,
}

impl CsdnPublisher {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        cookie: SecretString,
        categories: String,
        tags: String,
    ) -> Result<Self, BaseUrlError> {
        let base = validate_base_url(base_url)?;
        Ok(Self {
            client,
            endpoint: format!("{base}/mp_blog/manage/article"),
            cookie,
            categories,
            tags,
        })
    }
}

#[async_trait]
impl Publisher for CsdnPublisher {
    fn id(&self) -> DestinationId {
        DestinationId::Csdn
    }

    async fn publish(&self, article: &ArticleDocument) -> Result<Option<String>, PublishError> {
        let body = SaveArticle {
            title: &article.title,
            content: &article.body,
            markdowncontent: &article.body,
            categories: &self.categories,
            tags: &self.tags,
            kind: "original",
        };
        let reply: SaveReply = send_json(
            self.client
                .post(&self.endpoint)
                .header(reqwest::header::COOKIE, self.cookie.expose_secret())
                .json(&body),
        )
        .await?;

        if let Some(code) = reply.code.filter(|c| *c != 200) {
            return Err(PublishError::Api(format!("{code}: {}", reply.msg)));
        }
        let url = reply
            .data
            .and_then(|d| d.url)
            .ok_or(PublishError::MissingField("data.url"))?;

        tracing::info!(url = %url, "Published to CSDN");
        Ok(Some(url))
    }
}
