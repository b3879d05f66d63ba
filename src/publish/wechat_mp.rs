use super::{send, send_json, summary_line, DestinationId, PublishError, Publisher, PUBLISH_TIMEOUT};
use crate::article::ArticleDocument;
use crate::trending::DEFAULT_TRENDING_URL;
use crate::util::{validate_base_url, BaseUrlError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const WECHAT_API_BASE: &str = "https://api.weixin.qq.com";
pub const DEFAULT_COVER_URL: &str =
    "https://github.githubassets.com/images/modules/logos_page/GitHub-Mark.png";

const DIGEST_CHARS: usize = 120;
/// Permanent image material is capped at 10MB by the platform.
const MAX_COVER_SIZE: usize = 10 * 1024 * 1024;
const PUBLISH_POLL_ATTEMPTS: u32 = 5;
const PUBLISH_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Deserialize, Default)]
#[serde(default)]
struct TokenReply {
    access_token: Option<String>,
    errcode: i64,
    errmsg: String,
}

/// Shared shape of replies that hand back a media id.
#[derive(Deserialize, Default)]
#[serde(default)]
struct MediaReply {
    media_id: Option<String>,
    errcode: i64,
    errmsg: String,
}

#[derive(Serialize)]
struct DraftRequest<'a> {
    articles: [DraftArticle<'a>; 1],
}

#[derive(Serialize)]
struct DraftArticle<'a> {
    title: &'a str,
    content: &'a str,
    digest: &'a str,
    thumb_media_id: &'a str,
    content_source_url: &'a str,
    need_open_comment: u8,
    only_fans_can_comment: u8,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SubmitReply {
    /// Sent as a string by the API, but tolerated as a number.
    publish_id: Option<serde_json::Value>,
    errcode: i64,
    errmsg: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PublishStatusReply {
    publish_status: Option<i64>,
    article_detail: Option<ArticleDetail>,
    errcode: i64,
    errmsg: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ArticleDetail {
    item: Vec<PublishedItem>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PublishedItem {
    article_url: Option<String>,
}

fn api_error(step: &str, errcode: i64, errmsg: &str) -> PublishError {
    PublishError::Api(format!("{step}: {errcode}: {errmsg}"))
}

/// WeChat official account.
///
/// Exchanges the app id/secret for an access token, uploads the cover image
/// unless a permanent `thumb_media_id` is configured, and saves the article
/// (as HTML) to the draft box. Drafts have no public URL. With direct
/// publishing the draft is submitted and the article URL is returned once
/// the platform reports it published.
pub struct WechatMpPublisher {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: SecretString,
    thumb_media_id: Option<String>,
    cover_url: String,
    direct_publish: bool,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl WechatMpPublisher {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        app_id: &str,
        app_secret: SecretString,
    ) -> Result<Self, BaseUrlError> {
        Ok(Self {
            client,
            base_url: validate_base_url(base_url)?,
            app_id: app_id.to_string(),
            app_secret,
            thumb_media_id: None,
            cover_url: DEFAULT_COVER_URL.to_string(),
            direct_publish: false,
            poll_attempts: PUBLISH_POLL_ATTEMPTS,
            poll_interval: PUBLISH_POLL_INTERVAL,
        })
    }

    /// Use an already uploaded permanent image instead of uploading a cover.
    pub fn with_thumb_media_id(mut self, media_id: impl Into<String>) -> Self {
        self.thumb_media_id = Some(media_id.into());
        self
    }

    pub fn with_cover_url(mut self, cover_url: &str) -> Result<Self, BaseUrlError> {
        self.cover_url = validate_base_url(cover_url)?;
        Ok(self)
    }

    pub fn with_direct_publish(mut self, direct_publish: bool) -> Self {
        self.direct_publish = direct_publish;
        self
    }

    /// How often to ask for the publish result before giving up on a URL.
    pub fn with_publish_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts.max(1);
        self.poll_interval = interval;
        self
    }

    fn endpoint(&self, path: &str, token: &SecretString, extra: &[(&str, &str)]) -> Result<Url, PublishError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path)).map_err(BaseUrlError::from)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("access_token", token.expose_secret());
            for (k, v) in extra {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn access_token(&self) -> Result<SecretString, PublishError> {
        let url = Url::parse_with_params(
            &format!("{}/cgi-bin/token", self.base_url),
            &[
                ("grant_type", "client_credential"),
                ("appid", self.app_id.as_str()),
                ("secret", self.app_secret.expose_secret()),
            ],
        )
        .map_err(BaseUrlError::from)?;

        let reply: TokenReply = send_json(self.client.get(url)).await?;
        if reply.errcode != 0 {
            return Err(api_error("token", reply.errcode, &reply.errmsg));
        }
        reply
            .access_token
            .map(SecretString::from)
            .ok_or(PublishError::MissingField("access_token"))
    }

    /// Downloads the cover image and stores it as permanent image material.
    async fn upload_cover(&self, token: &SecretString) -> Result<String, PublishError> {
        let response = send(self.client.get(&self.cover_url)).await?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::trim)
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/png")
            .to_string();
        let bytes = tokio::time::timeout(PUBLISH_TIMEOUT, response.bytes())
            .await
            .map_err(|_| PublishError::Timeout(PUBLISH_TIMEOUT))??;
        if bytes.len() > MAX_COVER_SIZE {
            return Err(PublishError::Api(format!(
                "cover image is {} bytes (max {MAX_COVER_SIZE})",
                bytes.len()
            )));
        }

        let file_name = self
            .cover_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty() && !name.contains('?'))
            .unwrap_or("cover.png")
            .to_string();
        let part = Part::bytes(bytes.to_vec()).file_name(file_name).mime_str(&mime)?;
        let form = Form::new().part("media", part);

        let url = self.endpoint("/cgi-bin/material/add_material", token, &[("type", "image")])?;
        let reply: MediaReply = send_json(self.client.post(url).multipart(form)).await?;
        if reply.errcode != 0 {
            return Err(api_error("material/add_material", reply.errcode, &reply.errmsg));
        }
        let media_id = reply.media_id.ok_or(PublishError::MissingField("media_id"))?;
        tracing::info!(media_id = %media_id, "Uploaded WeChat cover image");
        Ok(media_id)
    }

    /// Submits a draft for publication and waits for its article URL.
    ///
    /// Returns `None` when the platform is still processing after the last
    /// poll; the submission itself has succeeded by then.
    async fn submit(&self, token: &SecretString, draft_id: &str) -> Result<Option<String>, PublishError> {
        let url = self.endpoint("/cgi-bin/freepublish/submit", token, &[])?;
        let reply: SubmitReply = send_json(
            self.client
                .post(url)
                .json(&serde_json::json!({ "media_id": draft_id })),
        )
        .await?;
        if reply.errcode != 0 {
            return Err(api_error("freepublish/submit", reply.errcode, &reply.errmsg));
        }
        let publish_id = match reply.publish_id {
            Some(serde_json::Value::String(id)) => id,
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => return Err(PublishError::MissingField("publish_id")),
        };
        tracing::info!(publish_id = %publish_id, "Submitted WeChat article for publication");

        let url = self.endpoint("/cgi-bin/freepublish/get", token, &[])?;
        for attempt in 1..=self.poll_attempts {
            let status: PublishStatusReply = send_json(
                self.client
                    .post(url.clone())
                    .json(&serde_json::json!({ "publish_id": publish_id })),
            )
            .await?;
            if status.errcode != 0 {
                return Err(api_error("freepublish/get", status.errcode, &status.errmsg));
            }
            match status.publish_status {
                Some(0) => {
                    return Ok(status
                        .article_detail
                        .and_then(|d| d.item.into_iter().find_map(|i| i.article_url)));
                }
                // 1 means still publishing
                Some(1) | None => {
                    tracing::debug!(attempt = attempt, "WeChat article still publishing");
                    if attempt < self.poll_attempts {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
                Some(code) => {
                    return Err(PublishError::Api(format!(
                        "freepublish/get: publication failed with status {code}"
                    )));
                }
            }
        }

        tracing::info!(publish_id = %publish_id, "WeChat article not published yet, no URL available");
        Ok(None)
    }
}

#[async_trait]
impl Publisher for WechatMpPublisher {
    fn id(&self) -> DestinationId {
        DestinationId::WechatMp
    }

    async fn publish(&self, article: &ArticleDocument) -> Result<Option<String>, PublishError> {
        let token = self.access_token().await?;
        let thumb_media_id = match &self.thumb_media_id {
            Some(id) => id.clone(),
            None => self.upload_cover(&token).await?,
        };

        let html = article.html_body();
        let digest = summary_line(article, DIGEST_CHARS);
        let request = DraftRequest {
            articles: [DraftArticle {
                title: &article.title,
                content: &html,
                digest: &digest,
                thumb_media_id: &thumb_media_id,
                content_source_url: DEFAULT_TRENDING_URL,
                need_open_comment: 0,
                only_fans_can_comment: 0,
            }],
        };
        let url = self.endpoint("/cgi-bin/draft/add", &token, &[])?;
        let reply: MediaReply = send_json(self.client.post(url).json(&request)).await?;
        if reply.errcode != 0 {
            return Err(api_error("draft/add", reply.errcode, &reply.errmsg));
        }
        let media_id = reply.media_id.ok_or(PublishError::MissingField("media_id"))?;
        tracing::info!(media_id = %media_id, "Saved WeChat draft");

        if self.direct_publish {
            self.submit(&token, &media_id).await
        } else {
            Ok(None)
        }
    }
}
