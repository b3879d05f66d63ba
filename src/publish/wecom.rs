use super::{
    preferred_url, send_json, summary_line, DestinationId, PublishError, SummaryPublisher, UrlMap,
};
use crate::article::ArticleDocument;
use crate::util::{validate_base_url, BaseUrlError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DESCRIPTION_CHARS: usize = 120;
const DEFAULT_PIC_URL: &str =
    "https://github.githubassets.com/images/modules/logos_page/GitHub-Mark.png";

/// Reply envelope of WeCom group-bot webhooks.
#[derive(Debug, Deserialize)]
pub struct WecomReply {
    #[serde(default = "unknown_errcode")]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

// A reply without errcode is not a success
fn unknown_errcode() -> i64 {
    -1
}

#[derive(Serialize)]
struct NewsMessage<'a> {
    msgtype: &'a str,
    news: News<'a>,
}

#[derive(Serialize)]
struct News<'a> {
    articles: [NewsArticle<'a>; 1],
}

#[derive(Serialize)]
struct NewsArticle<'a> {
    title: &'a str,
    description: &'a str,
    url: &'a str,
    picurl: &'a str,
}

/// Posts a news card linking to the published article to every configured
/// WeCom group-bot webhook.
pub struct WecomSummary {
    client: reqwest::Client,
    webhooks: Vec<String>,
    pic_url: String,
    fallback_url: String,
}

impl WecomSummary {
    /// `fallback_url` is linked when no other destination produced a URL.
    pub fn new(
        client: reqwest::Client,
        webhooks: &[String],
        pic_url: Option<&str>,
        fallback_url: &str,
    ) -> Result<Self, BaseUrlError> {
        let webhooks = webhooks
            .iter()
            .map(|w| validate_base_url(w))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            client,
            webhooks,
            pic_url: pic_url.unwrap_or(DEFAULT_PIC_URL).to_string(),
            fallback_url: fallback_url.to_string(),
        })
    }

    async fn post(&self, webhook: &str, message: &NewsMessage<'_>) -> Result<(), PublishError> {
        let reply: WecomReply = send_json(self.client.post(webhook).json(message)).await?;
        if reply.errcode != 0 {
            return Err(PublishError::Api(format!("{}: {}", reply.errcode, reply.errmsg)));
        }
        Ok(())
    }
}

#[async_trait]
impl SummaryPublisher for WecomSummary {
    fn id(&self) -> DestinationId {
        DestinationId::Wecom
    }

    async fn publish_summary(
        &self,
        article: &ArticleDocument,
        urls: &UrlMap,
    ) -> Result<(), PublishError> {
        let link = preferred_url(urls).unwrap_or(&self.fallback_url);
        let description = summary_line(article, DESCRIPTION_CHARS);
        let message = NewsMessage {
            msgtype: "news",
            news: News {
                articles: [NewsArticle {
                    title: &article.title,
                    description: &description,
                    url: link,
                    picurl: &self.pic_url,
                }],
            },
        };

        // Webhook URLs carry their key, so failures are reported by position
        let mut failed = Vec::new();
        for (index, webhook) in self.webhooks.iter().enumerate() {
            if let Err(e) = self.post(webhook, &message).await {
                tracing::error!(webhook = index, error = %e, "WeCom webhook push failed");
                failed.push(format!("#{index}: {e}"));
            }
        }

        if !failed.is_empty() {
            return Err(PublishError::Api(format!(
                "{} of {} webhooks failed ({})",
                failed.len(),
                self.webhooks.len(),
                failed.join("; ")
            )));
        }
        tracing::info!(link = %link, webhooks = self.webhooks.len(), "Sent WeCom summary");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::test_support::article;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ok_reply() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"errcode": 0, "errmsg": "ok"}))
    }

    #[tokio::test]
    async fn test_card_links_preferred_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "msgtype": "news",
                "news": {"articles": [{
                    "title": "GitHub Rust weekly",
                    "url": "https://juejin.cn/post/1",
                    "description": "The hottest Rust repositories this week."
                }]}
            })))
            .respond_with(ok_reply())
            .expect(1)
            .mount(&server)
            .await;

        let summary = WecomSummary::new(
            reqwest::Client::new(),
            &[format!("{}/hook", server.uri())],
            None,
            "https://github.com/trending",
        )
        .unwrap();

        let mut urls = UrlMap::new();
        urls.insert(DestinationId::Devto, "https://dev.to/x".to_string());
        urls.insert(DestinationId::Juejin, "https://juejin.cn/post/1".to_string());
        summary.publish_summary(&article(), &urls).await.unwrap();
    }

    #[tokio::test]
    async fn test_card_falls_back_to_trending_page() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "news": {"articles": [{"url": "https://github.com/trending/rust?since=weekly"}]}
            })))
            .respond_with(ok_reply())
            .expect(1)
            .mount(&server)
            .await;

        let summary = WecomSummary::new(
            reqwest::Client::new(),
            &[server.uri()],
            None,
            "https://github.com/trending/rust?since=weekly",
        )
        .unwrap();
        summary.publish_summary(&article(), &UrlMap::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_one_failing_webhook_fails_after_trying_all() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bad"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"errcode": 93000, "errmsg": "invalid webhook url"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/good"))
            .respond_with(ok_reply())
            .expect(1)
            .mount(&server)
            .await;

        let summary = WecomSummary::new(
            reqwest::Client::new(),
            &[format!("{}/bad", server.uri()), format!("{}/good", server.uri())],
            None,
            "https://github.com/trending",
        )
        .unwrap();

        let err = summary
            .publish_summary(&article(), &UrlMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Api(ref m) if m.contains("1 of 2")));
    }
}
