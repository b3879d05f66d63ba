use super::{send_json, DestinationId, PublishError, Publisher};
use crate::article::ArticleDocument;
use crate::util::{validate_base_url, BaseUrlError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const JUEJIN_API_BASE: &str = "https://api.juejin.cn";
const POST_URL_PREFIX: &str = "https://juejin.cn/post/";

#[derive(Serialize)]
struct PublishRequest<'a> {
    title: &'a str,
    content: &'a str,
    category_id: &'a str,
    tag_ids: &'a [String],
    link_url: &'a str,
    cover_image: &'a str,
    is_gfw: u8,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PublishReply {
    err_no: i64,
    err_msg: String,
    data: Option<PublishedArticle>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PublishedArticle {
    article_id: Option<String>,
}

/// Juejin article API, authenticated with a browser session cookie.
pub struct JuejinPublisher {
    client: reqwest::Client,
    endpoint: String,
    cookie: SecretString,
    category_id: String,
    tag_ids: Vec<String>,
}

impl JuejinPublisher {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        cookie: SecretString,
        category_id: String,
        tag_ids: Vec<String>,
    ) -> Result<Self, BaseUrlError> {
        let base = validate_base_url(base_url)?;
        Ok(Self {
            client,
            endpoint: format!("{base}/content_api/v1/article/publish"),
            cookie,
            category_id,
            tag_ids,
        })
    }
}

#[async_trait]
impl Publisher for JuejinPublisher {
    fn id(&self) -> DestinationId {
        DestinationId::Juejin
    }

    async fn publish(&self, article: &ArticleDocument) -> Result<Option<String>, PublishError> {
        let body = PublishRequest {
            title: &article.title,
            content: &article.body,
            category_id: &self.category_id,
            tag_ids: &self.tag_ids,
            link_url: "",
            cover_image: "",
            is_gfw: 0,
        };
        let reply: PublishReply = send_json(
            self.client
                .post(&self.endpoint)
                .header(reqwest::header::COOKIE, self.cookie.expose_secret())
                .json(&body),
        )
        .await?;

        if reply.err_no != 0 {
            return Err(PublishError::Api(format!("{}: {}", reply.err_no, reply.err_msg)));
        }
        let article_id = reply
            .data
            .and_then(|d| d.article_id)
            .filter(|id| !id.is_empty())
            .ok_or(PublishError::MissingField("data.article_id"))?;

        let url = format!("{POST_URL_PREFIX}{article_id}");
        tracing::info!(url = %url, "Published to Juejin");
        Ok(Some(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::test_support::article;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn publisher(server: &MockServer) -> JuejinPublisher {
        JuejinPublisher::new(
            reqwest::Client::new(),
            &server.uri(),
            SecretString::from("sessionid=abc".to_string()),
            "6809637769959178254".to_string(),
            vec!["6809640407484334093".to_string()],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_builds_post_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content_api/v1/article/publish"))
            .and(header("cookie", "sessionid=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "err_no": 0, "err_msg": "success", "data": {"article_id": "7300000000000000001"}
            })))
            .mount(&server)
            .await;

        let url = publisher(&server).publish(&article()).await.unwrap();
        assert_eq!(url.as_deref(), Some("https://juejin.cn/post/7300000000000000001"));
    }

    #[tokio::test]
    async fn test_publish_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "err_no": 403, "err_msg": "must login", "data": null
            })))
            .mount(&server)
            .await;

        let err = publisher(&server).publish(&article()).await.unwrap_err();
        assert!(matches!(err, PublishError::Api(ref m) if m.contains("must login")));
    }
}
