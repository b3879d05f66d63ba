//! Integration tests for fan-out publishing: one destination failing must not
//! stop the others, and the summary card only sees successful URLs.

use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use std::sync::Arc;
use trendpress::alert::WeComAlerter;
use trendpress::article::{ArticleDocument, ArticleFormat};
use trendpress::publish::{
    DestinationId, Dispatcher, DevtoPublisher, JuejinPublisher, Publisher, SummaryPublisher,
    WecomSummary,
};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn article() -> ArticleDocument {
    ArticleDocument {
        title: "GitHub Rust weekly".to_string(),
        body: "# GitHub Rust weekly\n\nThe hottest Rust repositories this week.\n\n1. [octo/foo](https://github.com/octo/foo)\n"
            .to_string(),
        format: ArticleFormat::Markdown,
        generated_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
    }
}

fn ok_reply() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({"errcode": 0, "errmsg": "ok"}))
}

#[tokio::test]
async fn test_failed_destination_is_isolated_and_alerted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/devto/api/articles"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/juejin/content_api/v1/article/publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "err_no": 0, "err_msg": "success", "data": {"article_id": "42"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    // Alert for the dev.to failure
    Mock::given(method("POST"))
        .and(path("/alert"))
        .and(body_string_contains("publish to devto"))
        .respond_with(ok_reply())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/wecom"))
        .and(body_string_contains("https://juejin.cn/post/42"))
        .respond_with(ok_reply())
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let devto: Arc<dyn Publisher> = Arc::new(
        DevtoPublisher::new(
            client.clone(),
            &format!("{}/devto", server.uri()),
            SecretString::from("key".to_string()),
            vec!["rust".to_string()],
        )
        .unwrap(),
    );
    let juejin: Arc<dyn Publisher> = Arc::new(
        JuejinPublisher::new(
            client.clone(),
            &format!("{}/juejin", server.uri()),
            SecretString::from("sessionid=abc".to_string()),
            "6809637769959178254".to_string(),
            Vec::new(),
        )
        .unwrap(),
    );
    let summary: Arc<dyn SummaryPublisher> = Arc::new(
        WecomSummary::new(
            client.clone(),
            &[format!("{}/wecom", server.uri())],
            None,
            "https://github.com/trending/rust?since=weekly",
        )
        .unwrap(),
    );
    let alert = Arc::new(WeComAlerter::new(client, &format!("{}/alert", server.uri())).unwrap());

    let dispatcher = Dispatcher::new(vec![devto, juejin], Some(summary), alert);
    assert_eq!(
        dispatcher.destinations(),
        vec![DestinationId::Devto, DestinationId::Juejin, DestinationId::Wecom]
    );

    let outcome = dispatcher.dispatch(&article()).await;

    let order: Vec<_> = outcome.results.iter().map(|r| r.destination).collect();
    assert_eq!(
        order,
        vec![DestinationId::Devto, DestinationId::Juejin, DestinationId::Wecom]
    );

    let failed: Vec<_> = outcome.failures().map(|r| r.destination).collect();
    assert_eq!(failed, vec![DestinationId::Devto]);
    assert!(outcome.results[0].error.as_deref().unwrap().contains("500"));

    assert_eq!(outcome.urls.len(), 1);
    assert_eq!(
        outcome.urls.get(&DestinationId::Juejin).map(String::as_str),
        Some("https://juejin.cn/post/42")
    );
}

#[tokio::test]
async fn test_summary_failure_is_reported_last() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/wecom"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"errcode": 93000, "errmsg": "invalid webhook url"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/alert"))
        .respond_with(ok_reply())
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let summary: Arc<dyn SummaryPublisher> = Arc::new(
        WecomSummary::new(
            client.clone(),
            &[format!("{}/wecom", server.uri())],
            None,
            "https://github.com/trending/rust?since=weekly",
        )
        .unwrap(),
    );
    let alert = Arc::new(WeComAlerter::new(client, &format!("{}/alert", server.uri())).unwrap());

    let outcome = Dispatcher::new(Vec::new(), Some(summary), alert)
        .dispatch(&article())
        .await;

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].destination, DestinationId::Wecom);
    assert!(!outcome.results[0].is_success());
    assert!(outcome.urls.is_empty());
}
