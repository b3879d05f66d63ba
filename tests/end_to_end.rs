//! Integration tests for a full run: listing page → enrichment → article →
//! destinations.
//!
//! Every remote collaborator (trending page, GitHub API, WeCom webhook) is a
//! wiremock server; the local-file destination writes into a temp dir.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use std::sync::Arc;
use tempfile::TempDir;
use trendpress::alert::LogAlerter;
use trendpress::article::{ArticleFormat, ArticleGenerator};
use trendpress::enrich::Enricher;
use trendpress::pipeline::{Pipeline, RunStage};
use trendpress::publish::{
    DestinationId, Dispatcher, LocalFilePublisher, Publisher, SummaryPublisher, WecomSummary,
};
use trendpress::trending::{TimeRange, TrendingFetcher, TrendingQuery};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn entry(name: &str, desc: &str, stars: &str, forks: &str) -> String {
    format!(
        r#"<article class="Box-row">
  <h2 class="h3 lh-condensed"><a href="/{name}">{name}</a></h2>
  <p class="col-9 color-fg-muted my-1 pr-4">{desc}</p>
  <div class="f6 color-fg-muted mt-2">
    <span itemprop="programmingLanguage">Rust</span>
    <a class="Link--muted d-inline-block mr-3" href="/{name}/stargazers">{stars}</a>
    <a class="Link--muted d-inline-block mr-3" href="/{name}/forks">{forks}</a>
  </div>
</article>"#
    )
}

fn listing() -> String {
    format!(
        "<html><body>{}{}</body></html>",
        entry("octo/foo", "Foo does things", "1,500", "20"),
        entry("octo/bar", "", "--", "5"),
    )
}

async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/trending/rust"))
        .and(query_param("since", "weekly"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing()))
        .mount(server)
        .await;
}

fn base_pipeline(server: &MockServer) -> Pipeline {
    let fetcher =
        TrendingFetcher::new(reqwest::Client::new(), &format!("{}/trending", server.uri())).unwrap();
    Pipeline::new(
        fetcher,
        TrendingQuery::new("rust", TimeRange::Weekly),
        ArticleGenerator::new(ArticleFormat::Markdown),
        Arc::new(LogAlerter),
    )
}

#[tokio::test]
async fn test_two_repositories_render_in_order_with_parsed_counts() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let report = base_pipeline(&server).run().await.unwrap();
    assert_eq!(report.stage, RunStage::Done);
    assert_eq!(report.repositories, 2);

    let body = report.article.unwrap().body;
    let foo = body.find("1. [octo/foo](https://github.com/octo/foo)").unwrap();
    let bar = body.find("2. [octo/bar](https://github.com/octo/bar)").unwrap();
    assert!(foo < bar);
    assert!(!body.contains("3. ["));

    let foo_details = &body[body.find("### 1. octo/foo").unwrap()..body.find("### 2. octo/bar").unwrap()];
    let bar_details = &body[body.find("### 2. octo/bar").unwrap()..];
    assert!(foo_details.contains("- **Stars**: 1500\n"));
    assert!(foo_details.contains("- **Forks**: 20\n"));
    assert!(bar_details.contains("- **Stars**: 0\n"));
    assert!(bar_details.contains("- **Forks**: 5\n"));
}

#[tokio::test]
async fn test_full_run_enriches_and_publishes() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    // GitHub API: foo has metadata, bar is gone (404 for everything)
    Mock::given(method("GET"))
        .and(path("/api/repos/octo/foo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "description": "Foo does things",
            "license": {"name": "MIT License"},
            "topics": ["cli"],
            "open_issues": 2,
            "watchers": 7,
            "updated_at": "2026-10-17T08:30:00Z"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/repos/octo/foo/contributors"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!([{"login": "alice"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(u8::MAX)
        .mount(&server)
        .await;

    // Summary card must link to the local file, the only URL produced
    Mock::given(method("POST"))
        .and(path("/wecom"))
        .and(body_partial_json(serde_json::json!({"msgtype": "news"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"errcode": 0, "errmsg": "ok"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let query = TrendingQuery::new("rust", TimeRange::Weekly);
    let local: Arc<dyn Publisher> = Arc::new(LocalFilePublisher::new(
        out.path(),
        "{language}-{since}.{ext}",
        &query,
    ));
    let summary: Arc<dyn SummaryPublisher> = Arc::new(
        WecomSummary::new(
            reqwest::Client::new(),
            &[format!("{}/wecom", server.uri())],
            None,
            "https://github.com/trending/rust?since=weekly",
        )
        .unwrap(),
    );
    let enricher = Enricher::new(
        reqwest::Client::new(),
        &format!("{}/api", server.uri()),
        SecretString::from("ghp_test".to_string()),
    )
    .unwrap();

    let pipeline = base_pipeline(&server)
        .with_enricher(enricher)
        .with_title("Rust weekly")
        .with_dispatcher(Dispatcher::new(vec![local], Some(summary), Arc::new(LogAlerter)));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.stage, RunStage::Done);

    let article = report.article.unwrap();
    assert!(article.body.starts_with("# Rust weekly\n"));
    assert!(article.body.contains("- **License**: MIT License\n"));
    assert!(article.body.contains("- **Top contributors**: [alice](https://github.com/alice)\n"));

    let written = std::fs::read_to_string(out.path().join("rust-weekly.md")).unwrap();
    assert_eq!(written, article.body);

    let destinations: Vec<_> = report.results.iter().map(|r| r.destination).collect();
    assert_eq!(destinations, vec![DestinationId::LocalFile, DestinationId::Wecom]);
    assert!(report.results.iter().all(|r| r.is_success()));
    assert!(report.urls[&DestinationId::LocalFile].starts_with("file://"));

    let requests = server.received_requests().await.unwrap();
    let card = requests.iter().find(|r| r.url.path() == "/wecom").unwrap();
    let card: serde_json::Value = serde_json::from_slice(&card.body).unwrap();
    assert_eq!(
        card["news"]["articles"][0]["url"].as_str(),
        Some(report.urls[&DestinationId::LocalFile].as_str())
    );
}
