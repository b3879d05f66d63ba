//! Side-channel alerting for failed runs and failed destinations.
use crate::config::{AlertConfig, ConfigError};
use crate::publish::WecomReply;
use crate::util::validate_base_url;
use async_trait::async_trait;
use chrono::Local;
use serde_json::json;
use std::error::Error;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

const ALERT_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives errors that the run cannot handle by itself.
///
/// Delivery is best effort: implementations log their own failures and
/// never propagate them.
#[async_trait]
pub trait Alert: Send + Sync {
    async fn send_alert(&self, context: &str, error: &(dyn Error + Send + Sync));
}

/// Writes alerts to the log only. Used when no webhook is configured.
pub struct LogAlerter;

#[async_trait]
impl Alert for LogAlerter {
    async fn send_alert(&self, context: &str, error: &(dyn Error + Send + Sync)) {
        tracing::error!(context = %context, error = %error, "Alert");
    }
}

/// Posts alerts as markdown messages to a WeCom group-bot webhook.
pub struct WeComAlerter {
    client: reqwest::Client,
    webhook: String,
}

impl WeComAlerter {
    pub fn new(client: reqwest::Client, webhook: &str) -> Result<Self, ConfigError> {
        let webhook = validate_base_url(webhook)
            .map_err(|e| ConfigError::invalid("alert.webhook", e.to_string()))?;
        Ok(Self { client, webhook })
    }

    async fn deliver(&self, content: String) -> Result<(), String> {
        let payload = json!({
            "msgtype": "markdown",
            "markdown": { "content": content },
        });
        let response = tokio::time::timeout(
            ALERT_TIMEOUT,
            self.client.post(&self.webhook).json(&payload).send(),
        )
        .await
        .map_err(|_| "timed out".to_string())?
        .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP status {}", response.status().as_u16()));
        }
        let reply: WecomReply = response.json().await.map_err(|e| e.to_string())?;
        if reply.errcode != 0 {
            return Err(format!("errcode {}: {}", reply.errcode, reply.errmsg));
        }
        Ok(())
    }
}

#[async_trait]
impl Alert for WeComAlerter {
    async fn send_alert(&self, context: &str, error: &(dyn Error + Send + Sync)) {
        tracing::error!(context = %context, error = %error, "Sending alert");
        match self.deliver(format_alert(context, error)).await {
            Ok(()) => tracing::info!("Alert delivered"),
            Err(e) => tracing::error!(error = %e, "Failed to deliver alert"),
        }
    }
}

/// Picks the WeCom alerter when a webhook is configured, else [`LogAlerter`].
pub fn alerter_from_config(
    config: &AlertConfig,
    client: &reqwest::Client,
) -> Result<Arc<dyn Alert>, ConfigError> {
    match config.webhook.as_deref().filter(|w| !w.trim().is_empty()) {
        Some(webhook) => Ok(Arc::new(WeComAlerter::new(client.clone(), webhook)?)),
        None => {
            tracing::info!("No alert webhook configured, alerts go to the log only");
            Ok(Arc::new(LogAlerter))
        }
    }
}

fn format_alert(context: &str, error: &(dyn Error + Send + Sync)) -> String {
    let mut content = String::from("### trendpress run failed\n");
    let _ = writeln!(content, "> Time: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(content, "> Stage: {context}");
    let _ = writeln!(content, "> Error: {error}");

    let mut source = error.source();
    while let Some(cause) = source {
        let _ = writeln!(content, "> Caused by: {cause}");
        source = cause.source();
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_format_includes_cause_chain() {
        let err = Outer(std::io::Error::other("disk gone"));
        let text = format_alert("fetch", &err);
        assert!(text.starts_with("### trendpress run failed\n"));
        assert!(text.contains("> Stage: fetch\n"));
        assert!(text.contains("> Error: outer failure\n"));
        assert!(text.contains("> Caused by: disk gone\n"));
    }

    #[tokio::test]
    async fn test_wecom_alert_posts_markdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"msgtype": "markdown"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0, "errmsg": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let alerter = WeComAlerter::new(reqwest::Client::new(), &server.uri()).unwrap();
        alerter
            .send_alert("publish devto", &std::io::Error::other("boom"))
            .await;
    }

    #[tokio::test]
    async fn test_wecom_alert_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 93000, "errmsg": "invalid webhook"})))
            .mount(&server)
            .await;

        let alerter = WeComAlerter::new(reqwest::Client::new(), &server.uri()).unwrap();
        // Must return normally
        alerter
            .send_alert("fetch", &std::io::Error::other("boom"))
            .await;
    }

    #[test]
    fn test_insecure_webhook_rejected() {
        assert!(WeComAlerter::new(reqwest::Client::new(), "http://qyapi.weixin.qq.com/hook").is_err());
    }
}
