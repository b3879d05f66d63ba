use crate::util::{validate_base_url, BaseUrlError};
use async_trait::async_trait;
use lru::LruCache;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(10);
const MEMO_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Translation request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Translation service returned no text")]
    Empty,
}

/// Side-call used by the template generator to add a translated line under
/// descriptions and README previews.
#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText", default)]
    translated_text: String,
}

/// Client for a LibreTranslate-compatible `/translate` endpoint.
///
/// Results are memoised, so descriptions repeated between the summary list
/// and the detail section are translated once.
pub struct LibreTranslator {
    client: reqwest::Client,
    endpoint: String,
    source: String,
    target: String,
    api_key: Option<SecretString>,
    memo: Mutex<LruCache<String, String>>,
}

impl LibreTranslator {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        source: &str,
        target: &str,
        api_key: Option<SecretString>,
    ) -> Result<Self, BaseUrlError> {
        let base = validate_base_url(base_url)?;
        let capacity = NonZeroUsize::new(MEMO_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            client,
            endpoint: format!("{base}/translate"),
            source: source.to_string(),
            target: target.to_string(),
            api_key,
            memo: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn memo_get(&self, text: &str) -> Option<String> {
        self.memo.lock().ok()?.get(text).cloned()
    }

    fn memo_put(&self, text: &str, translated: &str) {
        if let Ok(mut memo) = self.memo.lock() {
            memo.put(text.to_string(), translated.to_string());
        }
    }
}

#[async_trait]
impl Translate for LibreTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        if let Some(hit) = self.memo_get(text) {
            return Ok(hit);
        }

        let body = TranslateRequest {
            q: text,
            source: &self.source,
            target: &self.target,
            format: "text",
            api_key: self.api_key.as_ref().map(|k| k.expose_secret()),
        };

        let response = tokio::time::timeout(
            TRANSLATE_TIMEOUT,
            self.client.post(&self.endpoint).json(&body).send(),
        )
        .await
        .map_err(|_| TranslateError::Timeout)??;

        if !response.status().is_success() {
            return Err(TranslateError::HttpStatus(response.status().as_u16()));
        }

        let parsed: TranslateResponse = response.json().await?;
        if parsed.translated_text.trim().is_empty() {
            return Err(TranslateError::Empty);
        }

        self.memo_put(text, &parsed.translated_text);
        Ok(parsed.translated_text)
    }
}
