use super::ReportLabels;
use crate::trending::RepositoryRecord;
use crate::util::{validate_base_url, BaseUrlError};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;
use thiserror::Error;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Completion request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Completion returned no content")]
    EmptyCompletion,
    #[error("Unknown LLM provider: {0}")]
    UnknownProvider(String),
    #[error("Invalid base URL: {0}")]
    BaseUrl(#[from] BaseUrlError),
}

/// Chat-completions providers with their default endpoint and model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    DeepSeek,
}

impl LlmProvider {
    pub fn parse(name: &str) -> Result<Self, LlmError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com/v1",
            LlmProvider::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::DeepSeek => "deepseek-chat",
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ReplyMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct LlmWriter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
}

impl LlmWriter {
    pub fn new(
        client: reqwest::Client,
        provider: LlmProvider,
        base_url: Option<&str>,
        model: Option<&str>,
        api_key: SecretString,
    ) -> Result<Self, LlmError> {
        let base = validate_base_url(base_url.unwrap_or(provider.default_base_url()))?;
        Ok(Self {
            client,
            endpoint: format!("{base}/chat/completions"),
            model: model.unwrap_or(provider.default_model()).to_string(),
            api_key,
        })
    }

    /// Asks the model for a Markdown article covering every repository.
    ///
    /// The output is not deterministic; [`ensure_all_listed`] is applied so the
    /// result always mentions each supplied repository.
    pub async fn write_article(
        &self,
        records: &[RepositoryRecord],
        labels: &ReportLabels,
    ) -> Result<String, LlmError> {
        let prompt = build_prompt(records, labels);
        let request = ChatRequest {
            model: &self.model,
            temperature: TEMPERATURE,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        tracing::info!(model = %self.model, repositories = records.len(), "Requesting LLM article");
        let response = tokio::time::timeout(
            COMPLETION_TIMEOUT,
            self.client
                .post(&self.endpoint)
                .bearer_auth(self.api_key.expose_secret())
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| LlmError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)?;

        Ok(ensure_all_listed(content, records))
    }
}

/// Fixed prompt embedding the numbered repository list.
pub fn build_prompt(records: &[RepositoryRecord], labels: &ReportLabels) -> String {
    let mut list = String::new();
    for (i, r) in records.iter().enumerate() {
        let _ = writeln!(
            list,
            "{}. [{}]({}) - {} (Stars: {})",
            i + 1,
            r.name,
            r.url,
            r.description,
            r.stars
        );
    }

    format!(
        "You are a technical editor who explains technology trends to developers in concise, \
objective and readable language.\n\n\
Using the {language} trending list below ({time_range}), write a {report_type} column article.\n\n\
Requirements:\n\
- Style: professional, concise and objective, suitable for a developer community blog.\n\
- Structure:\n\
  1. A short opening (1-2 sentences) naming the main trend.\n\
  2. An ordered list of all projects: project name plus a one-line highlight.\n\
  3. A closer look at 2-3 representative projects: innovation, use cases, community reaction.\n\
  4. A closing paragraph encouraging readers to follow or contribute.\n\
- Every project in the list must appear in the article, referenced by its owner/name.\n\
- Output format: Markdown only, with no preamble or explanation.\n\n\
Projects (ordered by stars):\n\n{list}\n\
Write the complete article.\n",
        language = labels.language,
        time_range = labels.time_range,
        report_type = labels.report_type,
    )
}

/// Appends a "More trending projects" section for repositories the body
/// never mentions.
pub fn ensure_all_listed(mut body: String, records: &[RepositoryRecord]) -> String {
    let missing: Vec<&RepositoryRecord> = records
        .iter()
        .filter(|r| !mentions(&body, &r.name))
        .collect();
    if missing.is_empty() {
        return body;
    }

    tracing::warn!(missing = missing.len(), "LLM article omitted repositories, appending them");
    body.push_str("\n\n## More trending projects\n\n");
    for r in missing {
        let _ = write!(body, "- [{}]({})", r.name, r.url);
        if !r.description.is_empty() {
            let _ = write!(body, " - {}", r.description);
        }
        body.push('\n');
    }
    body
}

/// True when `name` occurs in `text` as a whole `owner/repo` token, so
/// `microsoft/typescript` is not satisfied by `microsoft/typescript-go`.
fn mentions(text: &str, name: &str) -> bool {
    let is_name_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
    text.match_indices(name).any(|(start, _)| {
        let before_ok = text[..start].chars().next_back().map_or(true, |c| !is_name_char(c));
        let mut after = text[start + name.len()..].chars();
        let after_ok = match after.next() {
            None => true,
            // A trailing '.' ends the sentence unless more name follows
            Some('.') => after.next().map_or(true, |c| !is_name_char(c)),
            Some(c) => !is_name_char(c),
        };
        before_ok && after_ok
    })
}
