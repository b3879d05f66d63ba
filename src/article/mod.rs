//! Article generation from a list of trending repositories.
//!
//! Two modes:
//!
//! - **Template** ([`template`]): deterministic Markdown with a summary list
//!   and per-repository details, optionally with translated descriptions.
//! - **LLM** ([`llm`]): prose written by a chat-completions model from a
//!   fixed prompt. Falls back to the template when the model call fails.
//!
//! Either body can be emitted as Markdown or converted to HTML.

mod llm;
mod template;
mod translate;

pub use llm::{build_prompt, ensure_all_listed, LlmError, LlmProvider, LlmWriter};
pub use template::render_markdown;
pub use translate::{LibreTranslator, Translate, TranslateError};

use crate::trending::{RepositoryRecord, TrendingQuery};
use chrono::{DateTime, Utc};
use pulldown_cmark::{html, Event, Options, Parser};
use serde::Deserialize;
use std::sync::Arc;

/// Output markup of the article body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleFormat {
    #[default]
    Markdown,
    Html,
}

/// Human-readable labels interpolated into the article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLabels {
    /// e.g. "GitHub Rust projects"
    pub language: String,
    /// e.g. "in the past 7 days"
    pub time_range: String,
    /// e.g. "weekly report"
    pub report_type: String,
}

impl ReportLabels {
    pub fn from_query(query: &TrendingQuery) -> Self {
        Self {
            language: query.language_label(),
            time_range: query.since.time_range_label().to_string(),
            report_type: query.since.report_type_label().to_string(),
        }
    }
}

/// A generated article, handed by value to every destination.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleDocument {
    pub title: String,
    pub body: String,
    pub format: ArticleFormat,
    pub generated_at: DateTime<Utc>,
}

impl ArticleDocument {
    /// Body as HTML, converting from Markdown if needed.
    pub fn html_body(&self) -> String {
        match self.format {
            ArticleFormat::Html => self.body.clone(),
            ArticleFormat::Markdown => markdown_to_html(&self.body),
        }
    }
}

/// Renders CommonMark (with tables and strikethrough) to HTML.
///
/// Raw HTML in the source is emitted as escaped text. Descriptions and
/// README previews are scraped and often cut mid-tag, and destinations such
/// as Confluence reject unbalanced markup.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Builds [`ArticleDocument`]s; see the module docs for the modes.
#[derive(Default)]
pub struct ArticleGenerator {
    format: ArticleFormat,
    translator: Option<Arc<dyn Translate>>,
    llm: Option<LlmWriter>,
}

impl ArticleGenerator {
    pub fn new(format: ArticleFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translate>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_llm(mut self, llm: LlmWriter) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Generates the article for `records`.
    ///
    /// Never fails: translation errors keep the original text and an LLM
    /// failure falls back to the template.
    pub async fn generate(
        &self,
        records: &[RepositoryRecord],
        labels: &ReportLabels,
        title: &str,
    ) -> ArticleDocument {
        let markdown = match &self.llm {
            Some(llm) => match llm.write_article(records, labels).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(error = %e, "LLM generation failed, using template");
                    self.render_template(records, labels, title).await
                }
            },
            None => self.render_template(records, labels, title).await,
        };

        let body = match self.format {
            ArticleFormat::Markdown => markdown,
            ArticleFormat::Html => markdown_to_html(&markdown),
        };

        tracing::info!(
            title = %title,
            repositories = records.len(),
            format = ?self.format,
            bytes = body.len(),
            "Article generated"
        );

        ArticleDocument {
            title: title.to_string(),
            body,
            format: self.format,
            generated_at: Utc::now(),
        }
    }

    async fn render_template(
        &self,
        records: &[RepositoryRecord],
        labels: &ReportLabels,
        title: &str,
    ) -> String {
        render_markdown(records, labels, title, self.translator.as_deref()).await
    }
}
