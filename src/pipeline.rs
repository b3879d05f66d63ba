//! One end-to-end run: fetch → enrich → generate → publish.
use crate::alert::{alerter_from_config, Alert};
use crate::article::{
    ArticleDocument, ArticleGenerator, LibreTranslator, LlmProvider, LlmWriter, ReportLabels,
};
use crate::config::{Config, ConfigError};
use crate::enrich::Enricher;
use crate::publish::{build_publishers, Dispatcher, PublishResult, UrlMap};
use crate::trending::{FetchError, RepositoryRecord, TrendingCache, TrendingFetcher, TrendingQuery};
use chrono::Utc;
use secrecy::SecretString;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Fetching the trending listing failed: {0}")]
    Fetch(#[from] FetchError),

    /// The page parsed to zero repositories, most likely a markup change.
    #[error("Trending listing at {url} contained no repositories")]
    EmptyListing { url: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Stages of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum RunStage {
    #[default]
    Init,
    Fetched,
    Enriched,
    Generated,
    Publishing,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Init => "INIT",
            RunStage::Fetched => "FETCHED",
            RunStage::Enriched => "ENRICHED",
            RunStage::Generated => "GENERATED",
            RunStage::Publishing => "PUBLISHING",
            RunStage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// What a completed run produced.
#[derive(Debug, Default)]
pub struct RunReport {
    pub stage: RunStage,
    pub repositories: usize,
    pub article: Option<ArticleDocument>,
    pub results: Vec<PublishResult>,
    pub urls: UrlMap,
}

impl RunReport {
    fn advance(&mut self, stage: RunStage) {
        self.stage = stage;
        tracing::info!(stage = %stage, repositories = self.repositories, "Run stage");
    }
}

/// Wires the stages together. Build with [`Pipeline::from_config`] or the
/// `with_*` methods.
pub struct Pipeline {
    fetcher: TrendingFetcher,
    query: TrendingQuery,
    cache: Option<TrendingCache>,
    enricher: Option<Enricher>,
    generator: ArticleGenerator,
    title: String,
    dispatcher: Option<Dispatcher>,
    alert: Arc<dyn Alert>,
}

impl Pipeline {
    /// A pipeline with no cache, no enrichment and no destinations.
    pub fn new(
        fetcher: TrendingFetcher,
        query: TrendingQuery,
        generator: ArticleGenerator,
        alert: Arc<dyn Alert>,
    ) -> Self {
        let title = query.default_title();
        Self {
            fetcher,
            query,
            cache: None,
            enricher: None,
            generator,
            title,
            dispatcher: None,
            alert,
        }
    }

    pub fn with_cache(mut self, cache: TrendingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Without a dispatcher the run stops after generation (dry run).
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn query(&self) -> &TrendingQuery {
        &self.query
    }

    /// Builds every component from configuration.
    ///
    /// All destinations are constructed here, before any request is made, so a
    /// missing credential fails the run immediately. With `dry_run` no
    /// destinations are built at all.
    pub fn from_config(
        config: &Config,
        client: &reqwest::Client,
        dry_run: bool,
    ) -> Result<Self, ConfigError> {
        let t = &config.trending;
        if t.limit == 0 {
            return Err(ConfigError::invalid("trending.limit", "0"));
        }
        let query = TrendingQuery {
            language: t.language.trim().to_string(),
            since: t.time_range(),
            spoken_language: t.spoken_language.clone().filter(|s| !s.trim().is_empty()),
        };
        let fetcher = TrendingFetcher::new(client.clone(), &t.base_url)
            .map_err(|e| ConfigError::invalid("trending.base_url", e.to_string()))?
            .with_timeout(Duration::from_secs(t.timeout_secs))
            .with_limit(t.limit);

        let alert = alerter_from_config(&config.alert, client)?;
        let generator = build_generator(config, client)?;
        let title = config
            .article
            .title
            .clone()
            .unwrap_or_else(|| query.default_title());

        let mut pipeline = Pipeline::new(fetcher, query, generator, Arc::clone(&alert)).with_title(title);

        if config.cache.enabled {
            match config.cache.dir.clone().or_else(default_cache_dir) {
                Some(dir) => pipeline = pipeline.with_cache(TrendingCache::new(dir)),
                None => tracing::warn!("No cache directory available, listing cache disabled"),
            }
        }

        match config.github.token.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                let enricher = Enricher::new(
                    client.clone(),
                    &config.github.api_base,
                    SecretString::from(token.to_string()),
                )
                .map_err(|e| ConfigError::invalid("github.api_base", e.to_string()))?
                .with_timeout(Duration::from_secs(config.github.timeout_secs))
                .with_concurrency(config.github.concurrency);
                pipeline = pipeline.with_enricher(enricher);
            }
            None => tracing::warn!("No GitHub token configured, skipping repository enrichment"),
        }

        if !dry_run {
            let fallback_url = pipeline
                .fetcher
                .listing_url(&pipeline.query)
                .map_err(|e| ConfigError::invalid("trending.base_url", e.to_string()))?
                .to_string();
            let set = build_publishers(&config.publishers, client, &pipeline.query, &fallback_url)?;
            if set.is_empty() {
                tracing::warn!("No publishing destinations enabled");
            }
            pipeline = pipeline.with_dispatcher(Dispatcher::new(set.publishers, set.summary, alert));
        }

        Ok(pipeline)
    }

    /// Executes INIT → FETCHED → ENRICHED → GENERATED → PUBLISHING → DONE.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Fetch`] - the listing could not be fetched
    /// - [`PipelineError::EmptyListing`] - the listing parsed to nothing
    ///
    /// Both are alerted before returning and nothing is published. Failures
    /// of individual destinations are not errors; they are recorded in the
    /// report.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();
        report.advance(RunStage::Init);

        let records = match self.load_listing().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Fetching trending listing failed");
                self.alert.send_alert("fetch trending listing", &e).await;
                return Err(PipelineError::Fetch(e));
            }
        };
        report.repositories = records.len();
        report.advance(RunStage::Fetched);

        if records.is_empty() {
            let url = self
                .fetcher
                .listing_url(&self.query)
                .map(|u| u.to_string())
                .unwrap_or_default();
            let err = PipelineError::EmptyListing { url };
            tracing::warn!(error = %err, "Nothing to publish");
            self.alert.send_alert("parse trending listing", &err).await;
            return Err(err);
        }

        let records = match &self.enricher {
            Some(enricher) => enricher.enrich_all(records).await,
            None => records,
        };
        report.advance(RunStage::Enriched);

        let labels = ReportLabels::from_query(&self.query);
        let article = self.generator.generate(&records, &labels, &self.title).await;
        report.advance(RunStage::Generated);

        if let Some(dispatcher) = &self.dispatcher {
            report.advance(RunStage::Publishing);
            let outcome = dispatcher.dispatch(&article).await;
            report.results = outcome.results;
            report.urls = outcome.urls;
        }

        report.article = Some(article);
        report.advance(RunStage::Done);
        Ok(report)
    }

    /// Cache first, then the network. Fresh non-empty listings are cached.
    ///
    /// Keyed by the UTC date, the same clock as the article timestamp that
    /// dated file names and slugs are derived from.
    async fn load_listing(&self) -> Result<Vec<RepositoryRecord>, FetchError> {
        let today = Utc::now().date_naive();

        if let Some(cache) = &self.cache {
            if let Some(mut records) = cache.load(&self.query, today).await {
                if !records.is_empty() {
                    records.truncate(self.fetcher.limit());
                    return Ok(records);
                }
            }
        }

        let records = self.fetcher.fetch(&self.query).await?;
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(&self.query, today, &records).await {
                tracing::warn!(error = %e, "Failed to cache trending listing");
            }
        }
        Ok(records)
    }
}

fn build_generator(config: &Config, client: &reqwest::Client) -> Result<ArticleGenerator, ConfigError> {
    let a = &config.article;
    let mut generator = ArticleGenerator::new(a.format);

    if a.translate.enabled {
        let base_url = a
            .translate
            .base_url
            .as_deref()
            .ok_or_else(|| ConfigError::missing("article.translate.base_url"))?;
        let translator = LibreTranslator::new(
            client.clone(),
            base_url,
            &a.translate.source,
            &a.translate.target,
            a.translate.api_key.clone().map(SecretString::from),
        )
        .map_err(|e| ConfigError::invalid("article.translate.base_url", e.to_string()))?;
        generator = generator.with_translator(Arc::new(translator));
    }

    if a.llm.enabled {
        let provider = LlmProvider::parse(&a.llm.provider)
            .map_err(|_| ConfigError::invalid("article.llm.provider", a.llm.provider.clone()))?;
        let api_key = a
            .llm
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::missing("article.llm.api_key"))?;
        let writer = LlmWriter::new(
            client.clone(),
            provider,
            a.llm.base_url.as_deref(),
            a.llm.model.as_deref(),
            SecretString::from(api_key),
        )
        .map_err(|e| ConfigError::invalid("article.llm.base_url", e.to_string()))?;
        generator = generator.with_llm(writer);
    }

    Ok(generator)
}

fn default_cache_dir() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".cache").join("trendpress"))
}
