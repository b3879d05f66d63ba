//! Configuration file parser for ~/.config/trendpress/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Environment variables are layered on top with [`Config::apply_env`], and
//! command-line flags are applied last by the binary.
use crate::article::ArticleFormat;
use crate::trending::{TimeRange, DEFAULT_TRENDING_URL};
use serde::Deserialize;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A setting required by an enabled component is absent.
    #[error("Missing required setting: {key}")]
    Missing { key: String },

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

impl ConfigError {
    pub(crate) fn missing(key: &str) -> Self {
        ConfigError::Missing {
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(key: &str, value: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

/// Debug helper for credentials: shows whether a value is set, never the value.
fn masked(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "[REDACTED]")
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// Every table uses `#[serde(default)]` so any subset of keys can be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub trending: TrendingConfig,
    pub github: GithubConfig,
    pub cache: CacheConfig,
    pub article: ArticleConfig,
    pub alert: AlertConfig,
    pub publishers: PublishersConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendingConfig {
    pub base_url: String,
    /// Language path segment; empty for all languages.
    pub language: String,
    /// `daily`, `weekly` or `monthly`. Anything else reads as weekly.
    pub since: String,
    pub spoken_language: Option<String>,
    pub limit: usize,
    pub timeout_secs: u64,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TRENDING_URL.to_string(),
            language: String::new(),
            since: "weekly".to_string(),
            spoken_language: None,
            limit: 10,
            timeout_secs: 15,
        }
    }
}

impl TrendingConfig {
    /// Parsed `since`, degrading to weekly on an unknown value.
    pub fn time_range(&self) -> TimeRange {
        self.since.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to weekly listing");
            TimeRange::Weekly
        })
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_base: String,
    /// Without a token, enrichment is skipped.
    pub token: Option<String>,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: crate::enrich::DEFAULT_API_BASE.to_string(),
            token: None,
            concurrency: 4,
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_base", &self.api_base)
            .field("token", &masked(&self.token))
            .field("concurrency", &self.concurrency)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Defaults to `~/.cache/trendpress` when unset.
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArticleConfig {
    pub format: ArticleFormat,
    /// Overrides the title derived from the query.
    pub title: Option<String>,
    pub llm: LlmConfig,
    pub translate: TranslateConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// `openai` or `deepseek`.
    pub provider: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            base_url: None,
            model: None,
            api_key: None,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &masked(&self.api_key))
            .finish()
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub source: String,
    pub target: String,
    pub api_key: Option<String>,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            source: "en".to_string(),
            target: "zh".to_string(),
            api_key: None,
        }
    }
}

impl fmt::Debug for TranslateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslateConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("api_key", &masked(&self.api_key))
            .finish()
    }
}

/// Webhook URLs embed their access key, so they are redacted like tokens.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub webhook: Option<String>,
}

impl fmt::Debug for AlertConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertConfig")
            .field("webhook", &masked(&self.webhook))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PublishersConfig {
    pub devto: DevtoConfig,
    pub juejin: JuejinConfig,
    pub csdn: CsdnConfig,
    pub yuque: YuqueConfig,
    pub wechat_mp: WechatMpConfig,
    pub confluence: ConfluenceConfig,
    pub local_file: LocalFileConfig,
    pub wecom: WecomConfig,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DevtoConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub tags: Vec<String>,
}

impl Default for DevtoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: None,
            tags: vec![
                "github".to_string(),
                "trending".to_string(),
                "opensource".to_string(),
            ],
        }
    }
}

impl fmt::Debug for DevtoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevtoConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &masked(&self.api_key))
            .field("base_url", &self.base_url)
            .field("tags", &self.tags)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct JuejinConfig {
    pub enabled: bool,
    pub cookie: Option<String>,
    pub base_url: Option<String>,
    pub category_id: String,
    pub tag_ids: Vec<String>,
}

impl Default for JuejinConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie: None,
            base_url: None,
            category_id: "6809637769959178254".to_string(),
            tag_ids: vec!["6809640407484334093".to_string()],
        }
    }
}

impl fmt::Debug for JuejinConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JuejinConfig")
            .field("enabled", &self.enabled)
            .field("cookie", &masked(&self.cookie))
            .field("base_url", &self.base_url)
            .field("category_id", &self.category_id)
            .field("tag_ids", &self.tag_ids)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct CsdnConfig {
    pub enabled: bool,
    pub cookie: Option<String>,
    pub base_url: Option<String>,
    pub categories: String,
    pub tags: String,
}

impl Default for CsdnConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie: None,
            base_url: None,
            categories: "GitHub".to_string(),
            tags: "GitHub,trending,open source".to_string(),
        }
    }
}

impl fmt::Debug for CsdnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsdnConfig")
            .field("enabled", &self.enabled)
            .field("cookie", &masked(&self.cookie))
            .field("base_url", &self.base_url)
            .field("categories", &self.categories)
            .field("tags", &self.tags)
            .finish()
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct YuqueConfig {
    pub enabled: bool,
    pub token: Option<String>,
    /// `<group>/<book>` of the target knowledge base.
    pub namespace: Option<String>,
    /// Document slug prefix; the run date is appended.
    pub slug: Option<String>,
    pub base_url: Option<String>,
}

impl fmt::Debug for YuqueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YuqueConfig")
            .field("enabled", &self.enabled)
            .field("token", &masked(&self.token))
            .field("namespace", &self.namespace)
            .field("slug", &self.slug)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct WechatMpConfig {
    pub enabled: bool,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    /// Permanent image material used as the draft cover. When unset, the
    /// image at `cover_url` is uploaded on every run.
    pub thumb_media_id: Option<String>,
    pub cover_url: Option<String>,
    /// Submit the draft for publication instead of leaving it in the draft box.
    pub direct_publish: bool,
    pub base_url: Option<String>,
}

impl fmt::Debug for WechatMpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WechatMpConfig")
            .field("enabled", &self.enabled)
            .field("app_id", &self.app_id)
            .field("app_secret", &masked(&self.app_secret))
            .field("thumb_media_id", &self.thumb_media_id)
            .field("cover_url", &self.cover_url)
            .field("direct_publish", &self.direct_publish)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfluenceConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub api_token: Option<String>,
    pub space_key: Option<String>,
    pub parent_page_id: Option<String>,
}

impl fmt::Debug for ConfluenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfluenceConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("api_token", &masked(&self.api_token))
            .field("space_key", &self.space_key)
            .field("parent_page_id", &self.parent_page_id)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalFileConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    /// Supports `{date}`, `{language}`, `{since}` and `{ext}`.
    pub filename_template: String,
}

impl Default for LocalFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("output"),
            filename_template: "github-trending-{language}-{since}-{date}.{ext}".to_string(),
        }
    }
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct WecomConfig {
    pub enabled: bool,
    pub webhooks: Vec<String>,
    pub pic_url: Option<String>,
}

impl fmt::Debug for WecomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WecomConfig")
            .field("enabled", &self.enabled)
            .field("webhooks", &format_args!("[{} REDACTED]", self.webhooks.len()))
            .field("pic_url", &self.pic_url)
            .finish()
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_TABLES: [&'static str; 6] =
        ["trending", "github", "cache", "article", "alert", "publishers"];

    /// `~/.config/trendpress/config.toml`, if `HOME` is set.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("trendpress")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown top-level keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_TABLES.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Applies environment-style overrides on top of the file values.
    ///
    /// Takes the variables explicitly (normally `std::env::vars()`). Empty
    /// values are ignored; unknown keys are skipped.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            self.apply_var(&key, value)?;
        }
        Ok(())
    }

    fn apply_var(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let p = &mut self.publishers;
        let owned = || Some(value.to_string());
        match key {
            "GITHUB_TOKEN" => self.github.token = owned(),
            "GITHUB_API_BASE" => self.github.api_base = value.to_string(),
            // Values copied from .env templates may carry a trailing comment
            "GITHUB_LANGUAGE" => {
                self.trending.language = value.split('#').next().unwrap_or("").trim().to_string()
            }
            "GITHUB_SINCE" => self.trending.since = value.to_ascii_lowercase(),
            "GITHUB_SPOKEN_LANGUAGE" => self.trending.spoken_language = owned(),
            "GITHUB_LIMIT" => {
                self.trending.limit = value
                    .parse()
                    .map_err(|_| ConfigError::invalid(key, value))?
            }
            "CACHE_DIR" => self.cache.dir = Some(PathBuf::from(value)),
            "CACHE_ENABLED" => self.cache.enabled = parse_flag(key, value)?,

            "ARTICLE_FORMAT" => {
                self.article.format = match value.to_ascii_lowercase().as_str() {
                    "markdown" | "md" => ArticleFormat::Markdown,
                    "html" => ArticleFormat::Html,
                    _ => return Err(ConfigError::invalid(key, value)),
                }
            }
            "ARTICLE_TITLE" => self.article.title = owned(),
            "LLM_ENABLED" => self.article.llm.enabled = parse_flag(key, value)?,
            "LLM_PROVIDER" => self.article.llm.provider = value.to_string(),
            "LLM_BASE_URL" => self.article.llm.base_url = owned(),
            "LLM_MODEL" => self.article.llm.model = owned(),
            "LLM_API_KEY" => self.article.llm.api_key = owned(),
            "TRANSLATE_ENABLED" => self.article.translate.enabled = parse_flag(key, value)?,
            "TRANSLATE_URL" => self.article.translate.base_url = owned(),
            "TRANSLATE_SOURCE" => self.article.translate.source = value.to_string(),
            "TRANSLATE_TARGET" => self.article.translate.target = value.to_string(),
            "TRANSLATE_API_KEY" => self.article.translate.api_key = owned(),

            "ALERT_WEBHOOK" | "WECHAT_ALERT_WEBHOOK" => self.alert.webhook = owned(),

            "ENABLE_DEVTO" => p.devto.enabled = parse_flag(key, value)?,
            "DEVTO_API_KEY" => p.devto.api_key = owned(),
            "ENABLE_JUEJIN" => p.juejin.enabled = parse_flag(key, value)?,
            "JUEJIN_COOKIE" => p.juejin.cookie = owned(),
            "ENABLE_CSDN" => p.csdn.enabled = parse_flag(key, value)?,
            "CSDN_COOKIE" => p.csdn.cookie = owned(),
            "ENABLE_YUQUE" => p.yuque.enabled = parse_flag(key, value)?,
            "YUQUE_TOKEN" => p.yuque.token = owned(),
            "YUQUE_NAMESPACE" => p.yuque.namespace = owned(),
            "YUQUE_SLUG" => p.yuque.slug = owned(),
            "ENABLE_WECHAT_MP" => p.wechat_mp.enabled = parse_flag(key, value)?,
            "WECHAT_APP_ID" => p.wechat_mp.app_id = owned(),
            "WECHAT_APP_SECRET" => p.wechat_mp.app_secret = owned(),
            "WECHAT_THUMB_MEDIA_ID" => p.wechat_mp.thumb_media_id = owned(),
            "WECHAT_COVER_URL" => p.wechat_mp.cover_url = owned(),
            "WECHAT_DIRECT_PUBLISH" => p.wechat_mp.direct_publish = parse_flag(key, value)?,
            "ENABLE_CONFLUENCE" => p.confluence.enabled = parse_flag(key, value)?,
            "CONFLUENCE_URL" => p.confluence.base_url = owned(),
            "CONFLUENCE_USERNAME" => p.confluence.username = owned(),
            "CONFLUENCE_API_TOKEN" => p.confluence.api_token = owned(),
            "CONFLUENCE_SPACE_KEY" => p.confluence.space_key = owned(),
            "CONFLUENCE_PARENT_PAGE_ID" => p.confluence.parent_page_id = owned(),
            "ENABLE_LOCAL_FILE" => p.local_file.enabled = parse_flag(key, value)?,
            "LOCAL_FILE_DIR" => p.local_file.dir = PathBuf::from(value),
            "LOCAL_FILE_TEMPLATE" => p.local_file.filename_template = value.to_string(),
            "ENABLE_WECOM" => p.wecom.enabled = parse_flag(key, value)?,
            "WECOM_WEBHOOK_URLS" => {
                p.wecom.webhooks = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            }
            "WECOM_PIC_URL" => p.wecom.pic_url = owned(),
            _ => {}
        }
        Ok(())
    }
}

/// The process environment as `(key, value)` strings, for [`Config::apply_env`].
///
/// Entries that are not valid Unicode are skipped with a warning;
/// `std::env::vars` would panic on them.
pub fn process_env() -> Vec<(String, String)> {
    unicode_vars(std::env::vars_os())
}

fn unicode_vars<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (Ok(key), Err(_)) => {
                tracing::warn!(key = %key, "Skipping non-Unicode environment value");
                None
            }
            (Err(key), _) => {
                tracing::warn!(key = ?key, "Skipping non-Unicode environment key");
                None
            }
        })
        .collect()
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value)),
    }
}

// ============================================================================
// Tests
// ============================================================================
