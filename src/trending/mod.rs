//! GitHub Trending listing: request model, HTML parsing, fetching and the
//! per-day on-disk cache.
//!
//! - [`parser`] - turns the listing page into [`RepositoryRecord`]s
//! - [`fetcher`] - builds the listing URL and performs the bounded GET
//! - [`cache`] - JSON cache keyed by query and date

mod cache;
mod fetcher;
mod parser;

pub use cache::{CacheError, TrendingCache};
pub use fetcher::{FetchError, TrendingFetcher, DEFAULT_TRENDING_URL};
pub use parser::{parse_count, parse_trending, ParseResult};
#[cfg(test)]
pub(crate) use parser::fixtures;

use crate::enrich::DetailRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time window of a trending listing (`since` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::Daily => "daily",
            TimeRange::Weekly => "weekly",
            TimeRange::Monthly => "monthly",
        }
    }

    /// "daily report", "weekly report", "monthly report"
    pub fn report_type_label(self) -> &'static str {
        match self {
            TimeRange::Daily => "daily report",
            TimeRange::Weekly => "weekly report",
            TimeRange::Monthly => "monthly report",
        }
    }

    pub fn time_range_label(self) -> &'static str {
        match self {
            TimeRange::Daily => "in the past 24 hours",
            TimeRange::Weekly => "in the past 7 days",
            TimeRange::Monthly => "in the past 30 days",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time range '{0}' (expected daily, weekly or monthly)")]
pub struct InvalidTimeRange(pub String);

impl FromStr for TimeRange {
    type Err = InvalidTimeRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(TimeRange::Daily),
            "weekly" => Ok(TimeRange::Weekly),
            "monthly" => Ok(TimeRange::Monthly),
            _ => Err(InvalidTimeRange(s.to_string())),
        }
    }
}

/// Parameters of one trending fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendingQuery {
    /// Programming-language path segment; empty means all languages.
    pub language: String,
    pub since: TimeRange,
    /// Optional `spoken_language_code` filter (e.g. "zh").
    pub spoken_language: Option<String>,
}

impl TrendingQuery {
    pub fn new(language: impl Into<String>, since: TimeRange) -> Self {
        Self {
            language: language.into(),
            since,
            spoken_language: None,
        }
    }

    /// Heading-friendly label, e.g. "GitHub Rust projects".
    pub fn language_label(&self) -> String {
        if self.language.is_empty() {
            "GitHub trending projects".to_string()
        } else {
            format!("GitHub {} projects", self.language)
        }
    }

    /// Default article title, e.g. "GitHub Rust projects weekly report".
    pub fn default_title(&self) -> String {
        format!("{} {}", self.language_label(), self.since.report_type_label())
    }
}

/// One repository row from the trending listing, optionally enriched.
///
/// `name` is `owner/repo` and is unique within a fetch batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub forks: u64,
    /// Stars gained inside the requested window ("123 stars this week").
    #[serde(default)]
    pub period_stars: u64,
    pub language: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DetailRecord>,
}

impl RepositoryRecord {
    pub fn owner(&self) -> &str {
        self.name.split_once('/').map(|(o, _)| o).unwrap_or(&self.name)
    }

    pub fn repo(&self) -> &str {
        self.name.split_once('/').map(|(_, r)| r).unwrap_or("")
    }

    /// Merges enrichment results into the record.
    ///
    /// An empty listing description is replaced by the metadata description.
    pub fn with_details(mut self, details: DetailRecord) -> Self {
        if self.description.is_empty() {
            if let Some(desc) = details.description.as_deref() {
                self.description = desc.to_string();
            }
        }
        self.details = Some(details);
        self
    }
}
