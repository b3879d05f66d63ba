use super::{RepositoryRecord, TrendingQuery};
use crate::util::atomic_write_async;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to write cache file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize listing: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Per-day JSON cache of trending listings.
///
/// One file per (language, time range, spoken language, date). Entries are
/// written once after a successful non-empty fetch and read before fetching,
/// so repeated runs on the same day do not hit the listing page again.
#[derive(Debug, Clone)]
pub struct TrendingCache {
    dir: PathBuf,
}

impl TrendingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `github_trending_<language|all>_<since>[_<spoken>]_<YYYY-MM-DD>.json`
    pub fn path_for(&self, query: &TrendingQuery, date: NaiveDate) -> PathBuf {
        let language = if query.language.is_empty() {
            "all".to_string()
        } else {
            sanitize(&query.language)
        };
        let mut key = format!("{}_{}", language, query.since.as_str());
        if let Some(spoken) = query.spoken_language.as_deref().filter(|s| !s.is_empty()) {
            key.push('_');
            key.push_str(&sanitize(spoken));
        }
        self.dir
            .join(format!("github_trending_{}_{}.json", key, date.format("%Y-%m-%d")))
    }

    /// Returns the cached listing, or `None` on a miss.
    ///
    /// A corrupt or unreadable entry is logged and treated as a miss.
    pub async fn load(&self, query: &TrendingQuery, date: NaiveDate) -> Option<Vec<RepositoryRecord>> {
        let path = self.path_for(query, date);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Trending cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read trending cache");
                return None;
            }
        };

        match serde_json::from_str::<Vec<RepositoryRecord>>(&content) {
            Ok(records) => {
                tracing::info!(path = %path.display(), count = records.len(), "Loaded listing from cache");
                Some(records)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Corrupt trending cache entry ignored");
                None
            }
        }
    }

    /// Stores a listing. Empty listings are never cached.
    pub async fn store(
        &self,
        query: &TrendingQuery,
        date: NaiveDate,
        records: &[RepositoryRecord],
    ) -> Result<Option<PathBuf>, CacheError> {
        if records.is_empty() {
            return Ok(None);
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(query, date);
        let json = serde_json::to_vec_pretty(records)?;
        atomic_write_async(path.clone(), json).await?;
        tracing::info!(path = %path.display(), count = records.len(), "Saved listing to cache");
        Ok(Some(path))
    }
}

/// Keeps cache file names flat (e.g. "c++" stays, "a/b" becomes "a-b").
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '+' | '-' | '.' | '#') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}
