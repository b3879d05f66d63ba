use super::{DestinationId, PublishError, Publisher};
use crate::article::{ArticleDocument, ArticleFormat};
use crate::trending::TrendingQuery;
use crate::util::atomic_write_async;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use url::Url;

/// Writes the article into a local directory and returns its `file://` URL.
pub struct LocalFilePublisher {
    dir: PathBuf,
    filename_template: String,
    language: String,
    since: String,
}

impl LocalFilePublisher {
    /// `filename_template` may contain `{date}`, `{language}`, `{since}` and
    /// `{ext}`.
    pub fn new(dir: impl Into<PathBuf>, filename_template: &str, query: &TrendingQuery) -> Self {
        let language = if query.language.is_empty() {
            "all".to_string()
        } else {
            query.language.to_lowercase()
        };
        Self {
            dir: dir.into(),
            filename_template: filename_template.to_string(),
            language,
            since: query.since.as_str().to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, article: &ArticleDocument) -> String {
        let ext = match article.format {
            ArticleFormat::Markdown => "md",
            ArticleFormat::Html => "html",
        };
        self.filename_template
            .replace("{date}", &article.generated_at.format("%Y-%m-%d").to_string())
            .replace("{language}", &self.language)
            .replace("{since}", &self.since)
            .replace("{ext}", ext)
            // Keep the file inside `dir`
            .replace(['/', '\\'], "-")
    }
}

#[async_trait]
impl Publisher for LocalFilePublisher {
    fn id(&self) -> DestinationId {
        DestinationId::LocalFile
    }

    async fn publish(&self, article: &ArticleDocument) -> Result<Option<String>, PublishError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(self.file_name(article));
        atomic_write_async(path.clone(), article.body.clone().into_bytes()).await?;

        let absolute = tokio::fs::canonicalize(&path).await?;
        let url = Url::from_file_path(&absolute)
            .map_err(|()| PublishError::Api(format!("not a file path: {}", absolute.display())))?;
        tracing::info!(path = %absolute.display(), "Wrote article to local file");
        Ok(Some(url.to_string()))
    }
}
