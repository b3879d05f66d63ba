use super::confluence::ConfluencePublisher;
use super::csdn::{CsdnPublisher, CSDN_API_BASE};
use super::devto::{DevtoPublisher, DEVTO_API_BASE};
use super::juejin::{JuejinPublisher, JUEJIN_API_BASE};
use super::local_file::LocalFilePublisher;
use super::wechat_mp::{WechatMpPublisher, WECHAT_API_BASE};
use super::wecom::WecomSummary;
use super::yuque::{YuquePublisher, YUQUE_API_BASE};
use super::{Publisher, SummaryPublisher};
use crate::config::{ConfigError, PublishersConfig};
use crate::trending::TrendingQuery;
use crate::util::BaseUrlError;
use secrecy::SecretString;
use std::sync::Arc;

/// The enabled destinations, ready to dispatch.
#[derive(Default)]
pub struct PublisherSet {
    pub publishers: Vec<Arc<dyn Publisher>>,
    pub summary: Option<Arc<dyn SummaryPublisher>>,
}

impl PublisherSet {
    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty() && self.summary.is_none()
    }
}

/// Builds every enabled destination from its config table.
///
/// Runs before any network activity so that a missing credential fails the
/// run up front. `fallback_url` is what the summary links to when no other
/// destination returns a URL.
pub fn build_publishers(
    config: &PublishersConfig,
    client: &reqwest::Client,
    query: &TrendingQuery,
    fallback_url: &str,
) -> Result<PublisherSet, ConfigError> {
    let mut set = PublisherSet::default();

    let c = &config.devto;
    if c.enabled {
        let publisher = DevtoPublisher::new(
            client.clone(),
            c.base_url.as_deref().unwrap_or(DEVTO_API_BASE),
            secret(&c.api_key, "publishers.devto.api_key")?,
            c.tags.clone(),
        )
        .map_err(|e| bad_url("publishers.devto.base_url", e))?;
        set.publishers.push(Arc::new(publisher));
    }

    let c = &config.juejin;
    if c.enabled {
        let publisher = JuejinPublisher::new(
            client.clone(),
            c.base_url.as_deref().unwrap_or(JUEJIN_API_BASE),
            secret(&c.cookie, "publishers.juejin.cookie")?,
            c.category_id.clone(),
            c.tag_ids.clone(),
        )
        .map_err(|e| bad_url("publishers.juejin.base_url", e))?;
        set.publishers.push(Arc::new(publisher));
    }

    let c = &config.csdn;
    if c.enabled {
        let publisher = CsdnPublisher::new(
            client.clone(),
            c.base_url.as_deref().unwrap_or(CSDN_API_BASE),
            secret(&c.cookie, "publishers.csdn.cookie")?,
            c.categories.clone(),
            c.tags.clone(),
        )
        .map_err(|e| bad_url("publishers.csdn.base_url", e))?;
        set.publishers.push(Arc::new(publisher));
    }

    let c = &config.yuque;
    if c.enabled {
        let publisher = YuquePublisher::new(
            client.clone(),
            c.base_url.as_deref().unwrap_or(YUQUE_API_BASE),
            secret(&c.token, "publishers.yuque.token")?,
            required(&c.namespace, "publishers.yuque.namespace")?,
            c.slug.as_deref(),
        )
        .map_err(|e| bad_url("publishers.yuque.base_url", e))?;
        set.publishers.push(Arc::new(publisher));
    }

    let c = &config.wechat_mp;
    if c.enabled {
        let mut publisher = WechatMpPublisher::new(
            client.clone(),
            c.base_url.as_deref().unwrap_or(WECHAT_API_BASE),
            required(&c.app_id, "publishers.wechat_mp.app_id")?,
            secret(&c.app_secret, "publishers.wechat_mp.app_secret")?,
        )
        .map_err(|e| bad_url("publishers.wechat_mp.base_url", e))?
        .with_direct_publish(c.direct_publish);
        if let Some(thumb) = c.thumb_media_id.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            publisher = publisher.with_thumb_media_id(thumb);
        }
        if let Some(cover) = c.cover_url.as_deref() {
            publisher = publisher
                .with_cover_url(cover)
                .map_err(|e| bad_url("publishers.wechat_mp.cover_url", e))?;
        }
        set.publishers.push(Arc::new(publisher));
    }

    let c = &config.confluence;
    if c.enabled {
        let publisher = ConfluencePublisher::new(
            client.clone(),
            required(&c.base_url, "publishers.confluence.base_url")?,
            required(&c.username, "publishers.confluence.username")?,
            secret(&c.api_token, "publishers.confluence.api_token")?,
            required(&c.space_key, "publishers.confluence.space_key")?,
            c.parent_page_id.as_deref(),
        )
        .map_err(|e| bad_url("publishers.confluence.base_url", e))?;
        set.publishers.push(Arc::new(publisher));
    }

    let c = &config.local_file;
    if c.enabled {
        if c.filename_template.trim().is_empty() {
            return Err(ConfigError::missing("publishers.local_file.filename_template"));
        }
        set.publishers.push(Arc::new(LocalFilePublisher::new(
            c.dir.clone(),
            &c.filename_template,
            query,
        )));
    }

    let c = &config.wecom;
    if c.enabled {
        if c.webhooks.is_empty() {
            return Err(ConfigError::missing("publishers.wecom.webhooks"));
        }
        let summary = WecomSummary::new(client.clone(), &c.webhooks, c.pic_url.as_deref(), fallback_url)
            .map_err(|e| bad_url("publishers.wecom.webhooks", e))?;
        set.summary = Some(Arc::new(summary));
    }

    let names: Vec<&str> = set.publishers.iter().map(|p| p.id().as_str()).collect();
    tracing::info!(
        destinations = ?names,
        summary = set.summary.is_some(),
        "Publishers configured"
    );
    Ok(set)
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::missing(key))
}

fn secret(value: &Option<String>, key: &str) -> Result<SecretString, ConfigError> {
    required(value, key).map(|v| SecretString::from(v.to_string()))
}

fn bad_url(key: &str, error: BaseUrlError) -> ConfigError {
    ConfigError::invalid(key, error.to_string())
}
