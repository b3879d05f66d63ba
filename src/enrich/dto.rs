//! Wire shapes of the GitHub REST responses used during enrichment.
//!
//! Every field is optional so that a missing or `null` key parses as
//! "absent" instead of failing the whole response.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RepoMetadata {
    pub description: Option<String>,
    pub license: Option<LicenseInfo>,
    pub topics: Option<Vec<String>>,
    pub homepage: Option<String>,
    pub open_issues: Option<u64>,
    pub watchers: Option<u64>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LicenseInfo {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ReadmeResponse {
    pub content: Option<String>,
    pub encoding: Option<String>,
}
