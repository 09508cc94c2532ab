/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use beanaries_core::consts::{BUILDBUCKET_URL, LUCI_UI_URL};
use entity::project_config::DataSource;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::{Cursor, Page, SourceConnector, SyncTarget};
use crate::error::{ScrapeError, ScrapeResult};
use crate::git::GitMirror;
use crate::infer::{buildbucket_success, luci_platform, parse_rfc3339};
use crate::record::{BuildRecord, NaturalKey};
use crate::source::{LuciLocator, SourceLocator};
use crate::transport::{HttpRequest, Transport};

const SERVICE: &str = "buildbucket";
const MAX_PAGE_SIZE: u32 = 1000;
const TIMEOUT_SECS: u64 = 60;
const XSSI_PREFIX: &str = ")]}'";
const FIELD_MASK: &str = "builds.*.id,builds.*.builder,builds.*.status,builds.*.create_time,builds.*.start_time,builds.*.end_time,builds.*.input,builds.*.infra,nextPageToken";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBuildsRequest<'a> {
    predicate: Predicate<'a>,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
    fields: &'static str,
}

#[derive(Debug, Serialize)]
struct Predicate<'a> {
    builder: BuilderId<'a>,
}

#[derive(Debug, Serialize)]
struct BuilderId<'a> {
    project: &'a str,
    bucket: &'a str,
    builder: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchBuildsResponse {
    #[serde(default)]
    builds: Vec<LuciBuild>,
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuciBuild {
    /// int64 ids arrive as JSON strings.
    pub id: Value,
    #[serde(default)]
    pub builder: Option<LuciBuilder>,
    #[serde(default)]
    pub status: Option<String>,
    pub create_time: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub input: Option<LuciInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LuciBuilder {
    pub builder: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuciInput {
    pub gitiles_commit: Option<GitilesCommit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitilesCommit {
    pub id: Option<String>,
    pub message: Option<String>,
}

impl LuciBuild {
    pub fn build_id(&self) -> String {
        match &self.id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }

    pub fn commit(&self) -> Option<&GitilesCommit> {
        self.input.as_ref()?.gitiles_commit.as_ref()
    }

    pub fn commit_sha(&self) -> Option<&str> {
        self.commit()?.id.as_deref().filter(|id| !id.is_empty())
    }
}

pub fn strip_xssi_prefix(body: &str) -> &str {
    body.strip_prefix(XSSI_PREFIX).unwrap_or(body).trim()
}

pub struct LuciConnector {
    transport: Arc<dyn Transport>,
    api_url: String,
    /// Set when builds must reference commits present in a local mirror.
    mirrors: Option<(String, PathBuf)>,
}

impl LuciConnector {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_api_url(transport, BUILDBUCKET_URL)
    }

    pub fn with_api_url(transport: Arc<dyn Transport>, api_url: impl Into<String>) -> Self {
        Self {
            transport,
            api_url: api_url.into(),
            mirrors: None,
        }
    }

    pub fn validate_commits(mut self, git: impl Into<String>, mirror_root: impl Into<PathBuf>) -> Self {
        self.mirrors = Some((git.into(), mirror_root.into()));
        self
    }

    async fn retain_known_commits(
        &self,
        locator: &LuciLocator,
        builds: Vec<LuciBuild>,
    ) -> ScrapeResult<Vec<LuciBuild>> {
        let Some((git, root)) = &self.mirrors else {
            return Ok(builds);
        };
        let Some(mirror) = GitMirror::for_luci_project(git, root, &locator.project) else {
            return Ok(builds);
        };

        let shas: Vec<String> = builds
            .iter()
            .filter_map(|b| b.commit_sha().map(str::to_string))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let known = mirror.existing_commits(&shas).await?;

        let before = builds.len();
        let builds: Vec<LuciBuild> = builds
            .into_iter()
            .filter(|b| b.commit_sha().is_none_or(|sha| known.contains(sha)))
            .collect();

        let dropped = before - builds.len();
        if dropped > 0 {
            info!(dropped, mirror = %mirror.path().display(), "Dropped builds with commits outside the mirror");
        }

        Ok(builds)
    }
}

#[async_trait]
impl SourceConnector for LuciConnector {
    type Locator = LuciLocator;
    type Item = LuciBuild;
    type Unit = LuciBuild;

    fn data_source(&self) -> DataSource {
        DataSource::Luci
    }

    fn locator<'a>(&self, locator: &'a SourceLocator) -> Option<&'a Self::Locator> {
        match locator {
            SourceLocator::Luci(l) => Some(l),
            _ => None,
        }
    }

    fn page_size(&self) -> u32 {
        MAX_PAGE_SIZE
    }

    async fn fetch_page(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> ScrapeResult<Page<Self::Item>> {
        let locator = target.locator;
        let page_token = match cursor {
            Some(Cursor::Token(token)) => Some(token.as_str()),
            _ => None,
        };

        let payload = SearchBuildsRequest {
            predicate: Predicate {
                builder: BuilderId {
                    project: &locator.project,
                    bucket: &locator.bucket,
                    builder: &locator.builder,
                },
            },
            page_size: page_size.min(MAX_PAGE_SIZE),
            page_token,
            fields: FIELD_MASK,
        };
        let body = serde_json::to_string(&payload)
            .map_err(|e| ScrapeError::configuration(format!("cannot encode request: {}", e)))?;

        let url = format!("{}/prpc/buildbucket.v2.Builds/SearchBuilds", self.api_url);
        let request = HttpRequest::post(&url)
            .header("Accept", "application/json")
            .body("application/json", body)
            .timeout(TIMEOUT_SECS);

        let response = self
            .transport
            .send(request)
            .await?
            .error_for_status(SERVICE)?;

        let text = strip_xssi_prefix(&response.body);
        let data: SearchBuildsResponse = if text.is_empty() {
            SearchBuildsResponse::default()
        } else {
            serde_json::from_str(text)
                .map_err(|e| ScrapeError::fetch(&response.url, format!("invalid JSON: {}", e)))?
        };

        let next = data
            .next_page_token
            .filter(|token| !token.is_empty())
            .map(Cursor::Token);

        Ok(Page {
            items: data.builds,
            next,
        })
    }

    fn stream_id(&self, item: &Self::Item) -> String {
        item.build_id()
    }

    fn item_key(&self, _target: SyncTarget<'_, Self::Locator>, item: &Self::Item) -> Option<NaturalKey> {
        Some(NaturalKey::external(item.build_id()))
    }

    async fn expand(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        items: Vec<Self::Item>,
    ) -> ScrapeResult<Vec<Self::Unit>> {
        self.retain_known_commits(target.locator, items)
            .await
            .inspect_err(|e| warn!(error = %e, "Cannot validate commits against mirror"))
    }

    fn map_to_canonical(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        unit: Self::Unit,
    ) -> ScrapeResult<BuildRecord> {
        let build_id = unit.build_id();
        let Some(sha) = unit.commit_sha() else {
            return Err(ScrapeError::mapping(format!(
                "build {} has no gitiles commit",
                build_id
            )));
        };

        let locator = target.locator;
        let builder = unit
            .builder
            .as_ref()
            .and_then(|b| b.builder.clone())
            .unwrap_or_else(|| locator.builder.clone());
        let status = unit.status.clone().unwrap_or_else(|| "UNKNOWN".to_string());
        let message = unit.commit().and_then(|c| c.message.as_deref());

        Ok(BuildRecord::new(
            target.config,
            NaturalKey::external(&build_id),
            sha,
            buildbucket_success(&status),
        )
        .with_message(message)
        .with_platform(luci_platform(&builder))
        .with_timing(
            unit.start_time.as_deref().and_then(parse_rfc3339),
            unit.end_time.as_deref().and_then(parse_rfc3339),
        )
        .with_runner(Some(builder.clone()))
        .with_url(Some(format!("{}/b/{}", LUCI_UI_URL, build_id)))
        .with_metadata(json!({
            "build_id": build_id,
            "builder": builder,
            "bucket": locator.bucket,
            "status": status,
            "luci_project": locator.project,
            "create_time": unit.create_time,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::fixtures;
    use crate::engine::{Scraper, SyncEngine};
    use crate::memory::MemoryRepository;
    use entity::project_config::Platform;

    const FIRST_PAGE: &str = r#")]}'
{"builds": [
  {"id": "8740000000000000102", "builder": {"project": "chromium", "bucket": "ci", "builder": "Linux Builder"},
   "status": "SUCCESS", "createTime": "2024-06-01T09:58:00Z",
   "startTime": "2024-06-01T10:00:00Z", "endTime": "2024-06-01T11:30:00Z",
   "input": {"gitilesCommit": {"host": "chromium.googlesource.com", "id": "1111111111111111111111111111111111111111"}}},
  {"id": "8740000000000000101", "builder": {"builder": "Linux Builder"}, "status": "INFRA_FAILURE",
   "startTime": "2024-06-01T08:00:00Z", "endTime": "2024-06-01T08:10:00Z",
   "input": {"gitilesCommit": {"id": "2222222222222222222222222222222222222222"}}}
], "nextPageToken": "page-2"}"#;

    const SECOND_PAGE: &str = r#")]}'
{"builds": [{"id": "8740000000000000100", "status": "SUCCESS", "input": {}}]}"#;

    fn locator() -> SourceLocator {
        SourceLocator::Luci(LuciLocator {
            project: "chromium".to_string(),
            bucket: "ci".to_string(),
            builder: "Linux Builder".to_string(),
        })
    }

    #[test]
    fn test_strip_xssi_prefix() {
        assert_eq!(strip_xssi_prefix(")]}'\n{\"builds\":[]}"), "{\"builds\":[]}");
        assert_eq!(strip_xssi_prefix("{}"), "{}");
    }

    #[tokio::test]
    async fn test_sync_follows_page_tokens() {
        let transport = fixtures::transport(|r| {
            if !r.url.ends_with("/prpc/buildbucket.v2.Builds/SearchBuilds") {
                None
            } else if r.body.as_deref().is_some_and(|b| b.contains(r#""pageToken":"page-2""#)) {
                Some(SECOND_PAGE.to_string())
            } else {
                Some(FIRST_PAGE.to_string())
            }
        });
        let engine = SyncEngine::new(LuciConnector::with_api_url(
            Arc::new(transport),
            "https://buildbucket.test",
        ));
        let repository = MemoryRepository::new();
        let config = fixtures::config(locator());

        let outcome = engine
            .sync(&config, &repository, &fixtures::options())
            .await
            .unwrap();

        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.skipped_unmappable, 1);

        let builds = repository.builds_for(config.project.id, DataSource::Luci);
        let passed = builds.iter().find(|b| b.success).unwrap();
        assert_eq!(passed.commit_sha, "1111111111111111111111111111111111111111");
        assert_eq!(passed.duration_seconds, Some(5400));
        assert_eq!(passed.platform, Platform::UbuntuLatest);
        assert_eq!(passed.runner.as_deref(), Some("Linux Builder"));
        assert_eq!(
            passed.build_url.as_deref(),
            Some("https://ci.chromium.org/b/8740000000000000102")
        );
        assert_eq!(passed.natural_key, NaturalKey::external("8740000000000000102"));

        assert!(builds.iter().any(|b| !b.success && b.duration_seconds == Some(600)));
    }

    #[tokio::test]
    async fn test_known_builds_are_skipped() {
        let transport = fixtures::transport(|_| Some(FIRST_PAGE.replace("page-2", "")));
        let engine = SyncEngine::new(LuciConnector::with_api_url(
            Arc::new(transport),
            "https://buildbucket.test",
        ));
        let repository = MemoryRepository::new();
        let config = fixtures::config(locator());
        let mut options = fixtures::options();
        options.only_new = false;

        engine.sync(&config, &repository, &options).await.unwrap();
        let outcome = engine.sync(&config, &repository, &options).await.unwrap();

        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.skipped_existing, 2);
    }
}
