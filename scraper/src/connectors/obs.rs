/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use beanaries_core::consts::OBS_API_URL;
use entity::project_config::DataSource;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::engine::{Cursor, Page, SourceConnector, SyncTarget};
use crate::error::{ScrapeError, ScrapeResult};
use crate::infer::{from_unix, obs_platform, obs_success};
use crate::record::{BuildRecord, NaturalKey};
use crate::source::{ObsLocator, SourceLocator};
use crate::transport::{HttpRequest, Transport};

const SERVICE: &str = "obs";
const TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Default, Deserialize)]
struct RevisionList {
    #[serde(rename = "revision", default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Revision {
    #[serde(rename = "@rev")]
    pub rev: Option<String>,
    pub srcmd5: Option<String>,
    pub version: Option<String>,
    pub time: Option<String>,
    pub user: Option<String>,
    pub comment: Option<String>,
}

impl Revision {
    fn srcmd5(&self) -> Option<&str> {
        self.srcmd5.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn time(&self) -> Option<i64> {
        self.time.as_deref()?.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildStatus {
    #[serde(rename = "@code")]
    pub code: Option<String>,
    pub starttime: Option<String>,
    pub endtime: Option<String>,
    pub workerid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusWrapper {
    status: Option<BuildStatus>,
}

/// Revisions of a package, newest first. Entries without a source hash or time are dropped.
pub fn parse_history(xml: &str) -> ScrapeResult<Vec<Revision>> {
    let list: RevisionList = quick_xml::de::from_str(xml)
        .map_err(|e| ScrapeError::Mapping(format!("invalid OBS history: {}", e)))?;

    let mut revisions: Vec<Revision> = list
        .revisions
        .into_iter()
        .filter(|r| r.srcmd5().is_some() && r.time().is_some())
        .collect();
    revisions.reverse();
    Ok(revisions)
}

pub fn parse_status(xml: &str) -> Option<BuildStatus> {
    match quick_xml::de::from_str::<BuildStatus>(xml) {
        Ok(status) if status.code.is_some() => Some(status),
        _ => quick_xml::de::from_str::<StatusWrapper>(xml)
            .ok()
            .and_then(|w| w.status),
    }
}

fn unix_field(value: Option<&str>) -> Option<i64> {
    value?.trim().parse().ok()
}

pub struct RevisionUnit {
    pub revision: Revision,
    pub status: Option<Arc<BuildStatus>>,
}

pub struct ObsConnector {
    transport: Arc<dyn Transport>,
    api_url: String,
    username: Option<String>,
    token: Option<String>,
}

impl ObsConnector {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_api_url(transport, OBS_API_URL)
    }

    pub fn with_api_url(transport: Arc<dyn Transport>, api_url: impl Into<String>) -> Self {
        Self {
            transport,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            username: None,
            token: None,
        }
    }

    pub fn credentials(mut self, username: Option<String>, token: Option<String>) -> Self {
        self.username = username;
        self.token = token;
        self
    }

    fn request(&self, url: String) -> HttpRequest {
        let request = HttpRequest::get(url)
            .header("Accept", "application/xml")
            .timeout(TIMEOUT_SECS);

        match (&self.username, &self.token) {
            (Some(username), Some(token)) => request.basic(username, token),
            (None, Some(token)) => request.header("Authorization", format!("Token {}", token)),
            _ => request,
        }
    }

    /// Tries the public route first; only rate limits abort the lookup.
    async fn fetch_status(&self, locator: &ObsLocator) -> ScrapeResult<Option<BuildStatus>> {
        let path = format!(
            "{}/{}/{}/{}/_status",
            locator.project, locator.repository, locator.arch, locator.package
        );
        let urls = [
            format!("{}/public/build/{}", self.api_url, path),
            format!("{}/build/{}", self.api_url, path),
        ];

        for url in urls {
            let response = match self.transport.send(self.request(url.clone())).await {
                Ok(response) => response,
                Err(e) if e.is_rate_limit() => return Err(e),
                Err(e) => {
                    debug!(url = %url, error = %e, "Build status unavailable");
                    continue;
                }
            };

            match response.error_for_status(SERVICE) {
                Ok(response) => return Ok(parse_status(&response.body)),
                Err(e) if e.is_rate_limit() => return Err(e),
                Err(e) => debug!(url = %url, error = %e, "Build status unavailable"),
            }
        }

        Ok(None)
    }

    pub fn web_url(&self, locator: &ObsLocator) -> String {
        format!(
            "{}/package/show/{}/{}",
            self.api_url.replace("api.", "build."),
            locator.project,
            locator.package
        )
    }
}

#[async_trait]
impl SourceConnector for ObsConnector {
    type Locator = ObsLocator;
    type Item = Revision;
    type Unit = RevisionUnit;

    fn data_source(&self) -> DataSource {
        DataSource::Obs
    }

    fn locator<'a>(&self, locator: &'a SourceLocator) -> Option<&'a Self::Locator> {
        match locator {
            SourceLocator::Obs(l) => Some(l),
            _ => None,
        }
    }

    async fn fetch_page(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        _cursor: Option<&Cursor>,
        _page_size: u32,
    ) -> ScrapeResult<Page<Self::Item>> {
        let locator = target.locator;
        let url = format!(
            "{}/public/source/{}/{}/_history",
            self.api_url, locator.project, locator.package
        );

        let response = self
            .transport
            .send(self.request(url))
            .await?
            .error_for_status(SERVICE)?;

        Ok(Page::last(parse_history(&response.body)?))
    }

    fn stream_id(&self, item: &Self::Item) -> String {
        item.srcmd5().unwrap_or_default().to_string()
    }

    fn item_key(&self, target: SyncTarget<'_, Self::Locator>, item: &Self::Item) -> Option<NaturalKey> {
        Some(NaturalKey::commit(
            item.srcmd5()?,
            obs_platform(&target.locator.arch),
        ))
    }

    async fn expand(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        items: Vec<Self::Item>,
    ) -> ScrapeResult<Vec<Self::Unit>> {
        let status = self.fetch_status(target.locator).await?.map(Arc::new);

        Ok(items
            .into_iter()
            .map(|revision| RevisionUnit {
                revision,
                status: status.clone(),
            })
            .collect())
    }

    fn map_to_canonical(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        unit: Self::Unit,
    ) -> ScrapeResult<BuildRecord> {
        let locator = target.locator;
        let RevisionUnit { revision, status } = unit;
        let Some(srcmd5) = revision.srcmd5().map(str::to_string) else {
            return Err(ScrapeError::mapping("revision has no srcmd5"));
        };

        let code = status
            .as_ref()
            .and_then(|s| s.code.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let mut started_at = revision.time().and_then(from_unix);
        let mut finished_at = None;
        if let Some(status) = &status {
            if let Some(start) = unix_field(status.starttime.as_deref()).and_then(from_unix) {
                started_at = Some(start);
            }
            finished_at = unix_field(status.endtime.as_deref()).and_then(from_unix);
        }

        let platform = obs_platform(&locator.arch);
        let sha: String = srcmd5.chars().take(40).collect();

        Ok(BuildRecord::new(
            target.config,
            NaturalKey::commit(&srcmd5, platform),
            sha,
            obs_success(&code),
        )
        .with_message(revision.comment.as_deref())
        .with_platform(platform)
        .with_timing(started_at, finished_at)
        .with_runner(Some(format!("obs-{}-{}", locator.repository, locator.arch)))
        .with_workflow(None, None, revision.rev.clone())
        .with_url(Some(self.web_url(locator)))
        .with_metadata(json!({
            "srcmd5": srcmd5,
            "revision": revision.rev,
            "version": revision.version,
            "obs_project": locator.project,
            "package_name": locator.package,
            "repository": locator.repository,
            "arch": locator.arch,
            "status": code,
            "user": revision.user,
            "workerid": status.as_ref().and_then(|s| s.workerid.clone()),
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

    const HISTORY: &str = r#"<revisionlist>
  <revision rev="1" vrev="1">
    <srcmd5>aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa</srcmd5>
    <version>13.2</version>
    <time>1717236000</time>
    <user>alice</user>
    <comment>Initial import</comment>
  </revision>
  <revision rev="2" vrev="1">
    <version>13.2</version>
    <time>1717240000</time>
  </revision>
  <revision rev="3" vrev="1">
    <srcmd5>bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb</srcmd5>
    <version>14.1</version>
    <time>1717322400</time>
    <user>bob</user>
    <comment>Update to 14.1</comment>
  </revision>
</revisionlist>"#;

    const STATUS: &str = r#"<status package="gcc14" code="succeeded">
  <details></details>
  <starttime>1717322500</starttime>
  <endtime>1717326100</endtime>
  <workerid>build-x86-7:3</workerid>
</status>"#;

    fn locator() -> ObsLocator {
        ObsLocator {
            project: "devel:gcc".to_string(),
            package: "gcc14".to_string(),
            repository: "openSUSE_Factory".to_string(),
            arch: "x86_64".to_string(),
        }
    }

    #[test]
    fn test_parse_history_newest_first() {
        let revisions = parse_history(HISTORY).unwrap();

        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0].rev.as_deref(), Some("3"));
        assert_eq!(revisions[1].srcmd5.as_deref(), Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
    }

    #[test]
    fn test_parse_status() {
        let status = parse_status(STATUS).unwrap();
        assert_eq!(status.code.as_deref(), Some("succeeded"));
        assert_eq!(status.starttime.as_deref(), Some("1717322500"));
        assert!(parse_status("<maintenance/>").is_none());
    }

    #[tokio::test]
    async fn test_sync_with_public_status() {
        let transport = fixtures::transport(|r| {
            if r.url == "https://api.obs.test/public/source/devel:gcc/gcc14/_history" {
                Some(HISTORY.to_string())
            } else if r.url
                == "https://api.obs.test/public/build/devel:gcc/openSUSE_Factory/x86_64/gcc14/_status"
            {
                Some(STATUS.to_string())
            } else {
                None
            }
        });
        let engine = SyncEngine::new(ObsConnector::with_api_url(Arc::new(transport), "https://api.obs.test/"));
        let repository = MemoryRepository::new();
        let config = fixtures::config(SourceLocator::Obs(locator()));

        let outcome = engine
            .sync(&config, &repository, &fixtures::options())
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 2);

        let builds = repository.builds_for(config.project.id, DataSource::Obs);
        let latest = builds
            .iter()
            .find(|b| b.commit_sha == "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
            .unwrap();
        assert!(latest.success);
        assert_eq!(latest.duration_seconds, Some(3600));
        assert_eq!(latest.platform, Platform::UbuntuLatest);
        assert_eq!(latest.commit_message.as_deref(), Some("Update to 14.1"));
        assert_eq!(latest.runner.as_deref(), Some("obs-openSUSE_Factory-x86_64"));
        assert_eq!(
            latest.natural_key,
            NaturalKey::commit("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", Platform::UbuntuLatest)
        );
        assert_eq!(
            latest.build_url.as_deref(),
            Some("https://build.obs.test/package/show/devel:gcc/gcc14")
        );
    }

    #[tokio::test]
    async fn test_missing_status_is_not_fatal() {
        let transport = fixtures::transport(|r| r.url.ends_with("/_history").then(|| HISTORY.to_string()));
        let engine = SyncEngine::new(ObsConnector::with_api_url(Arc::new(transport), "https://api.obs.test"));
        let repository = MemoryRepository::new();
        let config = fixtures::config(SourceLocator::Obs(locator()));

        let outcome = engine
            .sync(&config, &repository, &fixtures::options())
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 2);
        assert!(repository.builds().iter().all(|b| !b.record.success));
    }

    #[test]
    fn test_token_and_basic_credentials() {
        let transport: Arc<dyn Transport> = Arc::new(fixtures::transport(|_| None));

        let token = ObsConnector::new(Arc::clone(&transport)).credentials(None, Some("t0k".to_string()));
        let request = token.request("https://api.opensuse.org/x".to_string());
        assert!(request.headers.contains(&("Authorization".to_string(), "Token t0k".to_string())));

        let basic = ObsConnector::new(transport).credentials(Some("user".to_string()), Some("pass".to_string()));
        let request = basic.request("https://api.opensuse.org/x".to_string());
        assert!(request.headers.contains(&("Authorization".to_string(), "Basic dXNlcjpwYXNz".to_string())));
    }
}
