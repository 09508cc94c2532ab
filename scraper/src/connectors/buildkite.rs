/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use beanaries_core::consts::{BUILDKITE_API_URL, BUILDKITE_WEB_URL};
use entity::project_config::DataSource;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::engine::{Cursor, Page, SourceConnector, SyncTarget};
use crate::error::{ScrapeError, ScrapeResult};
use crate::infer::{buildkite_platform, buildkite_success, parse_rfc3339};
use crate::record::{BuildRecord, NaturalKey};
use crate::source::{BuildkiteLocator, SourceLocator};
use crate::transport::{HttpRequest, Transport};

const SERVICE: &str = "buildkite";
const MAX_PER_PAGE: u32 = 100;
const TIMEOUT_SECS: u64 = 60;
const WEB_PAGES: u32 = 5;
const WEB_WINDOW: usize = 4000;

const COMMIT_PATTERN: &str = r"/commit/([0-9a-f]{40})";
const STATE_PATTERN: &str = r#"(?:data-state="|build-state-|"state":")([a-z_]+)"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildkiteBuild {
    pub id: Option<String>,
    pub number: i64,
    pub state: Option<String>,
    pub commit: Option<String>,
    pub message: Option<String>,
    pub branch: Option<String>,
    pub web_url: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub created_at: Option<String>,
    pub creator: Option<Creator>,
    #[serde(default)]
    pub jobs: Vec<BuildkiteJob>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Creator {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildkiteJob {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub agent_query_rules: Vec<String>,
}

impl BuildkiteBuild {
    fn agent_rules(&self) -> impl Iterator<Item = &str> {
        self.jobs
            .iter()
            .filter(|job| job.kind.as_deref() == Some("script"))
            .flat_map(|job| job.agent_query_rules.iter().map(String::as_str))
    }
}

/// Builds listed on a public pipeline page. Builds without a full commit or a state are dropped.
pub fn parse_builds_page(html: &str, locator: &BuildkiteLocator, branch: &str) -> Vec<BuildkiteBuild> {
    let pattern = format!(
        r#"href="(?:{})?/{}/{}/builds/(\d+)""#,
        regex::escape(BUILDKITE_WEB_URL),
        regex::escape(&locator.org),
        regex::escape(&locator.pipeline)
    );
    let (Ok(link_re), Ok(commit_re), Ok(state_re)) = (
        Regex::new(&pattern),
        Regex::new(COMMIT_PATTERN),
        Regex::new(STATE_PATTERN),
    ) else {
        return Vec::new();
    };

    let links: Vec<(usize, i64)> = link_re
        .captures_iter(html)
        .filter_map(|c| {
            let m = c.get(0)?;
            let number = c.get(1)?.as_str().parse().ok()?;
            Some((m.end(), number))
        })
        .collect();

    let mut seen = HashSet::new();
    let mut builds = Vec::new();

    for (index, (start, number)) in links.iter().enumerate() {
        if !seen.insert(*number) {
            continue;
        }

        let next_build = links[index + 1..]
            .iter()
            .find(|(_, n)| n != number)
            .map(|(pos, _)| *pos)
            .unwrap_or(html.len());
        let mut end = next_build.min(start + WEB_WINDOW).min(html.len());
        while !html.is_char_boundary(end) {
            end -= 1;
        }
        let window = &html[*start..end];

        let Some(commit) = commit_re.captures(window).and_then(|c| c.get(1)) else {
            continue;
        };
        let Some(state) = state_re.captures(window).and_then(|c| c.get(1)) else {
            debug!(number, "No state on build row");
            continue;
        };

        builds.push(BuildkiteBuild {
            number: *number,
            state: Some(state.as_str().to_string()),
            commit: Some(commit.as_str().to_string()),
            branch: Some(branch.to_string()),
            web_url: Some(format!(
                "{}/{}/{}/builds/{}",
                BUILDKITE_WEB_URL, locator.org, locator.pipeline, number
            )),
            ..Default::default()
        });
    }

    builds
}

pub struct BuildkiteConnector {
    transport: Arc<dyn Transport>,
    api_url: String,
    web_url: String,
    token: Option<String>,
}

impl BuildkiteConnector {
    pub fn new(transport: Arc<dyn Transport>, token: Option<String>) -> Self {
        Self::with_urls(transport, BUILDKITE_API_URL, BUILDKITE_WEB_URL, token)
    }

    pub fn with_urls(
        transport: Arc<dyn Transport>,
        api_url: impl Into<String>,
        web_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.into(),
            web_url: web_url.into(),
            token,
        }
    }

    async fn fetch_api(
        &self,
        token: &str,
        target: SyncTarget<'_, BuildkiteLocator>,
        page: u32,
        page_size: u32,
    ) -> ScrapeResult<Page<BuildkiteBuild>> {
        let locator = target.locator;
        let url = format!(
            "{}/v2/organizations/{}/pipelines/{}/builds",
            self.api_url, locator.org, locator.pipeline
        );
        let per_page = page_size.min(MAX_PER_PAGE);

        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .bearer(token)
            .query("branch", &target.config.branch)
            .query("page", page)
            .query("per_page", per_page)
            .timeout(TIMEOUT_SECS);

        let builds = self
            .transport
            .send(request)
            .await?
            .error_for_status(SERVICE)?
            .json::<Vec<BuildkiteBuild>>()?;

        Ok(Page::sized(builds, per_page, Cursor::Page(page + 1)))
    }

    async fn fetch_web(
        &self,
        target: SyncTarget<'_, BuildkiteLocator>,
        page: u32,
    ) -> ScrapeResult<Page<BuildkiteBuild>> {
        let locator = target.locator;
        let url = format!("{}/{}/{}/builds", self.web_url, locator.org, locator.pipeline);

        let request = HttpRequest::get(url)
            .header("Accept", "text/html")
            .query("branch", &target.config.branch)
            .query("page", page)
            .timeout(TIMEOUT_SECS);

        let response = self
            .transport
            .send(request)
            .await?
            .error_for_status(SERVICE)?;
        let builds = parse_builds_page(&response.body, locator, &target.config.branch);

        let next = (page < WEB_PAGES && !builds.is_empty()).then_some(Cursor::Page(page + 1));
        Ok(Page { items: builds, next })
    }
}

#[async_trait]
impl SourceConnector for BuildkiteConnector {
    type Locator = BuildkiteLocator;
    type Item = BuildkiteBuild;
    type Unit = BuildkiteBuild;

    fn data_source(&self) -> DataSource {
        DataSource::Buildkite
    }

    fn locator<'a>(&self, locator: &'a SourceLocator) -> Option<&'a Self::Locator> {
        match locator {
            SourceLocator::Buildkite(l) => Some(l),
            _ => None,
        }
    }

    fn page_size(&self) -> u32 {
        MAX_PER_PAGE
    }

    async fn fetch_page(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> ScrapeResult<Page<Self::Item>> {
        let page = match cursor {
            Some(Cursor::Page(page)) => *page,
            _ => 1,
        };

        match &self.token {
            Some(token) => self.fetch_api(token, target, page, page_size).await,
            None => self.fetch_web(target, page).await,
        }
    }

    fn stream_id(&self, item: &Self::Item) -> String {
        item.number.to_string()
    }

    fn item_key(&self, _target: SyncTarget<'_, Self::Locator>, item: &Self::Item) -> Option<NaturalKey> {
        Some(NaturalKey::external(item.number))
    }

    async fn expand(
        &self,
        _target: SyncTarget<'_, Self::Locator>,
        items: Vec<Self::Item>,
    ) -> ScrapeResult<Vec<Self::Unit>> {
        Ok(items)
    }

    fn map_to_canonical(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        unit: Self::Unit,
    ) -> ScrapeResult<BuildRecord> {
        let locator = target.locator;
        let Some(commit) = unit.commit.clone().filter(|c| !c.is_empty()) else {
            return Err(ScrapeError::mapping(format!(
                "build {} has no commit",
                unit.number
            )));
        };

        let state = unit.state.clone().unwrap_or_else(|| "unknown".to_string());
        let creator = unit.creator.as_ref().and_then(|c| c.name.clone());
        let mut record = BuildRecord::new(
            target.config,
            NaturalKey::external(unit.number),
            commit,
            buildkite_success(&state),
        )
        .with_message(unit.message.as_deref())
        .with_platform(buildkite_platform(unit.agent_rules()))
        .with_timing(
            unit.started_at.as_deref().and_then(parse_rfc3339),
            unit.finished_at.as_deref().and_then(parse_rfc3339),
        )
        .with_runner(Some(format!("buildkite-{}", locator.org)))
        .with_workflow(
            Some(locator.pipeline.clone()),
            Some(unit.number.to_string()),
            None,
        )
        .with_url(unit.web_url.clone())
        .with_metadata(json!({
            "build_id": unit.id,
            "build_number": unit.number,
            "pipeline_slug": locator.pipeline,
            "org_slug": locator.org,
            "state": state,
            "creator": creator,
            "created_at": unit.created_at,
        }));

        if let Some(branch) = unit.branch.filter(|b| !b.is_empty()) {
            record.branch = branch;
        }

        Ok(record)
    }
}
