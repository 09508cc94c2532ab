/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use beanaries_core::consts::{GITHUB_API_URL, MIN_SUCCESSFUL_JOB_SECONDS};
use entity::project_config::DataSource;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::engine::{Cursor, Page, SourceConnector, SyncTarget};
use crate::error::{ScrapeError, ScrapeResult};
use crate::infer::{duration_seconds, github_platform, github_success, parse_rfc3339};
use crate::record::{BuildRecord, NaturalKey};
use crate::source::{GithubActionsLocator, SourceLocator};
use crate::transport::{HttpRequest, Transport};

const SERVICE: &str = "github";
const MAX_PER_PAGE: u32 = 100;
const TIMEOUT_SECS: u64 = 30;

const EXCLUDE_PATTERNS: [&str; 22] = [
    "lint",
    "linting",
    "format",
    "formatting",
    "prettier",
    "eslint",
    "flake8",
    "mypy",
    "type-check",
    "type check",
    "clippy",
    "rustfmt",
    "spell",
    "spellcheck",
    "style check",
    "code style",
    "dead-code",
    "unused",
    "documentation only",
    "docs only",
    "generate docs",
    "code formatting",
];

#[derive(Debug, Deserialize)]
struct RunList {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub id: i64,
    pub name: Option<String>,
    pub head_sha: String,
    pub head_commit: Option<HeadCommit>,
    pub status: Option<String>,
    pub html_url: Option<String>,
    pub run_number: Option<i64>,
    pub event: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadCommit {
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<WorkflowJob>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJob {
    pub id: i64,
    pub name: String,
    pub conclusion: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub runner_name: Option<String>,
    pub html_url: Option<String>,
}

pub struct RunJob {
    pub run: Arc<WorkflowRun>,
    pub job: WorkflowJob,
}

/// Drops lint/format/style jobs, jobs that never finished, and successful jobs too short to be builds.
pub fn filter_build_jobs(jobs: Vec<WorkflowJob>) -> Vec<WorkflowJob> {
    jobs.into_iter()
        .filter(|job| {
            let name = job.name.to_lowercase();
            if EXCLUDE_PATTERNS.iter().any(|p| name.contains(p)) {
                return false;
            }

            let started = job.started_at.as_deref().and_then(parse_rfc3339);
            let completed = job.completed_at.as_deref().and_then(parse_rfc3339);
            if started.is_none() || completed.is_none() {
                return false;
            }

            let short = duration_seconds(started, completed)
                .is_some_and(|d| d < MIN_SUCCESSFUL_JOB_SECONDS);
            !(short && github_success(job.conclusion.as_deref()))
        })
        .collect()
}

pub struct GithubActionsConnector {
    transport: Arc<dyn Transport>,
    api_url: String,
    token: Option<String>,
}

impl GithubActionsConnector {
    pub fn new(transport: Arc<dyn Transport>, token: Option<String>) -> Self {
        Self::with_api_url(transport, GITHUB_API_URL, token)
    }

    pub fn with_api_url(
        transport: Arc<dyn Transport>,
        api_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.into(),
            token,
        }
    }

    fn request(&self, url: String) -> HttpRequest {
        let request = HttpRequest::get(url)
            .header("Accept", "application/vnd.github.v3+json")
            .timeout(TIMEOUT_SECS);

        match &self.token {
            Some(token) => request.header("Authorization", format!("token {}", token)),
            None => request,
        }
    }

    async fn fetch_jobs(
        &self,
        locator: &GithubActionsLocator,
        run_id: i64,
    ) -> ScrapeResult<Vec<WorkflowJob>> {
        let url = format!(
            "{}/repos/{}/{}/actions/runs/{}/jobs",
            self.api_url, locator.owner, locator.repo, run_id
        );

        let response = self
            .transport
            .send(self.request(url).query("per_page", MAX_PER_PAGE))
            .await?
            .error_for_status(SERVICE)?;

        Ok(response.json::<JobList>()?.jobs)
    }
}

#[async_trait]
impl SourceConnector for GithubActionsConnector {
    type Locator = GithubActionsLocator;
    type Item = WorkflowRun;
    type Unit = RunJob;

    fn data_source(&self) -> DataSource {
        DataSource::GithubActions
    }

    fn locator<'a>(&self, locator: &'a SourceLocator) -> Option<&'a Self::Locator> {
        match locator {
            SourceLocator::GithubActions(l) => Some(l),
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
        let locator = target.locator;
        let page = match cursor {
            Some(Cursor::Page(page)) => *page,
            _ => 1,
        };

        let url = match &locator.workflow_file {
            Some(file) => format!(
                "{}/repos/{}/{}/actions/workflows/{}/runs",
                self.api_url, locator.owner, locator.repo, file
            ),
            None => format!(
                "{}/repos/{}/{}/actions/runs",
                self.api_url, locator.owner, locator.repo
            ),
        };

        let per_page = page_size.min(MAX_PER_PAGE);
        let request = self
            .request(url)
            .query("branch", &target.config.branch)
            .query("per_page", per_page)
            .query("page", page);

        let runs = self
            .transport
            .send(request)
            .await?
            .error_for_status(SERVICE)?
            .json::<RunList>()?
            .workflow_runs;

        Ok(Page::sized(runs, per_page, Cursor::Page(page + 1)))
    }

    fn stream_id(&self, item: &Self::Item) -> String {
        item.id.to_string()
    }

    async fn expand(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        items: Vec<Self::Item>,
    ) -> ScrapeResult<Vec<Self::Unit>> {
        let locator = target.locator;
        let mut units = Vec::new();

        for run in items {
            if run.status.as_deref().is_some_and(|s| s != "completed") {
                debug!(run_id = run.id, "Skipping unfinished run");
                continue;
            }

            let jobs = self.fetch_jobs(locator, run.id).await?;
            let jobs = match &locator.job_name {
                Some(name) => jobs.into_iter().filter(|j| &j.name == name).collect(),
                None => filter_build_jobs(jobs),
            };

            let run = Arc::new(run);
            units.extend(jobs.into_iter().map(|job| RunJob {
                run: Arc::clone(&run),
                job,
            }));
        }

        Ok(units)
    }

    fn map_to_canonical(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        unit: Self::Unit,
    ) -> ScrapeResult<BuildRecord> {
        let RunJob { run, job } = unit;

        let started = job.started_at.as_deref().and_then(parse_rfc3339);
        let completed = job.completed_at.as_deref().and_then(parse_rfc3339);
        if started.is_none() || completed.is_none() {
            return Err(ScrapeError::mapping(format!(
                "job {} of run {} has no start or completion time",
                job.id, run.id
            )));
        }

        let message = run.head_commit.as_ref().and_then(|c| c.message.as_deref());
        let workflow_name = run
            .name
            .clone()
            .or_else(|| Some(target.locator.workflow_name.clone()).filter(|n| !n.is_empty()));

        Ok(BuildRecord::new(
            target.config,
            NaturalKey::external_job(run.id, job.id),
            run.head_sha.clone(),
            github_success(job.conclusion.as_deref()),
        )
        .with_message(message)
        .with_platform(github_platform(&job.labels))
        .with_timing(started, completed)
        .with_runner(job.runner_name.clone())
        .with_workflow(
            workflow_name,
            Some(run.id.to_string()),
            Some(job.id.to_string()),
        )
        .with_url(job.html_url.clone().or_else(|| run.html_url.clone()))
        .with_metadata(json!({
            "run_id": run.id,
            "job_id": job.id,
            "job_name": job.name,
            "run_number": run.run_number,
            "event": run.event,
            "conclusion": job.conclusion,
        })))
    }
}
