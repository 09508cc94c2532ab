/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use entity::project_config::DataSource;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use url::form_urlencoded::byte_serialize;

use crate::engine::{Cursor, Page, SourceConnector, SyncTarget};
use crate::error::{ScrapeError, ScrapeResult};
use crate::infer::{gitlab_platform, gitlab_success, parse_rfc3339};
use crate::record::{BuildRecord, NaturalKey};
use crate::source::{GitlabLocator, SourceLocator};
use crate::transport::{HttpRequest, Transport};

const SERVICE: &str = "gitlab";
const MAX_PER_PAGE: u32 = 100;
const PIPELINE_TIMEOUT_SECS: u64 = 60;
const JOB_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub sha: Option<String>,
    pub status: Option<String>,
    pub web_url: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineJob {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub status: Option<String>,
    pub stage: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub duration: Option<f64>,
    pub web_url: Option<String>,
    pub runner: Option<Runner>,
    pub commit: Option<JobCommit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Runner {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobCommit {
    pub title: Option<String>,
    pub message: Option<String>,
}

pub struct PipelineJobUnit {
    pub pipeline: Arc<Pipeline>,
    pub job: PipelineJob,
}

pub fn encode_project_path(path: &str) -> String {
    byte_serialize(path.as_bytes()).collect()
}

pub fn matches_job_filter(job_name: &str, filter: Option<&str>) -> bool {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(filter) => job_name.to_lowercase().contains(&filter.to_lowercase()),
        None => true,
    }
}

pub struct GitlabConnector {
    transport: Arc<dyn Transport>,
    token: Option<String>,
}

impl GitlabConnector {
    pub fn new(transport: Arc<dyn Transport>, token: Option<String>) -> Self {
        Self { transport, token }
    }

    fn request(&self, locator: &GitlabLocator, path: &str, timeout: u64) -> HttpRequest {
        let url = format!(
            "{}/api/v4/projects/{}{}",
            locator.host.trim_end_matches('/'),
            encode_project_path(&locator.project_path),
            path
        );
        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .timeout(timeout);

        match &self.token {
            Some(token) => request.header("PRIVATE-TOKEN", token.as_str()),
            None => request,
        }
    }

    async fn fetch_jobs(&self, locator: &GitlabLocator, pipeline: i64) -> ScrapeResult<Vec<PipelineJob>> {
        let mut jobs = Vec::new();
        let mut page = 1;

        loop {
            let request = self
                .request(locator, &format!("/pipelines/{}/jobs", pipeline), JOB_TIMEOUT_SECS)
                .query("per_page", MAX_PER_PAGE)
                .query("page", page);

            let batch = self
                .transport
                .send(request)
                .await?
                .error_for_status(SERVICE)?
                .json::<Vec<PipelineJob>>()?;

            let received = batch.len();
            jobs.extend(batch);
            if received < MAX_PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        Ok(jobs)
    }
}

#[async_trait]
impl SourceConnector for GitlabConnector {
    type Locator = GitlabLocator;
    type Item = Pipeline;
    type Unit = PipelineJobUnit;

    fn data_source(&self) -> DataSource {
        DataSource::GitlabCi
    }

    fn locator<'a>(&self, locator: &'a SourceLocator) -> Option<&'a Self::Locator> {
        match locator {
            SourceLocator::GitlabCi(l) => Some(l),
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
        let per_page = page_size.min(MAX_PER_PAGE);

        let request = self
            .request(target.locator, "/pipelines", PIPELINE_TIMEOUT_SECS)
            .query("ref", &target.config.branch)
            .query("per_page", per_page)
            .query("page", page)
            .query("order_by", "id")
            .query("sort", "desc");

        let pipelines = self
            .transport
            .send(request)
            .await?
            .error_for_status(SERVICE)?
            .json::<Vec<Pipeline>>()?;

        Ok(Page::sized(pipelines, per_page, Cursor::Page(page + 1)))
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

        for pipeline in items {
            let jobs = self.fetch_jobs(locator, pipeline.id).await?;
            let pipeline = Arc::new(pipeline);

            units.extend(
                jobs.into_iter()
                    .filter(|job| matches_job_filter(&job.name, locator.job_filter.as_deref()))
                    .map(|job| PipelineJobUnit {
                        pipeline: Arc::clone(&pipeline),
                        job,
                    }),
            );
        }

        Ok(units)
    }

    fn map_to_canonical(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        unit: Self::Unit,
    ) -> ScrapeResult<BuildRecord> {
        let PipelineJobUnit { pipeline, job } = unit;
        let Some(sha) = pipeline.sha.clone().filter(|s| !s.is_empty()) else {
            return Err(ScrapeError::mapping(format!(
                "pipeline {} has no commit",
                pipeline.id
            )));
        };

        let status = job.status.clone().unwrap_or_else(|| "unknown".to_string());
        let message = job
            .commit
            .as_ref()
            .and_then(|c| c.title.as_deref().or(c.message.as_deref()));

        let mut record = BuildRecord::new(
            target.config,
            NaturalKey::external_job(pipeline.id, job.id),
            sha,
            gitlab_success(&status),
        )
        .with_message(message)
        .with_platform(gitlab_platform(&job.name))
        .with_timing(
            job.started_at.as_deref().and_then(parse_rfc3339),
            job.finished_at.as_deref().and_then(parse_rfc3339),
        )
        .with_runner(job.runner.as_ref().and_then(|r| r.description.clone()))
        .with_workflow(None, Some(pipeline.id.to_string()), Some(job.id.to_string()))
        .with_url(job.web_url.clone().or_else(|| pipeline.web_url.clone()))
        .with_metadata(json!({
            "pipeline_id": pipeline.id.to_string(),
            "job_id": job.id.to_string(),
            "job_name": job.name,
            "status": status,
            "stage": job.stage,
        }));

        if let Some(duration) = job.duration {
            record = record.with_duration(Some(duration as i64));
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::fixtures;
    use crate::engine::{Scraper, SyncEngine};
    use crate::memory::MemoryRepository;
    use entity::project_config::Platform;

    const PIPELINES: &str = r#"[
  {"id": 500, "sha": "3333333333333333333333333333333333333333", "ref": "main", "status": "failed",
   "web_url": "https://gitlab.freedesktop.org/mesa/mesa/-/pipelines/500"},
  {"id": 499, "sha": null, "ref": "main", "status": "success"}
]"#;

    const JOBS_500: &str = r#"[
  {"id": 1001, "name": "build:debian-arm64", "stage": "build", "status": "success",
   "started_at": "2024-06-01T10:00:00.000Z", "finished_at": "2024-06-01T10:10:10.000Z",
   "duration": 600.5, "runner": {"description": "runner-fdo-1"},
   "commit": {"title": "ci: bump image", "message": "ci: bump image\n\nlong body"}},
  {"id": 1002, "name": "build:windows-msvc", "stage": "build", "status": "failed",
   "started_at": "2024-06-01T10:00:00.000Z", "finished_at": "2024-06-01T10:20:00.000Z"},
  {"id": 1003, "name": "test:darwin", "stage": "test", "status": "canceled"}
]"#;

    const JOBS_499: &str = r#"[{"id": 990, "name": "build:x86_64", "status": "success"}]"#;

    fn transport() -> Arc<dyn Transport> {
        Arc::new(fixtures::transport(|r| {
            let base = "https://gitlab.freedesktop.org/api/v4/projects/mesa%2Fmesa";
            if r.url == format!("{}/pipelines", base) && r.query_value("sort") == Some("desc") {
                Some(PIPELINES.to_string())
            } else if r.url == format!("{}/pipelines/500/jobs", base) {
                Some(JOBS_500.to_string())
            } else if r.url == format!("{}/pipelines/499/jobs", base) {
                Some(JOBS_499.to_string())
            } else {
                None
            }
        }))
    }

    fn locator(job_filter: Option<&str>) -> SourceLocator {
        SourceLocator::GitlabCi(GitlabLocator {
            host: "https://gitlab.freedesktop.org".to_string(),
            project_path: "mesa/mesa".to_string(),
            job_filter: job_filter.map(str::to_string),
        })
    }

    #[test]
    fn test_encode_project_path() {
        assert_eq!(encode_project_path("mesa/mesa"), "mesa%2Fmesa");
        assert_eq!(encode_project_path("gnome/gtk"), "gnome%2Fgtk");
    }

    #[test]
    fn test_matches_job_filter() {
        assert!(matches_job_filter("build:debian", Some("BUILD")));
        assert!(!matches_job_filter("test:debian", Some("build")));
        assert!(matches_job_filter("anything", None));
        assert!(matches_job_filter("anything", Some("  ")));
    }

    #[tokio::test]
    async fn test_sync_pipeline_jobs() {
        let engine = SyncEngine::new(GitlabConnector::new(transport(), None));
        let repository = MemoryRepository::new();
        let config = fixtures::config(locator(None));

        let outcome = engine
            .sync(&config, &repository, &fixtures::options())
            .await
            .unwrap();

        assert_eq!(outcome.fetched, 2);
        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.skipped_unmappable, 1);

        let builds = repository.builds_for(config.project.id, DataSource::GitlabCi);
        let build = builds
            .iter()
            .find(|b| b.natural_key == NaturalKey::external_job(500, 1001))
            .unwrap();
        assert!(build.success);
        assert_eq!(build.duration_seconds, Some(600));
        assert_eq!(build.commit_message.as_deref(), Some("ci: bump image"));
        assert_eq!(build.runner.as_deref(), Some("runner-fdo-1"));
        assert_eq!(build.platform, Platform::UbuntuLatest);

        let windows = builds
            .iter()
            .find(|b| b.job_id.as_deref() == Some("1002"))
            .unwrap();
        assert!(!windows.success);
        assert_eq!(windows.platform, Platform::WindowsLatest);
        assert_eq!(windows.duration_seconds, Some(1200));

        let darwin = builds
            .iter()
            .find(|b| b.job_id.as_deref() == Some("1003"))
            .unwrap();
        assert_eq!(darwin.platform, Platform::MacosLatest);
    }

    #[tokio::test]
    async fn test_job_filter() {
        let engine = SyncEngine::new(GitlabConnector::new(transport(), None));
        let repository = MemoryRepository::new();
        let config = fixtures::config(locator(Some("build")));

        let outcome = engine
            .sync(&config, &repository, &fixtures::options())
            .await
            .unwrap();

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.skipped_unmappable, 1);
    }
}
