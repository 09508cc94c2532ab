/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use beanaries_core::consts::MAX_COMMIT_MESSAGE_LEN;
use beanaries_core::input::truncate_message;
use beanaries_core::types::ABuild;
use entity::project_config::{DataSource, Platform};
use sea_orm::ActiveValue::Set;
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use super::infer::duration_seconds;
use super::source::SourceConfiguration;

/// Identity of a build within one (project, data source) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    /// Remote run/build/pipeline id, optionally narrowed to one job of it.
    External { run: String, job: Option<String> },
    /// Builds without a remote id, identified by what was built and where.
    Commit { sha: String, platform: Platform },
}

impl NaturalKey {
    pub fn external(run: impl ToString) -> Self {
        NaturalKey::External {
            run: run.to_string(),
            job: None,
        }
    }

    pub fn external_job(run: impl ToString, job: impl ToString) -> Self {
        NaturalKey::External {
            run: run.to_string(),
            job: Some(job.to_string()),
        }
    }

    pub fn commit(sha: impl Into<String>, platform: Platform) -> Self {
        NaturalKey::Commit {
            sha: sha.into(),
            platform,
        }
    }

    /// Id that appears in a connector's fetch stream, used as the early-stop marker.
    pub fn stream_id(&self) -> &str {
        match self {
            NaturalKey::External { run, .. } => run,
            NaturalKey::Commit { sha, .. } => sha,
        }
    }

    pub fn storage_key(&self) -> String {
        match self {
            NaturalKey::External { run, job: None } => format!("ext:{}", run),
            NaturalKey::External { run, job: Some(job) } => format!("ext:{}/{}", run, job),
            NaturalKey::Commit { sha, platform } => format!("commit:{}@{}", sha, platform),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        if let Some(rest) = s.strip_prefix("ext:") {
            return match rest.split_once('/') {
                Some((run, job)) if !run.is_empty() && !job.is_empty() => {
                    Some(NaturalKey::external_job(run, job))
                }
                Some(_) => None,
                None if !rest.is_empty() => Some(NaturalKey::external(rest)),
                None => None,
            };
        }

        let rest = s.strip_prefix("commit:")?;
        let (sha, platform) = rest.rsplit_once('@')?;
        if sha.is_empty() {
            return None;
        }
        Some(NaturalKey::commit(sha, platform.parse().ok()?))
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Normalized build produced by every connector.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRecord {
    pub project: Uuid,
    pub commit_sha: String,
    pub commit_message: Option<String>,
    pub branch: String,
    pub success: bool,
    pub duration_seconds: Option<i64>,
    pub platform: Platform,
    pub runner: Option<String>,
    pub data_source: DataSource,
    pub workflow_name: Option<String>,
    pub workflow_run_id: Option<String>,
    pub job_id: Option<String>,
    pub natural_key: NaturalKey,
    pub metadata: Value,
    pub build_url: Option<String>,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
}

impl BuildRecord {
    /// Starts a record with the configuration's project, branch, source and platform.
    pub fn new(
        config: &SourceConfiguration,
        natural_key: NaturalKey,
        commit_sha: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            project: config.project.id,
            commit_sha: commit_sha.into(),
            commit_message: None,
            branch: config.branch.clone(),
            success,
            duration_seconds: None,
            platform: config.platform,
            runner: None,
            data_source: config.data_source,
            workflow_name: None,
            workflow_run_id: None,
            job_id: None,
            natural_key,
            metadata: Value::Null,
            build_url: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_message(mut self, message: Option<&str>) -> Self {
        self.commit_message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|m| truncate_message(m, MAX_COMMIT_MESSAGE_LEN));
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Sets both timestamps; the duration is derived from them only.
    pub fn with_timing(
        mut self,
        started_at: Option<NaiveDateTime>,
        finished_at: Option<NaiveDateTime>,
    ) -> Self {
        self.started_at = started_at;
        self.finished_at = finished_at;
        self.duration_seconds = duration_seconds(started_at, finished_at);
        self
    }

    /// For sources that report an elapsed time but not both timestamps.
    pub fn with_duration(mut self, seconds: Option<i64>) -> Self {
        self.duration_seconds = seconds.filter(|s| *s >= 0);
        self
    }

    pub fn with_runner(mut self, runner: Option<String>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_workflow(
        mut self,
        name: Option<String>,
        run_id: Option<String>,
        job_id: Option<String>,
    ) -> Self {
        self.workflow_name = name;
        self.workflow_run_id = run_id;
        self.job_id = job_id;
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.build_url = url;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn storage_key(&self) -> String {
        self.natural_key.storage_key()
    }

    pub fn into_active_model(self, created_at: NaiveDateTime) -> ABuild {
        let natural_key = self.natural_key.storage_key();
        let metadata = match self.metadata {
            Value::Null => None,
            other => Some(other),
        };

        ABuild {
            id: Set(Uuid::new_v4()),
            project: Set(self.project),
            commit_sha: Set(self.commit_sha),
            commit_message: Set(self.commit_message),
            branch: Set(self.branch),
            success: Set(self.success),
            duration_seconds: Set(self.duration_seconds),
            platform: Set(self.platform),
            runner: Set(self.runner),
            data_source: Set(self.data_source),
            workflow_name: Set(self.workflow_name),
            workflow_run_id: Set(self.workflow_run_id),
            job_id: Set(self.job_id),
            natural_key: Set(natural_key),
            scraper_metadata: Set(metadata),
            build_url: Set(self.build_url),
            started_at: Set(self.started_at),
            finished_at: Set(self.finished_at),
            created_at: Set(created_at),
        }
    }
}
