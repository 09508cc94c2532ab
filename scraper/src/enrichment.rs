/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use beanaries_core::consts::{BACKFILL_BATCH_SIZE, GITHUB_API_URL};
use beanaries_core::types::MProject;
use entity::project_config::DataSource;
use git_url_parse::GitUrl;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::batch::ConfigReport;
use super::error::{ScrapeError, ScrapeResult};
use super::git::GitMirror;
use super::registry::ScraperSettings;
use super::repository::{BuildRepository, ConfigFilter};
use super::scheduler::Enrichment;
use super::source::SourceLocator;
use super::transport::{HttpRequest, Transport};

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    stargazers_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StarsSummary {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rate_limited: bool,
}

/// `(owner, repo)` of a GitHub-hosted repository URL.
pub fn github_repository(url: &str) -> Option<(String, String)> {
    let parsed = GitUrl::parse(url).ok()?;
    if parsed.host.as_deref() != Some("github.com") {
        return None;
    }

    let owner = parsed.owner?;
    Some((owner, parsed.name))
}

/// Star refresh and commit-message backfill.
pub struct ProjectEnricher {
    repository: Arc<dyn BuildRepository>,
    transport: Arc<dyn Transport>,
    github_api_url: String,
    github_token: Option<String>,
    git: String,
    mirror_root: PathBuf,
}

impl ProjectEnricher {
    pub fn new(
        repository: Arc<dyn BuildRepository>,
        transport: Arc<dyn Transport>,
        settings: &ScraperSettings,
    ) -> Self {
        Self {
            repository,
            transport,
            github_api_url: GITHUB_API_URL.to_string(),
            github_token: settings.github_token.clone(),
            git: settings.git.clone(),
            mirror_root: settings.mirror_root.clone(),
        }
    }

    pub fn with_github_api_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_url = url.into();
        self
    }

    /// Stores the current star count; `None` when the project is not hosted on GitHub.
    pub async fn refresh_stars(&self, project: &MProject) -> ScrapeResult<Option<i32>> {
        let Some((owner, repo)) = github_repository(&project.url) else {
            return Ok(None);
        };

        let mut request = HttpRequest::get(format!("{}/repos/{}/{}", self.github_api_url, owner, repo))
            .header("Accept", "application/vnd.github.v3+json")
            .timeout(30);
        if let Some(token) = &self.github_token {
            request = request.header("Authorization", format!("token {}", token));
        }

        let info: RepositoryInfo = self
            .transport
            .send(request)
            .await?
            .error_for_status("github")?
            .json()?;

        let stars = i32::try_from(info.stargazers_count).unwrap_or(i32::MAX);
        self.repository.update_project_stars(project.id, stars).await?;
        debug!(project = %project.full_name, stars, "Updated stars");
        Ok(Some(stars))
    }

    /// Refreshes every active project, stopping at the first rate limit.
    #[instrument(skip_all)]
    pub async fn update_all_stars(&self) -> ScrapeResult<StarsSummary> {
        let mut summary = StarsSummary::default();

        for project in self.repository.projects().await? {
            match self.refresh_stars(&project).await {
                Ok(Some(_)) => summary.updated += 1,
                Ok(None) => summary.skipped += 1,
                Err(e) if e.is_rate_limit() => {
                    warn!(project = %project.full_name, "GitHub rate limit reached, stopping star refresh");
                    summary.rate_limited = true;
                    break;
                }
                Err(e) => {
                    warn!(project = %project.full_name, error = %e, "Cannot refresh stars");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Fills missing LUCI commit messages from the local mirror of `luci_project`.
    #[instrument(skip(self), fields(project = %project))]
    pub async fn backfill_commit_messages(&self, project: Uuid, luci_project: &str) -> ScrapeResult<u64> {
        let Some(mirror) = GitMirror::for_luci_project(&self.git, &self.mirror_root, luci_project) else {
            debug!(luci_project, "No local mirror, skipping backfill");
            return Ok(0);
        };

        let mut after = None;
        let mut filled = 0;

        loop {
            let batch = self
                .repository
                .builds_missing_commit_messages(project, DataSource::Luci, after, BACKFILL_BATCH_SIZE)
                .await?;
            let Some((last, _)) = batch.last() else {
                break;
            };
            after = Some(*last);

            let shas: Vec<String> = batch
                .iter()
                .map(|(_, sha)| sha.clone())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            let subjects = mirror.commit_subjects(&shas).await?;

            let messages: Vec<(Uuid, String)> = batch
                .iter()
                .filter_map(|(id, sha)| subjects.get(sha).map(|s| (*id, s.clone())))
                .collect();
            filled += self.repository.fill_commit_messages(messages).await?;

            if (batch.len() as u64) < BACKFILL_BATCH_SIZE {
                break;
            }
        }

        if filled > 0 {
            info!(filled, luci_project, "Backfilled commit messages");
        }
        Ok(filled)
    }

    /// Backfills every project with a LUCI configuration.
    pub async fn backfill_all(&self) -> ScrapeResult<u64> {
        let filter = ConfigFilter {
            data_source: Some(DataSource::Luci),
            ..Default::default()
        };

        let mut targets = Vec::new();
        for entry in self.repository.load_configs(&filter).await? {
            let config = match entry {
                Ok(config) => config,
                Err(invalid) => {
                    warn!(config_id = %invalid.config, error = %invalid.error, "Skipping invalid configuration");
                    continue;
                }
            };
            if let SourceLocator::Luci(locator) = &config.locator {
                let target = (config.project.id, locator.project.clone());
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }

        let mut filled = 0;
        for (project, luci_project) in targets {
            filled += self.backfill_commit_messages(project, &luci_project).await?;
        }
        Ok(filled)
    }
}

#[async_trait]
impl Enrichment for ProjectEnricher {
    async fn after_pass(&self, reports: &[ConfigReport]) {
        let mut starred = HashSet::new();
        let mut backfilled = HashSet::new();
        let mut stars_limited = false;

        for report in reports {
            if !report.outcome().is_some_and(|outcome| outcome.inserted > 0) {
                continue;
            }
            let config = &report.config;

            if !stars_limited && starred.insert(config.project.id) {
                if let Err(e) = self.refresh_stars(&config.project).await {
                    stars_limited = e.is_rate_limit();
                    warn!(project = %config.project.full_name, error = %e, "Star refresh failed");
                }
            }

            if let SourceLocator::Luci(locator) = &config.locator {
                if !backfilled.insert((config.project.id, locator.project.clone())) {
                    continue;
                }
                if let Err(e) = self
                    .backfill_commit_messages(config.project.id, &locator.project)
                    .await
                {
                    let e = ScrapeError::Enrichment(e.to_string());
                    warn!(project = %config.project.full_name, error = %e, "Commit message backfill failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_repository() {
        assert_eq!(
            github_repository("https://github.com/rust-lang/rust"),
            Some(("rust-lang".to_string(), "rust".to_string()))
        );
        assert_eq!(
            github_repository("https://github.com/torvalds/linux.git"),
            Some(("torvalds".to_string(), "linux".to_string()))
        );
        assert_eq!(github_repository("https://gitlab.freedesktop.org/mesa/mesa"), None);
        assert_eq!(github_repository("not a url"), None);
    }
}
