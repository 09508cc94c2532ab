/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use beanaries_core::input::resolve_secret;
use beanaries_core::types::Cli;
use entity::project_config::DataSource;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::connectors::*;
use super::engine::{Scraper, SyncEngine};
use super::transport::Transport;

/// Credentials and local paths the connectors are built from.
#[derive(Debug, Clone, Default)]
pub struct ScraperSettings {
    pub github_token: Option<String>,
    pub buildkite_token: Option<String>,
    pub gitlab_token: Option<String>,
    pub obs_api_url: Option<String>,
    pub obs_username: Option<String>,
    pub obs_token: Option<String>,
    pub git: String,
    pub shell: String,
    pub mirror_root: PathBuf,
    pub workspace_dir: Option<PathBuf>,
    pub luci_validate_commits: bool,
}

impl ScraperSettings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            github_token: resolve_secret(&cli.github_token, &cli.github_token_file),
            buildkite_token: resolve_secret(&cli.buildkite_token, &cli.buildkite_token_file),
            gitlab_token: resolve_secret(&cli.gitlab_token, &cli.gitlab_token_file),
            obs_api_url: Some(cli.obs_api_url.clone()),
            obs_username: cli.obs_username.clone().filter(|u| !u.is_empty()),
            obs_token: resolve_secret(&cli.obs_token, &cli.obs_token_file),
            git: cli.binpath_git.clone(),
            shell: cli.binpath_sh.clone(),
            mirror_root: PathBuf::from(&cli.mirror_root),
            workspace_dir: cli.workspace_dir.as_ref().map(PathBuf::from),
            luci_validate_commits: cli.luci_validate_commits,
        }
    }
}

/// Data source to connector, resolved once at startup.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    scrapers: HashMap<DataSource, Arc<dyn Scraper>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scraper: Arc<dyn Scraper>) -> &mut Self {
        self.scrapers.insert(scraper.data_source(), scraper);
        self
    }

    pub fn get(&self, data_source: DataSource) -> Option<Arc<dyn Scraper>> {
        self.scrapers.get(&data_source).cloned()
    }

    pub fn contains(&self, data_source: DataSource) -> bool {
        self.scrapers.contains_key(&data_source)
    }

    pub fn data_sources(&self) -> Vec<DataSource> {
        let mut sources: Vec<DataSource> = self.scrapers.keys().copied().collect();
        sources.sort_by_key(|s| s.as_str());
        sources
    }

    pub fn from_settings(settings: &ScraperSettings, transport: Arc<dyn Transport>) -> Self {
        let mut luci = LuciConnector::new(Arc::clone(&transport));
        if settings.luci_validate_commits {
            luci = luci.validate_commits(&settings.git, &settings.mirror_root);
        }

        let obs = match &settings.obs_api_url {
            Some(url) => ObsConnector::with_api_url(Arc::clone(&transport), url),
            None => ObsConnector::new(Arc::clone(&transport)),
        }
        .credentials(settings.obs_username.clone(), settings.obs_token.clone());

        let mut registry = Self::new();
        registry
            .register(Arc::new(SyncEngine::new(GithubActionsConnector::new(
                Arc::clone(&transport),
                settings.github_token.clone(),
            ))))
            .register(Arc::new(SyncEngine::new(luci)))
            .register(Arc::new(SyncEngine::new(BuildkiteConnector::new(
                Arc::clone(&transport),
                settings.buildkite_token.clone(),
            ))))
            .register(Arc::new(SyncEngine::new(GitlabConnector::new(
                Arc::clone(&transport),
                settings.gitlab_token.clone(),
            ))))
            .register(Arc::new(SyncEngine::new(KojiConnector::new(Arc::clone(&transport)))))
            .register(Arc::new(SyncEngine::new(obs)))
            .register(Arc::new(SyncEngine::new(LocalBuildConnector::new(
                &settings.git,
                &settings.shell,
                settings.workspace_dir.clone(),
            ))));

        registry
    }
}
