/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use entity::project_config::DataSource;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::engine::{Scraper, SyncOptions, SyncOutcome};
use super::error::{ScrapeError, ScrapeResult};
use super::registry::ConnectorRegistry;
use super::repository::{BuildRepository, ConfigEntry, ConfigFilter};
use super::source::SourceConfiguration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassError {
    pub config: Uuid,
    pub project: String,
    pub data_source: DataSource,
    pub kind: String,
    pub message: String,
}

impl PassError {
    pub fn new(config: Uuid, project: &str, data_source: DataSource, error: &ScrapeError) -> Self {
        Self {
            config,
            project: project.to_string(),
            data_source,
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Configurations not attempted because their source was rate limited earlier in the pass.
    pub skipped: usize,
    pub builds_added: u64,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
    pub errors: Vec<PassError>,
}

impl PassSummary {
    pub fn record(&mut self, report: &ConfigReport) {
        match &report.result {
            ConfigResult::Synced(outcome) => {
                self.attempted += 1;
                self.succeeded += 1;
                self.builds_added += outcome.inserted;
            }
            ConfigResult::Failed(error) => {
                self.attempted += 1;
                self.failed += 1;
                self.errors.push(error.clone());
            }
            ConfigResult::Skipped(error) => {
                self.skipped += 1;
                self.errors.push(error.clone());
            }
        }
    }

    pub fn record_invalid(&mut self, error: PassError) {
        self.attempted += 1;
        self.failed += 1;
        self.errors.push(error);
    }
}

#[derive(Debug, Clone)]
pub enum ConfigResult {
    Synced(SyncOutcome),
    Failed(PassError),
    Skipped(PassError),
}

#[derive(Debug, Clone)]
pub struct ConfigReport {
    pub config: SourceConfiguration,
    pub result: ConfigResult,
    pub rate_limited: bool,
}

impl ConfigReport {
    pub fn skipped(config: SourceConfiguration) -> Self {
        let error = ScrapeError::RateLimited {
            service: config.data_source.to_string(),
        };
        let result = ConfigResult::Skipped(PassError::new(
            config.id,
            &config.project.full_name,
            config.data_source,
            &error,
        ));

        Self {
            config,
            result,
            rate_limited: true,
        }
    }

    pub fn outcome(&self) -> Option<&SyncOutcome> {
        match &self.result {
            ConfigResult::Synced(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// Syncs one configuration under a deadline. Dropping the sync on timeout drops its transaction.
pub async fn sync_one(
    scraper: Arc<dyn Scraper>,
    repository: Arc<dyn BuildRepository>,
    config: SourceConfiguration,
    options: SyncOptions,
    deadline: Duration,
) -> ConfigReport {
    let result = match timeout(deadline, scraper.sync(&config, repository.as_ref(), &options)).await
    {
        Ok(result) => result,
        Err(_) => Err(ScrapeError::Timeout {
            operation: format!("sync of {}", config.label()),
            seconds: deadline.as_secs(),
        }),
    };

    match result {
        Ok(outcome) => ConfigReport {
            config,
            result: ConfigResult::Synced(outcome),
            rate_limited: false,
        },
        Err(e) => {
            if e.is_transient() {
                warn!(config = %config.label(), error = %e, "Sync failed, retrying next cycle");
            } else {
                error!(config = %config.label(), error = %e, "Sync failed");
                sentry::capture_error(&e);
            }

            ConfigReport {
                rate_limited: e.is_rate_limit(),
                result: ConfigResult::Failed(PassError::new(
                    config.id,
                    &config.project.full_name,
                    config.data_source,
                    &e,
                )),
                config,
            }
        }
    }
}

pub fn split_entries(entries: Vec<ConfigEntry>, summary: &mut PassSummary) -> Vec<SourceConfiguration> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(config) => Some(config),
            Err(invalid) => {
                warn!(config_id = %invalid.config, project = %invalid.project, error = %invalid.error, "Invalid configuration");
                summary.record_invalid(PassError::new(
                    invalid.config,
                    &invalid.project,
                    invalid.data_source,
                    &invalid.error,
                ));
                None
            }
        })
        .collect()
}

/// One sequential pass over the selected configurations, regardless of due state.
pub async fn sync_configs(
    registry: &ConnectorRegistry,
    repository: Arc<dyn BuildRepository>,
    filter: &ConfigFilter,
    options: SyncOptions,
    deadline: Duration,
) -> ScrapeResult<PassSummary> {
    let mut summary = PassSummary {
        started_at: Some(options.checked_at),
        ..Default::default()
    };

    let entries = repository.load_configs(filter).await?;
    let configs = split_entries(entries, &mut summary);
    let mut rate_limited: Vec<DataSource> = Vec::new();

    for config in configs {
        let Some(scraper) = registry.get(config.data_source) else {
            info!(config = %config.label(), "No connector for data source, skipping");
            continue;
        };

        let report = if rate_limited.contains(&config.data_source) {
            ConfigReport::skipped(config)
        } else {
            info!(config = %config.label(), "Scraping");
            sync_one(scraper, Arc::clone(&repository), config, options.clone(), deadline).await
        };

        if report.rate_limited && !rate_limited.contains(&report.config.data_source) {
            rate_limited.push(report.config.data_source);
        }

        summary.record(&report);
    }

    summary.finished_at = Some(chrono::Utc::now().naive_utc());
    Ok(summary)
}
