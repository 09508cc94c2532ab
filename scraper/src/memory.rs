/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Process-local `BuildRepository` used by tests and dry runs.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use beanaries_core::types::MProject;
use entity::project_config::DataSource;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::error::{ScrapeError, ScrapeResult};
use super::record::{BuildRecord, NaturalKey};
use super::repository::{BuildRepository, ConfigEntry, ConfigFilter, InvalidConfig, UnitOfWork};
use super::source::SourceConfiguration;

#[derive(Debug, Clone)]
pub struct StoredBuild {
    pub id: Uuid,
    pub record: BuildRecord,
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    projects: Vec<MProject>,
    configs: Vec<SourceConfiguration>,
    invalid: Vec<(Uuid, String, DataSource, String)>,
    builds: Vec<StoredBuild>,
    last_checked: HashMap<Uuid, NaiveDateTime>,
    sequence: u64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, project: MProject) {
        lock(&self.state).projects.push(project);
    }

    pub fn add_config(&self, config: SourceConfiguration) {
        let mut state = lock(&self.state);
        if !state.projects.iter().any(|p| p.id == config.project.id) {
            state.projects.push(config.project.clone());
        }
        state.configs.push(config);
    }

    /// Registers a configuration row that fails to load with a configuration error.
    pub fn add_invalid_config(&self, project: &str, data_source: DataSource, reason: &str) -> Uuid {
        let id = Uuid::new_v4();
        lock(&self.state)
            .invalid
            .push((id, project.to_string(), data_source, reason.to_string()));
        id
    }

    pub fn builds(&self) -> Vec<StoredBuild> {
        lock(&self.state).builds.clone()
    }

    pub fn builds_for(&self, project: Uuid, data_source: DataSource) -> Vec<BuildRecord> {
        lock(&self.state)
            .builds
            .iter()
            .filter(|b| b.record.project == project && b.record.data_source == data_source)
            .map(|b| b.record.clone())
            .collect()
    }

    pub fn last_checked(&self, config: Uuid) -> Option<NaiveDateTime> {
        lock(&self.state).last_checked.get(&config).copied()
    }

    pub fn project(&self, id: Uuid) -> Option<MProject> {
        lock(&self.state).projects.iter().find(|p| p.id == id).cloned()
    }
}

fn matches_filter(filter: &ConfigFilter, project: &str, data_source: DataSource) -> bool {
    (filter.projects.is_empty() || filter.projects.iter().any(|p| p == project))
        && filter.data_source.is_none_or(|d| d == data_source)
}

#[async_trait]
impl BuildRepository for MemoryRepository {
    async fn begin(&self) -> ScrapeResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
            last_checked: Vec::new(),
        }))
    }

    async fn load_configs(&self, filter: &ConfigFilter) -> ScrapeResult<Vec<ConfigEntry>> {
        let state = lock(&self.state);
        let mut entries: Vec<ConfigEntry> = Vec::new();

        for config in &state.configs {
            if filter.enabled_only && (!config.is_enabled || !config.project.is_active) {
                continue;
            }
            if !matches_filter(filter, &config.project.full_name, config.data_source) {
                continue;
            }

            let mut config = config.clone();
            if let Some(at) = state.last_checked.get(&config.id) {
                config.last_checked_at = Some(*at);
            }
            entries.push(Ok(config));
        }

        for (id, project, data_source, reason) in &state.invalid {
            if matches_filter(filter, project, *data_source) {
                entries.push(Err(InvalidConfig {
                    config: *id,
                    project: project.clone(),
                    data_source: *data_source,
                    error: ScrapeError::configuration(reason.clone()),
                }));
            }
        }

        Ok(entries)
    }

    async fn projects(&self) -> ScrapeResult<Vec<MProject>> {
        Ok(lock(&self.state)
            .projects
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn update_project_stars(&self, project: Uuid, stars: i32) -> ScrapeResult<()> {
        let mut state = lock(&self.state);
        if let Some(p) = state.projects.iter_mut().find(|p| p.id == project) {
            p.stars = stars;
        }
        Ok(())
    }

    async fn builds_missing_commit_messages(
        &self,
        project: Uuid,
        data_source: DataSource,
        after: Option<Uuid>,
        limit: u64,
    ) -> ScrapeResult<Vec<(Uuid, String)>> {
        let state = lock(&self.state);
        let mut missing: Vec<(Uuid, String)> = state
            .builds
            .iter()
            .filter(|b| {
                b.record.project == project
                    && b.record.data_source == data_source
                    && b.record.commit_message.is_none()
                    && after.is_none_or(|a| b.id > a)
            })
            .map(|b| (b.id, b.record.commit_sha.clone()))
            .collect();

        missing.sort();
        missing.truncate(limit as usize);
        Ok(missing)
    }

    async fn fill_commit_messages(&self, messages: Vec<(Uuid, String)>) -> ScrapeResult<u64> {
        let mut state = lock(&self.state);
        let mut filled = 0;

        for (id, message) in messages {
            if let Some(build) = state
                .builds
                .iter_mut()
                .find(|b| b.id == id && b.record.commit_message.is_none())
            {
                build.record.commit_message = Some(message);
                filled += 1;
            }
        }

        Ok(filled)
    }
}

struct MemoryUnitOfWork {
    state: Arc<Mutex<MemoryState>>,
    staged: Vec<BuildRecord>,
    last_checked: Vec<(Uuid, NaiveDateTime)>,
}

fn committed_keys(state: &MemoryState, project: Uuid, data_source: DataSource) -> HashSet<String> {
    state
        .builds
        .iter()
        .filter(|b| b.record.project == project && b.record.data_source == data_source)
        .map(|b| b.record.storage_key())
        .collect()
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_most_recent_natural_key(
        &mut self,
        project: Uuid,
        data_source: DataSource,
    ) -> ScrapeResult<Option<NaturalKey>> {
        let state = lock(&self.state);

        // started_at descending with missing timestamps last, then newest insert
        Ok(state
            .builds
            .iter()
            .filter(|b| b.record.project == project && b.record.data_source == data_source)
            .max_by_key(|b| (b.record.started_at.is_some(), b.record.started_at, b.sequence))
            .map(|b| b.record.natural_key.clone()))
    }

    async fn find_existing_natural_keys(
        &mut self,
        project: Uuid,
        data_source: DataSource,
    ) -> ScrapeResult<HashSet<String>> {
        Ok(committed_keys(&lock(&self.state), project, data_source))
    }

    async fn batch_insert(&mut self, records: Vec<BuildRecord>) -> ScrapeResult<u64> {
        let count = records.len() as u64;
        self.staged.extend(records);
        Ok(count)
    }

    async fn update_last_checked(&mut self, config: Uuid, at: NaiveDateTime) -> ScrapeResult<()> {
        self.last_checked.push((config, at));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> ScrapeResult<()> {
        let mut state = lock(&self.state);

        for record in self.staged {
            let existing = committed_keys(&state, record.project, record.data_source);
            if existing.contains(&record.storage_key()) {
                continue;
            }

            state.sequence += 1;
            let sequence = state.sequence;
            state.builds.push(StoredBuild {
                id: Uuid::new_v4(),
                record,
                sequence,
            });
        }

        for (config, at) in self.last_checked {
            state.last_checked.insert(config, at);
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ScrapeResult<()> {
        Ok(())
    }
}
