/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use chrono::NaiveDateTime;
use entity::project_config::DataSource;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, error, info, instrument, warn};

use super::error::{ScrapeError, ScrapeResult};
use super::record::{BuildRecord, NaturalKey};
use super::repository::{BuildRepository, UnitOfWork};
use super::source::{SourceConfiguration, SourceLocator};

/// Position in a remote listing, in the pagination scheme of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Page(u32),
    Token(String),
    /// Offset within a listing scoped to a resolved remote id.
    Offset { scope: i64, offset: u32 },
}

#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` once the remote listing is exhausted.
    pub next: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    /// Continues with `next` only when the page came back full.
    pub fn sized(items: Vec<T>, requested: u32, next: Cursor) -> Self {
        let next = (items.len() >= requested as usize && !items.is_empty()).then_some(next);
        Self { items, next }
    }
}

/// Configuration together with its statically typed locator.
pub struct SyncTarget<'a, L> {
    pub config: &'a SourceConfiguration,
    pub locator: &'a L,
}

impl<L> Clone for SyncTarget<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L> Copy for SyncTarget<'_, L> {}

/// One CI platform: how to page through its history and how to map it.
///
/// Items are what a listing page returns (runs, builds, revisions). `expand` turns a batch
/// of items into the units that become records, which lets a connector fetch per-item
/// details (jobs of a run) or attach data shared by the whole batch.
#[async_trait]
pub trait SourceConnector: Send + Sync + 'static {
    type Locator: Send + Sync;
    type Item: Send;
    type Unit: Send;

    fn data_source(&self) -> DataSource;

    fn locator<'a>(&self, locator: &'a SourceLocator) -> Option<&'a Self::Locator>;

    /// Whether listings are returned newest first; early stop relies on it.
    fn newest_first(&self) -> bool {
        true
    }

    fn page_size(&self) -> u32 {
        100
    }

    async fn fetch_page(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        cursor: Option<&Cursor>,
        page_size: u32,
    ) -> ScrapeResult<Page<Self::Item>>;

    /// Id compared against the stop marker's stream id.
    fn stream_id(&self, item: &Self::Item) -> String;

    /// Natural key of an item when known before expansion, so known items skip `expand`.
    fn item_key(&self, _target: SyncTarget<'_, Self::Locator>, _item: &Self::Item) -> Option<NaturalKey> {
        None
    }

    async fn expand(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        items: Vec<Self::Item>,
    ) -> ScrapeResult<Vec<Self::Unit>>;

    fn map_to_canonical(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        unit: Self::Unit,
    ) -> ScrapeResult<BuildRecord>;
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Upper bound on listing items fetched; `None` is unlimited.
    pub limit: Option<usize>,
    pub only_new: bool,
    pub checked_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub fetched: usize,
    pub pages: u32,
    pub inserted: u64,
    pub skipped_existing: usize,
    pub skipped_unmappable: usize,
    pub stopped_at_marker: bool,
}

/// Object-safe face of a connector, as stored in the registry.
#[async_trait]
pub trait Scraper: Send + Sync {
    fn data_source(&self) -> DataSource;

    async fn sync(
        &self,
        config: &SourceConfiguration,
        repository: &dyn BuildRepository,
        options: &SyncOptions,
    ) -> ScrapeResult<SyncOutcome>;
}

/// Incremental sync shared by every connector.
pub struct SyncEngine<C> {
    connector: C,
}

impl<C: SourceConnector> SyncEngine<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    async fn fetch_items(
        &self,
        target: SyncTarget<'_, C::Locator>,
        marker: Option<&str>,
        limit: Option<usize>,
        outcome: &mut SyncOutcome,
    ) -> ScrapeResult<Vec<C::Item>> {
        let mut items = Vec::new();
        let mut cursor: Option<Cursor> = None;
        // Page-number cursors address items by page * page_size, so the size stays fixed.
        let page_size = self.connector.page_size();

        loop {
            if limit.is_some_and(|l| items.len() >= l) {
                break;
            }

            let page = self
                .connector
                .fetch_page(target, cursor.as_ref(), page_size)
                .await?;
            outcome.pages += 1;

            let received = page.items.len();
            debug!(page = outcome.pages, received, "Fetched page");

            for item in page.items {
                if marker.is_some_and(|m| self.connector.stream_id(&item) == m) {
                    outcome.stopped_at_marker = true;
                    break;
                }
                if limit.is_some_and(|l| items.len() >= l) {
                    break;
                }
                items.push(item);
            }

            if outcome.stopped_at_marker || received == 0 {
                break;
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        outcome.fetched = items.len();
        Ok(items)
    }

    async fn run(
        &self,
        target: SyncTarget<'_, C::Locator>,
        uow: &mut dyn UnitOfWork,
        options: &SyncOptions,
    ) -> ScrapeResult<SyncOutcome> {
        let config = target.config;
        let project = config.project.id;
        let data_source = self.connector.data_source();
        let mut outcome = SyncOutcome::default();

        let marker = if options.only_new && self.connector.newest_first() {
            uow.find_most_recent_natural_key(project, data_source)
                .await?
                .map(|key| key.stream_id().to_string())
        } else {
            None
        };

        if let Some(marker) = &marker {
            debug!(marker = %marker, "Stopping at most recent stored build");
        }

        let items = self
            .fetch_items(target, marker.as_deref(), options.limit, &mut outcome)
            .await?;

        let mut seen = uow.find_existing_natural_keys(project, data_source).await?;

        let mut fresh = Vec::with_capacity(items.len());
        for item in items {
            match self.connector.item_key(target, &item) {
                Some(key) if seen.contains(&key.storage_key()) => outcome.skipped_existing += 1,
                _ => fresh.push(item),
            }
        }

        let units = if fresh.is_empty() {
            Vec::new()
        } else {
            self.connector.expand(target, fresh).await?
        };

        let mut staged: Vec<BuildRecord> = Vec::new();
        for unit in units {
            let record = match self.connector.map_to_canonical(target, unit) {
                Ok(record) => record,
                Err(ScrapeError::Mapping(reason)) => {
                    warn!(reason = %reason, "Skipping unmappable record");
                    outcome.skipped_unmappable += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !seen.insert(record.storage_key()) {
                outcome.skipped_existing += 1;
                continue;
            }

            staged.push(record);
        }

        outcome.inserted = if staged.is_empty() {
            0
        } else {
            uow.batch_insert(staged).await?
        };

        uow.update_last_checked(config.id, options.checked_at).await?;

        Ok(outcome)
    }
}

#[async_trait]
impl<C: SourceConnector> Scraper for SyncEngine<C> {
    fn data_source(&self) -> DataSource {
        self.connector.data_source()
    }

    #[instrument(skip_all, fields(project = %config.project.full_name, source = %config.data_source, config_id = %config.id))]
    async fn sync(
        &self,
        config: &SourceConfiguration,
        repository: &dyn BuildRepository,
        options: &SyncOptions,
    ) -> ScrapeResult<SyncOutcome> {
        let locator = self.connector.locator(&config.locator).ok_or_else(|| {
            ScrapeError::configuration(format!(
                "config {} is not a {} configuration",
                config.id,
                self.connector.data_source()
            ))
        })?;

        let target = SyncTarget { config, locator };
        let mut uow = repository.begin().await?;

        match self.run(target, uow.as_mut(), options).await {
            Ok(outcome) => {
                uow.commit().await?;
                info!(
                    fetched = outcome.fetched,
                    inserted = outcome.inserted,
                    skipped = outcome.skipped_existing,
                    "Sync finished"
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_error) = uow.rollback().await {
                    error!(error = %rollback_error, "Failed to roll back sync");
                }
                Err(e)
            }
        }
    }
}
