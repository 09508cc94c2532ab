/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use beanaries_core::types::*;
use entity::project_config::DataSource;
use entity::*;
use sea_orm::sea_query::{Expr, NullOrdering, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, Order, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::error::{ScrapeError, ScrapeResult};
use super::record::{BuildRecord, NaturalKey};
use super::source::{LocatorRow, SourceConfiguration};

const BATCH_SIZE: usize = 1000;

/// A configuration row that could not be turned into a `SourceConfiguration`.
#[derive(Debug)]
pub struct InvalidConfig {
    pub config: Uuid,
    pub project: String,
    pub data_source: DataSource,
    pub error: ScrapeError,
}

pub type ConfigEntry = Result<SourceConfiguration, InvalidConfig>;

#[derive(Debug, Clone, Default)]
pub struct ConfigFilter {
    pub enabled_only: bool,
    /// Project full names; empty selects every project.
    pub projects: Vec<String>,
    pub data_source: Option<DataSource>,
}

impl ConfigFilter {
    pub fn enabled() -> Self {
        Self {
            enabled_only: true,
            ..Default::default()
        }
    }
}

/// Atomic unit of work for one sync of one configuration.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn find_most_recent_natural_key(
        &mut self,
        project: Uuid,
        data_source: DataSource,
    ) -> ScrapeResult<Option<NaturalKey>>;

    /// Storage forms of every natural key present for the pair.
    async fn find_existing_natural_keys(
        &mut self,
        project: Uuid,
        data_source: DataSource,
    ) -> ScrapeResult<HashSet<String>>;

    async fn batch_insert(&mut self, records: Vec<BuildRecord>) -> ScrapeResult<u64>;

    async fn update_last_checked(&mut self, config: Uuid, at: NaiveDateTime) -> ScrapeResult<()>;

    async fn commit(self: Box<Self>) -> ScrapeResult<()>;

    async fn rollback(self: Box<Self>) -> ScrapeResult<()>;
}

#[async_trait]
pub trait BuildRepository: Send + Sync {
    async fn begin(&self) -> ScrapeResult<Box<dyn UnitOfWork>>;

    async fn load_configs(&self, filter: &ConfigFilter) -> ScrapeResult<Vec<ConfigEntry>>;

    async fn projects(&self) -> ScrapeResult<Vec<MProject>>;

    async fn update_project_stars(&self, project: Uuid, stars: i32) -> ScrapeResult<()>;

    /// Up to `limit` `(build id, commit sha)` pairs without a message, ordered by id after `after`.
    async fn builds_missing_commit_messages(
        &self,
        project: Uuid,
        data_source: DataSource,
        after: Option<Uuid>,
        limit: u64,
    ) -> ScrapeResult<Vec<(Uuid, String)>>;

    /// Sets messages only where none is stored yet; returns the number of rows filled.
    async fn fill_commit_messages(&self, messages: Vec<(Uuid, String)>) -> ScrapeResult<u64>;
}

pub struct SeaOrmRepository {
    state: Arc<ServerState>,
}

impl SeaOrmRepository {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }
}

pub struct SeaOrmUnitOfWork {
    txn: DatabaseTransaction,
}

async fn load_locators<E>(
    db: &DatabaseConnection,
    ids: &[Uuid],
    column: E::Column,
) -> Result<Vec<E::Model>, DbErr>
where
    E: EntityTrait,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    E::find()
        .filter(column.is_in(ids.iter().copied()))
        .all(db)
        .await
}

#[async_trait]
impl BuildRepository for SeaOrmRepository {
    async fn begin(&self) -> ScrapeResult<Box<dyn UnitOfWork>> {
        let txn = self.db().begin().await?;
        Ok(Box::new(SeaOrmUnitOfWork { txn }))
    }

    async fn load_configs(&self, filter: &ConfigFilter) -> ScrapeResult<Vec<ConfigEntry>> {
        let mut query = EProjectConfig::find().find_also_related(entity::project::Entity);

        if filter.enabled_only {
            query = query
                .filter(CProjectConfig::IsEnabled.eq(true))
                .filter(CProject::IsActive.eq(true));
        }

        if let Some(data_source) = filter.data_source {
            query = query.filter(CProjectConfig::DataSource.eq(data_source));
        }

        if !filter.projects.is_empty() {
            query = query.filter(CProject::FullName.is_in(filter.projects.clone()));
        }

        let rows = query
            .order_by_asc(CProjectConfig::CreatedAt)
            .all(self.db())
            .await?;
        let ids: Vec<Uuid> = rows.iter().map(|(config, _)| config.id).collect();

        let mut locators: HashMap<Uuid, LocatorRow> = HashMap::new();

        for row in load_locators::<EGithubActionsConfig>(
            self.db(),
            &ids,
            github_actions_config::Column::Config,
        )
        .await?
        {
            locators.insert(row.config, LocatorRow::GithubActions(row));
        }

        for row in load_locators::<ELuciConfig>(self.db(), &ids, luci_config::Column::Config).await? {
            locators.insert(row.config, LocatorRow::Luci(row));
        }

        for row in
            load_locators::<EBuildkiteConfig>(self.db(), &ids, buildkite_config::Column::Config)
                .await?
        {
            locators.insert(row.config, LocatorRow::Buildkite(row));
        }

        for row in load_locators::<EKojiConfig>(self.db(), &ids, koji_config::Column::Config).await? {
            locators.insert(row.config, LocatorRow::Koji(row));
        }

        for row in load_locators::<EObsConfig>(self.db(), &ids, obs_config::Column::Config).await? {
            locators.insert(row.config, LocatorRow::Obs(row));
        }

        for row in
            load_locators::<EGitlabCiConfig>(self.db(), &ids, gitlab_ci_config::Column::Config)
                .await?
        {
            locators.insert(row.config, LocatorRow::GitlabCi(row));
        }

        for row in
            load_locators::<ELocalBuildConfig>(self.db(), &ids, local_build_config::Column::Config)
                .await?
        {
            locators.insert(row.config, LocatorRow::LocalBuild(row));
        }

        let mut entries = Vec::with_capacity(rows.len());
        for (config, project) in rows {
            let Some(project) = project else {
                warn!(config_id = %config.id, "Configuration without project, skipping");
                continue;
            };

            let config_id = config.id;
            let data_source = config.data_source;
            let full_name = project.full_name.clone();
            let row = locators.remove(&config_id);

            entries.push(
                SourceConfiguration::from_rows(config, project, row).map_err(|error| {
                    InvalidConfig {
                        config: config_id,
                        project: full_name,
                        data_source,
                        error,
                    }
                }),
            );
        }

        Ok(entries)
    }

    async fn projects(&self) -> ScrapeResult<Vec<MProject>> {
        Ok(EProject::find()
            .filter(CProject::IsActive.eq(true))
            .order_by_asc(CProject::FullName)
            .all(self.db())
            .await?)
    }

    async fn update_project_stars(&self, project: Uuid, stars: i32) -> ScrapeResult<()> {
        EProject::update_many()
            .col_expr(CProject::Stars, Expr::value(stars))
            .col_expr(CProject::UpdatedAt, Expr::value(Utc::now().naive_utc()))
            .filter(CProject::Id.eq(project))
            .exec(self.db())
            .await?;
        Ok(())
    }

    async fn builds_missing_commit_messages(
        &self,
        project: Uuid,
        data_source: DataSource,
        after: Option<Uuid>,
        limit: u64,
    ) -> ScrapeResult<Vec<(Uuid, String)>> {
        let mut query = EBuild::find()
            .select_only()
            .column(CBuild::Id)
            .column(CBuild::CommitSha)
            .filter(CBuild::Project.eq(project))
            .filter(CBuild::DataSource.eq(data_source))
            .filter(CBuild::CommitMessage.is_null());

        if let Some(after) = after {
            query = query.filter(CBuild::Id.gt(after));
        }

        Ok(query
            .order_by_asc(CBuild::Id)
            .limit(limit)
            .into_tuple::<(Uuid, String)>()
            .all(self.db())
            .await?)
    }

    async fn fill_commit_messages(&self, messages: Vec<(Uuid, String)>) -> ScrapeResult<u64> {
        if messages.is_empty() {
            return Ok(0);
        }

        let txn = self.db().begin().await?;
        let mut filled = 0;

        for (id, message) in messages {
            let result = EBuild::update_many()
                .col_expr(CBuild::CommitMessage, Expr::value(message))
                .filter(CBuild::Id.eq(id))
                .filter(CBuild::CommitMessage.is_null())
                .exec(&txn)
                .await?;
            filled += result.rows_affected;
        }

        txn.commit().await?;
        Ok(filled)
    }
}

#[async_trait]
impl UnitOfWork for SeaOrmUnitOfWork {
    async fn find_most_recent_natural_key(
        &mut self,
        project: Uuid,
        data_source: DataSource,
    ) -> ScrapeResult<Option<NaturalKey>> {
        let key = EBuild::find()
            .select_only()
            .column(CBuild::NaturalKey)
            .filter(CBuild::Project.eq(project))
            .filter(CBuild::DataSource.eq(data_source))
            .order_by_with_nulls(CBuild::StartedAt, Order::Desc, NullOrdering::Last)
            .order_by_desc(CBuild::CreatedAt)
            .into_tuple::<String>()
            .one(&self.txn)
            .await?;

        Ok(key.and_then(|k| {
            let parsed = NaturalKey::parse(&k);
            if parsed.is_none() {
                warn!(natural_key = %k, "Stored natural key is not parseable");
            }
            parsed
        }))
    }

    async fn find_existing_natural_keys(
        &mut self,
        project: Uuid,
        data_source: DataSource,
    ) -> ScrapeResult<HashSet<String>> {
        let keys = EBuild::find()
            .select_only()
            .column(CBuild::NaturalKey)
            .filter(CBuild::Project.eq(project))
            .filter(CBuild::DataSource.eq(data_source))
            .into_tuple::<String>()
            .all(&self.txn)
            .await?;

        Ok(keys.into_iter().collect())
    }

    async fn batch_insert(&mut self, records: Vec<BuildRecord>) -> ScrapeResult<u64> {
        let now = Utc::now().naive_utc();
        let mut inserted = 0;

        let models: Vec<ABuild> = records
            .into_iter()
            .map(|record| record.into_active_model(now))
            .collect();

        for chunk in models.chunks(BATCH_SIZE) {
            inserted += EBuild::insert_many(chunk.to_vec())
                .on_conflict(
                    OnConflict::columns([CBuild::Project, CBuild::DataSource, CBuild::NaturalKey])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&self.txn)
                .await?;
        }

        Ok(inserted)
    }

    async fn update_last_checked(&mut self, config: Uuid, at: NaiveDateTime) -> ScrapeResult<()> {
        EProjectConfig::update_many()
            .col_expr(CProjectConfig::LastCheckedAt, Expr::value(at))
            .filter(CProjectConfig::Id.eq(config))
            .exec(&self.txn)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> ScrapeResult<()> {
        Ok(self.txn.commit().await?)
    }

    async fn rollback(self: Box<Self>) -> ScrapeResult<()> {
        Ok(self.txn.rollback().await?)
    }
}
