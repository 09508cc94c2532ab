/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Build::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Build::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Build::Project).uuid().not_null())
                    .col(ColumnDef::new(Build::CommitSha).string_len(64).not_null())
                    .col(ColumnDef::new(Build::CommitMessage).text())
                    .col(ColumnDef::new(Build::Branch).string().not_null())
                    .col(ColumnDef::new(Build::Success).boolean().not_null())
                    .col(ColumnDef::new(Build::DurationSeconds).big_integer())
                    .col(ColumnDef::new(Build::Platform).string_len(32).not_null())
                    .col(ColumnDef::new(Build::Runner).string())
                    .col(ColumnDef::new(Build::DataSource).string_len(32).not_null())
                    .col(ColumnDef::new(Build::WorkflowName).string())
                    .col(ColumnDef::new(Build::WorkflowRunId).string())
                    .col(ColumnDef::new(Build::JobId).string())
                    .col(ColumnDef::new(Build::NaturalKey).string().not_null())
                    .col(ColumnDef::new(Build::ScraperMetadata).json_binary())
                    .col(ColumnDef::new(Build::BuildUrl).string())
                    .col(ColumnDef::new(Build::StartedAt).date_time())
                    .col(ColumnDef::new(Build::FinishedAt).date_time())
                    .col(ColumnDef::new(Build::CreatedAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-build-project")
                            .from(Build::Table, Build::Project)
                            .to(Project::Table, Project::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-build-natural_key")
                    .table(Build::Table)
                    .col(Build::Project)
                    .col(Build::DataSource)
                    .col(Build::NaturalKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-build-started_at")
                    .table(Build::Table)
                    .col(Build::Project)
                    .col(Build::DataSource)
                    .col(Build::StartedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Build::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Build {
    Table,
    Id,
    Project,
    CommitSha,
    CommitMessage,
    Branch,
    Success,
    DurationSeconds,
    Platform,
    Runner,
    DataSource,
    WorkflowName,
    WorkflowRunId,
    JobId,
    NaturalKey,
    ScraperMetadata,
    BuildUrl,
    StartedAt,
    FinishedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Project {
    Table,
    Id,
}
