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
                    .table(ProjectConfig::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectConfig::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProjectConfig::Project).uuid().not_null())
                    .col(
                        ColumnDef::new(ProjectConfig::DataSource)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectConfig::Platform)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectConfig::Branch)
                            .string()
                            .not_null()
                            .default("main"),
                    )
                    .col(
                        ColumnDef::new(ProjectConfig::IsEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ProjectConfig::CheckIntervalHours)
                            .integer()
                            .not_null()
                            .default(24),
                    )
                    .col(ColumnDef::new(ProjectConfig::LastCheckedAt).date_time())
                    .col(
                        ColumnDef::new(ProjectConfig::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-project_config-project")
                            .from(ProjectConfig::Table, ProjectConfig::Project)
                            .to(Project::Table, Project::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-project_config-project")
                    .table(ProjectConfig::Table)
                    .col(ProjectConfig::Project)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProjectConfig {
    Table,
    Id,
    Project,
    DataSource,
    Platform,
    Branch,
    IsEnabled,
    CheckIntervalHours,
    LastCheckedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Project {
    Table,
    Id,
}
