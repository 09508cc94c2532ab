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
                    .table(GitlabCiConfig::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(GitlabCiConfig::Config).uuid().not_null().primary_key())
                    .col(ColumnDef::new(GitlabCiConfig::Host).string())
                    .col(
                        ColumnDef::new(GitlabCiConfig::ProjectPath)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GitlabCiConfig::JobFilter).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-gitlab_ci_config-config")
                            .from(GitlabCiConfig::Table, GitlabCiConfig::Config)
                            .to(ProjectConfig::Table, ProjectConfig::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GitlabCiConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GitlabCiConfig {
    Table,
    Config,
    Host,
    ProjectPath,
    JobFilter,
}

#[derive(DeriveIden)]
enum ProjectConfig {
    Table,
    Id,
}
