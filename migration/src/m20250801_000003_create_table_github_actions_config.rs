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
                    .table(GithubActionsConfig::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(GithubActionsConfig::Config).uuid().not_null().primary_key())
                    .col(ColumnDef::new(GithubActionsConfig::WorkflowFile).string())
                    .col(
                        ColumnDef::new(GithubActionsConfig::WorkflowName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GithubActionsConfig::JobName).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-github_actions_config-config")
                            .from(GithubActionsConfig::Table, GithubActionsConfig::Config)
                            .to(ProjectConfig::Table, ProjectConfig::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GithubActionsConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GithubActionsConfig {
    Table,
    Config,
    WorkflowFile,
    WorkflowName,
    JobName,
}

#[derive(DeriveIden)]
enum ProjectConfig {
    Table,
    Id,
}
