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
                    .table(BuildkiteConfig::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BuildkiteConfig::Config).uuid().not_null().primary_key())
                    .col(ColumnDef::new(BuildkiteConfig::OrgSlug).string().not_null())
                    .col(
                        ColumnDef::new(BuildkiteConfig::PipelineSlug)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-buildkite_config-config")
                            .from(BuildkiteConfig::Table, BuildkiteConfig::Config)
                            .to(ProjectConfig::Table, ProjectConfig::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BuildkiteConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BuildkiteConfig {
    Table,
    Config,
    OrgSlug,
    PipelineSlug,
}

#[derive(DeriveIden)]
enum ProjectConfig {
    Table,
    Id,
}
