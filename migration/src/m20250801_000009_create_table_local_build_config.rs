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
                    .table(LocalBuildConfig::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LocalBuildConfig::Config).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(LocalBuildConfig::BuildCommand)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LocalBuildConfig::BuildDir).string())
                    .col(ColumnDef::new(LocalBuildConfig::SourceUrl).string())
                    .col(ColumnDef::new(LocalBuildConfig::ExtractCommand).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-local_build_config-config")
                            .from(LocalBuildConfig::Table, LocalBuildConfig::Config)
                            .to(ProjectConfig::Table, ProjectConfig::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LocalBuildConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LocalBuildConfig {
    Table,
    Config,
    BuildCommand,
    BuildDir,
    SourceUrl,
    ExtractCommand,
}

#[derive(DeriveIden)]
enum ProjectConfig {
    Table,
    Id,
}
