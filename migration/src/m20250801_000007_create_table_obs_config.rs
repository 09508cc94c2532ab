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
                    .table(ObsConfig::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ObsConfig::Config).uuid().not_null().primary_key())
                    .col(ColumnDef::new(ObsConfig::ProjectName).string().not_null())
                    .col(ColumnDef::new(ObsConfig::PackageName).string().not_null())
                    .col(
                        ColumnDef::new(ObsConfig::Repository)
                            .string()
                            .not_null()
                            .default("standard"),
                    )
                    .col(
                        ColumnDef::new(ObsConfig::Arch)
                            .string()
                            .not_null()
                            .default("x86_64"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-obs_config-config")
                            .from(ObsConfig::Table, ObsConfig::Config)
                            .to(ProjectConfig::Table, ProjectConfig::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ObsConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ObsConfig {
    Table,
    Config,
    ProjectName,
    PackageName,
    Repository,
    Arch,
}

#[derive(DeriveIden)]
enum ProjectConfig {
    Table,
    Id,
}
