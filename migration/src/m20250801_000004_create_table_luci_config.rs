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
                    .table(LuciConfig::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(LuciConfig::Config).uuid().not_null().primary_key())
                    .col(ColumnDef::new(LuciConfig::ProjectName).string().not_null())
                    .col(ColumnDef::new(LuciConfig::Bucket).string().not_null())
                    .col(ColumnDef::new(LuciConfig::Builder).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-luci_config-config")
                            .from(LuciConfig::Table, LuciConfig::Config)
                            .to(ProjectConfig::Table, ProjectConfig::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LuciConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LuciConfig {
    Table,
    Config,
    ProjectName,
    Bucket,
    Builder,
}

#[derive(DeriveIden)]
enum ProjectConfig {
    Table,
    Id,
}
