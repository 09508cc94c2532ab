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
                    .table(KojiConfig::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(KojiConfig::Config).uuid().not_null().primary_key())
                    .col(ColumnDef::new(KojiConfig::PackageName).string().not_null())
                    .col(ColumnDef::new(KojiConfig::Tag).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-koji_config-config")
                            .from(KojiConfig::Table, KojiConfig::Config)
                            .to(ProjectConfig::Table, ProjectConfig::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(KojiConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum KojiConfig {
    Table,
    Config,
    PackageName,
    Tag,
}

#[derive(DeriveIden)]
enum ProjectConfig {
    Table,
    Id,
}
