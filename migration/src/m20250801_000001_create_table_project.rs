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
                    .table(Project::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Project::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Project::Owner).string().not_null())
                    .col(ColumnDef::new(Project::Name).string().not_null())
                    .col(
                        ColumnDef::new(Project::FullName)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Project::Url).string().not_null())
                    .col(ColumnDef::new(Project::SubprojectPath).string())
                    .col(ColumnDef::new(Project::Description).text().not_null())
                    .col(
                        ColumnDef::new(Project::Stars)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Project::Language).string())
                    .col(ColumnDef::new(Project::Category).string())
                    .col(
                        ColumnDef::new(Project::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Project::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(Project::UpdatedAt).date_time().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Project::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Project {
    Table,
    Id,
    Owner,
    Name,
    FullName,
    Url,
    SubprojectPath,
    Description,
    Stars,
    Language,
    Category,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
