/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for project and configuration entities

use chrono::NaiveDate;
use entity::*;
use sea_orm::{DatabaseBackend, MockDatabase, entity::prelude::*};
use uuid::Uuid;

#[tokio::test]
async fn test_project_config_with_locator() -> Result<(), DbErr> {
    let project_id = Uuid::new_v4();
    let config_id = Uuid::new_v4();
    let naive_date = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![project_config::Model {
            id: config_id,
            project: project_id,
            data_source: project_config::DataSource::Luci,
            platform: project_config::Platform::UbuntuLatest,
            branch: "main".to_owned(),
            is_enabled: true,
            check_interval_hours: 24,
            last_checked_at: None,
            created_at: naive_date,
        }]])
        .append_query_results([vec![luci_config::Model {
            config: config_id,
            project_name: "chromium".to_owned(),
            bucket: "ci".to_owned(),
            builder: "Linux Builder".to_owned(),
        }]])
        .into_connection();

    let config = project_config::Entity::find_by_id(config_id)
        .one(&db)
        .await?
        .unwrap();
    assert_eq!(config.data_source, project_config::DataSource::Luci);
    assert!(config.last_checked_at.is_none());

    let locator = luci_config::Entity::find_by_id(config.id).one(&db).await?.unwrap();
    assert_eq!(locator.builder, "Linux Builder");

    Ok(())
}
