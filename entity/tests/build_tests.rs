/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for build entity

use chrono::NaiveDate;
use entity::*;
use sea_orm::{DatabaseBackend, MockDatabase, entity::prelude::*};
use uuid::Uuid;

fn sample_build(id: Uuid, project: Uuid) -> build::Model {
    let naive_date = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    build::Model {
        id,
        project,
        commit_sha: "a".repeat(40),
        commit_message: Some("Fix flaky test".to_owned()),
        branch: "main".to_owned(),
        success: true,
        duration_seconds: Some(630),
        platform: build::Platform::Ubuntu2204,
        runner: Some("ubuntu-22.04".to_owned()),
        data_source: build::DataSource::GithubActions,
        workflow_name: Some("CI".to_owned()),
        workflow_run_id: Some("42".to_owned()),
        job_id: Some("7".to_owned()),
        natural_key: "ext:42/7".to_owned(),
        scraper_metadata: Some(serde_json::json!({ "run_id": 42, "job_id": 7 })),
        build_url: Some("https://github.com/o/r/actions/runs/42".to_owned()),
        started_at: Some(naive_date),
        finished_at: Some(naive_date + chrono::Duration::seconds(630)),
        created_at: naive_date,
    }
}

#[tokio::test]
async fn test_build_entity_find_by_id() -> Result<(), DbErr> {
    let build_id = Uuid::new_v4();
    let project_id = Uuid::new_v4();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![sample_build(build_id, project_id)]])
        .into_connection();

    let result = build::Entity::find_by_id(build_id).one(&db).await?;

    assert!(result.is_some());
    let build = result.unwrap();
    assert_eq!(build.project, project_id);
    assert_eq!(build.platform, build::Platform::Ubuntu2204);
    assert_eq!(build.data_source, build::DataSource::GithubActions);
    assert_eq!(build.natural_key, "ext:42/7");
    assert_eq!(build.duration_seconds, Some(630));

    Ok(())
}

#[tokio::test]
async fn test_build_entity_filter_by_natural_key() -> Result<(), DbErr> {
    let project_id = Uuid::new_v4();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![
            sample_build(Uuid::new_v4(), project_id),
            sample_build(Uuid::new_v4(), project_id),
        ]])
        .into_connection();

    let builds = build::Entity::find()
        .filter(build::Column::Project.eq(project_id))
        .filter(build::Column::DataSource.eq(build::DataSource::GithubActions))
        .all(&db)
        .await?;

    assert_eq!(builds.len(), 2);
    assert!(builds.iter().all(|b| b.project == project_id));

    Ok(())
}
