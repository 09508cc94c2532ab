/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */


use async_trait::async_trait;
use beanaries_core::types::{Cli, ServerState};
use clap::Parser;
use entity::project_config::DataSource;
use scraper::error::{ScrapeError, ScrapeResult};
use scraper::memory::MemoryRepository;
use scraper::registry::{ConnectorRegistry, ScraperSettings};
use scraper::scheduler::SchedulerSettings;
use scraper::transport::{HttpRequest, HttpResponse, Transport};
use scraper::{compose, init_scraper};
use sea_orm::{DatabaseBackend, MockDatabase};
use std::sync::Arc;

struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn send(&self, request: HttpRequest) -> ScrapeResult<HttpResponse> {
        Err(ScrapeError::fetch(request.url, "offline"))
    }
}

#[test]
fn test_registry_covers_every_remote_source() {
    let registry = ConnectorRegistry::from_settings(&ScraperSettings::default(), Arc::new(OfflineTransport));

    for source in [
        DataSource::GithubActions,
        DataSource::Luci,
        DataSource::Buildkite,
        DataSource::Koji,
        DataSource::Obs,
        DataSource::GitlabCi,
        DataSource::LocalBuild,
    ] {
        assert!(registry.contains(source), "missing connector for {}", source);
    }
    assert!(!registry.contains(DataSource::Manual));
    assert_eq!(registry.data_sources().len(), 7);
}

#[tokio::test]
async fn test_composed_scheduler_runs_empty_pass() {
    let repository = MemoryRepository::new();
    let handle = compose(
        ScraperSettings::default(),
        SchedulerSettings::default(),
        Arc::new(repository),
        Arc::new(OfflineTransport),
    );

    let summary = handle.scheduler.run_pass().await;
    assert_eq!(summary.attempted, 0);
    assert!(summary.errors.is_empty());

    let status = handle.scheduler.status();
    assert!(!status.running);
    assert_eq!(status.interval_seconds, 7200);
    assert_eq!(status.last_pass, Some(summary));
}

#[test]
fn test_init_scraper_from_state() {
    let cli = Cli::parse_from([
        "beanaries-server",
        "--database-url",
        "mock://test",
        "--max-concurrent-syncs",
        "3",
        "--scheduler-interval",
        "600",
    ]);
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let state = Arc::new(ServerState { db, cli });

    let handle = init_scraper(state).unwrap();
    assert_eq!(handle.scheduler.settings().max_concurrent, 3);
    assert_eq!(handle.scheduler.settings().interval.as_secs(), 600);
    assert!(handle.registry.contains(DataSource::Obs));
    assert_eq!(handle.settings.git, "git");
}

fn mock_state(db: sea_orm::DatabaseConnection) -> Arc<ServerState> {
    let cli = Cli::parse_from(["beanaries-server", "--database-url", "mock://test"]);
    Arc::new(ServerState { db, cli })
}

fn project(full_name: &str) -> beanaries_core::types::MProject {
    let created = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let (owner, name) = full_name.split_once('/').unwrap();

    entity::project::Model {
        id: uuid::Uuid::new_v4(),
        owner: owner.to_string(),
        name: name.to_string(),
        full_name: full_name.to_string(),
        url: format!("https://github.com/{}", full_name),
        subproject_path: None,
        description: String::new(),
        stars: 0,
        language: Some("C++".to_string()),
        category: None,
        is_active: true,
        created_at: created,
        updated_at: created,
    }
}

#[tokio::test]
async fn test_sea_orm_repository_projects_and_stars() {
    use scraper::repository::{BuildRepository, SeaOrmRepository};
    use sea_orm::MockExecResult;

    let llvm = project("llvm/llvm-project");
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![llvm.clone(), project("rust-lang/rust")]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();
    let repository = SeaOrmRepository::new(mock_state(db));

    let projects = repository.projects().await.unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].full_name, "llvm/llvm-project");

    repository.update_project_stars(llvm.id, 31000).await.unwrap();
}

#[tokio::test]
async fn test_sea_orm_repository_skips_empty_message_batch() {
    use scraper::repository::{BuildRepository, SeaOrmRepository};

    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let repository = SeaOrmRepository::new(mock_state(db));

    assert_eq!(repository.fill_commit_messages(Vec::new()).await.unwrap(), 0);
}
