/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for types and data structures

use beanaries_core::types::*;
use clap::Parser;
use entity::project_config::DataSource;
use sea_orm::{DatabaseBackend, MockDatabase};

#[test]
fn test_cli_defaults() {
    let cli = Cli::parse_from(["beanaries-server"]);

    assert!(cli.command.is_none());
    assert_eq!(cli.port, 8001);
    assert_eq!(cli.scheduler_interval, 7200);
    assert_eq!(cli.max_concurrent_syncs, 5);
    assert_eq!(cli.max_builds, 100);
    assert_eq!(cli.binpath_git, "git");
    assert!(!cli.report_errors);
}

#[test]
fn test_cli_rejects_zero_concurrency() {
    let result = Cli::try_parse_from(["beanaries-server", "--max-concurrent-syncs", "0"]);
    assert!(result.is_err());
}

#[test]
fn test_scrape_subcommand() {
    let cli = Cli::parse_from([
        "beanaries-server",
        "scrape",
        "llvm/llvm-project",
        "--source",
        "luci",
        "--max-builds",
        "50",
        "--no-only-new",
    ]);

    match cli.command {
        Some(Command::Scrape(args)) => {
            assert_eq!(args.projects, vec!["llvm/llvm-project".to_string()]);
            assert_eq!(args.source, Some(DataSource::Luci));
            assert_eq!(args.max_builds, Some(50));
            assert!(!args.only_new());
            assert!(!args.all);
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn test_scrape_only_new_default_and_override() {
    let cli = Cli::parse_from(["beanaries-server", "scrape", "--all"]);
    let Some(Command::Scrape(args)) = cli.command else {
        panic!("expected scrape command");
    };
    assert!(args.only_new());

    let cli = Cli::parse_from(["beanaries-server", "scrape", "--no-only-new", "--only-new"]);
    let Some(Command::Scrape(args)) = cli.command else {
        panic!("expected scrape command");
    };
    assert!(args.only_new());
}

#[test]
fn test_server_state_creation() {
    let cli = Cli::parse_from(["beanaries-server", "--database-url", "mock://test"]);
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    let state = ServerState { db, cli };
    assert_eq!(state.cli.database_url.as_deref(), Some("mock://test"));
}

#[test]
fn test_base_response_serialization() {
    let response = BaseResponse {
        error: false,
        message: "triggered".to_string(),
    };

    let json = serde_json::to_string(&response).unwrap();
    assert_eq!(json, r#"{"error":false,"message":"triggered"}"#);
}
