/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use beanaries_core::types::*;
use clap::Parser;
use scraper::memory::MemoryRepository;
use scraper::registry::ConnectorRegistry;
use scraper::scheduler::{ConfigScheduler, NoEnrichment, SchedulerSettings, SystemClock};
use sea_orm::{DatabaseBackend, MockDatabase};
use std::sync::Arc;
use web::WebState;

pub fn create_mock_cli() -> Cli {
    Cli::parse_from([
        "beanaries-server",
        "--ip",
        "127.0.0.1",
        "--port",
        "3000",
        "--database-url",
        "mock://test",
    ])
}

pub fn create_mock_state() -> Arc<ServerState> {
    let cli = create_mock_cli();
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

    Arc::new(ServerState { db, cli })
}

pub fn create_web_state() -> WebState {
    let scheduler = ConfigScheduler::new(
        ConnectorRegistry::new(),
        Arc::new(MemoryRepository::new()),
        Arc::new(SystemClock),
        Arc::new(NoEnrichment),
        SchedulerSettings::default(),
    );

    WebState {
        server: create_mock_state(),
        scheduler,
    }
}
