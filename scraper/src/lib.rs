/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod batch;
pub mod connectors;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod git;
pub mod infer;
pub mod memory;
pub mod record;
pub mod registry;
pub mod repository;
pub mod scheduler;
pub mod source;
pub mod transport;
pub mod xmlrpc;


use anyhow::{Context, Result};
use beanaries_core::types::ServerState;
use std::sync::Arc;

use enrichment::ProjectEnricher;
use registry::{ConnectorRegistry, ScraperSettings};
use repository::{BuildRepository, SeaOrmRepository};
use scheduler::{ConfigScheduler, SchedulerSettings, SystemClock};
use transport::{ReqwestTransport, Transport};

/// Everything wired up from the server state, shared by the CLI commands and the scheduler.
pub struct ScraperHandle {
    pub settings: ScraperSettings,
    pub registry: ConnectorRegistry,
    pub repository: Arc<dyn BuildRepository>,
    pub enricher: Arc<ProjectEnricher>,
    pub scheduler: ConfigScheduler,
}

pub fn init_scraper(state: Arc<ServerState>) -> Result<ScraperHandle> {
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::new().context("Failed to create HTTP transport")?);
    let settings = ScraperSettings::from_cli(&state.cli);
    let scheduler_settings = SchedulerSettings::from_cli(&state.cli);
    let repository: Arc<dyn BuildRepository> = Arc::new(SeaOrmRepository::new(state));

    Ok(compose(
        settings,
        scheduler_settings,
        repository,
        transport,
    ))
}

pub fn compose(
    settings: ScraperSettings,
    scheduler_settings: SchedulerSettings,
    repository: Arc<dyn BuildRepository>,
    transport: Arc<dyn Transport>,
) -> ScraperHandle {
    let registry = ConnectorRegistry::from_settings(&settings, Arc::clone(&transport));
    let enricher = Arc::new(ProjectEnricher::new(
        Arc::clone(&repository),
        transport,
        &settings,
    ));

    let scheduler = ConfigScheduler::new(
        registry.clone(),
        Arc::clone(&repository),
        Arc::new(SystemClock),
        Arc::clone(&enricher) as Arc<dyn scheduler::Enrichment>,
        scheduler_settings,
    );

    ScraperHandle {
        settings,
        registry,
        repository,
        enricher,
        scheduler,
    }
}

pub async fn start_scraper(state: Arc<ServerState>) -> Result<ConfigScheduler> {
    let handle = init_scraper(state)?;
    handle.scheduler.start();
    Ok(handle.scheduler)
}
