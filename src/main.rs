/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use beanaries_core::init_state;
use beanaries_core::logging::{init_error_reporting, init_logging};
use beanaries_core::types::{Cli, Command, ScrapeArgs};
use scraper::batch::sync_configs;
use scraper::engine::SyncOptions;
use scraper::repository::ConfigFilter;
use scraper::{ScraperHandle, init_scraper};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    let _sentry = init_error_reporting(&cli);

    let command = cli.command.clone().unwrap_or(Command::Serve);
    let state = init_state(cli).await?;
    let handle = init_scraper(Arc::clone(&state))?;

    match command {
        Command::Serve => {
            let scheduler = handle.scheduler.clone();
            scheduler.start();

            tokio::select! {
                result = web::serve_web(Arc::clone(&state), scheduler.clone()) => {
                    result.context("HTTP server failed")?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                }
            }

            scheduler.stop().await;
        }
        Command::Scrape(args) => scrape(&handle, &args, &state.cli).await?,
        Command::UpdateStars => {
            let summary = handle.enricher.update_all_stars().await?;
            info!(
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                rate_limited = summary.rate_limited,
                "Star refresh finished"
            );
        }
        Command::BackfillCommits => {
            let filled = handle.enricher.backfill_all().await?;
            info!(filled, "Commit message backfill finished");
        }
    }

    Ok(())
}

async fn scrape(handle: &ScraperHandle, args: &ScrapeArgs, cli: &Cli) -> Result<()> {
    if !args.all && args.projects.is_empty() {
        bail!("Specify project names (owner/name) or --all");
    }

    let filter = ConfigFilter {
        enabled_only: true,
        projects: if args.all { Vec::new() } else { args.projects.clone() },
        data_source: args.source,
    };
    let options = SyncOptions {
        limit: Some(args.max_builds.unwrap_or(cli.max_builds)),
        only_new: args.only_new(),
        checked_at: Utc::now().naive_utc(),
    };

    let summary = sync_configs(
        &handle.registry,
        Arc::clone(&handle.repository),
        &filter,
        options,
        Duration::from_secs(cli.sync_timeout),
    )
    .await?;

    for error in &summary.errors {
        warn!(project = %error.project, source = %error.data_source, kind = %error.kind, "{}", error.message);
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
