/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use beanaries_core::types::Cli;
use entity::project_config::DataSource;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::batch::{ConfigReport, PassSummary, split_entries, sync_one};
use super::engine::SyncOptions;
use super::registry::ConnectorRegistry;
use super::repository::{BuildRepository, ConfigFilter};
use super::source::SourceConfiguration;

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// Settable clock for due-time calculations in tests.
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *lock(&self.now)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Best-effort work after a pass. Failures are logged by the implementation and never
/// change the pass result.
#[async_trait]
pub trait Enrichment: Send + Sync {
    async fn after_pass(&self, reports: &[ConfigReport]);
}

pub struct NoEnrichment;

#[async_trait]
impl Enrichment for NoEnrichment {
    async fn after_pass(&self, _reports: &[ConfigReport]) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub max_concurrent: usize,
    pub sync_timeout: Duration,
    pub max_builds: Option<usize>,
    pub only_new: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(7200),
            max_concurrent: 5,
            sync_timeout: Duration::from_secs(15 * 60),
            max_builds: Some(100),
            only_new: true,
        }
    }
}

impl SchedulerSettings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            interval: Duration::from_secs(cli.scheduler_interval),
            max_concurrent: cli.max_concurrent_syncs.max(1),
            sync_timeout: Duration::from_secs(cli.sync_timeout),
            max_builds: Some(cli.max_builds),
            only_new: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Started,
    /// A pass is already running or queued; this trigger is folded into it.
    Coalesced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub pass_in_progress: bool,
    pub interval_seconds: u64,
    pub next_run_at: Option<NaiveDateTime>,
    pub last_pass: Option<PassSummary>,
}

#[derive(Default)]
struct Lifecycle {
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
    next_run_at: Option<NaiveDateTime>,
    last_pass: Option<PassSummary>,
}

struct Inner {
    registry: ConnectorRegistry,
    repository: Arc<dyn BuildRepository>,
    clock: Arc<dyn Clock>,
    enrichment: Arc<dyn Enrichment>,
    settings: SchedulerSettings,
    pass_lock: tokio::sync::Mutex<()>,
    pass_in_progress: AtomicBool,
    trigger_pending: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

/// Periodically syncs every due configuration with bounded concurrency.
#[derive(Clone)]
pub struct ConfigScheduler {
    inner: Arc<Inner>,
}

impl ConfigScheduler {
    pub fn new(
        registry: ConnectorRegistry,
        repository: Arc<dyn BuildRepository>,
        clock: Arc<dyn Clock>,
        enrichment: Arc<dyn Enrichment>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                repository,
                clock,
                enrichment,
                settings,
                pass_lock: tokio::sync::Mutex::new(()),
                pass_in_progress: AtomicBool::new(false),
                trigger_pending: AtomicBool::new(false),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.inner.settings
    }

    /// Starts the periodic loop; the first pass runs immediately. Returns false if already running.
    pub fn start(&self) -> bool {
        let mut lifecycle = lock(&self.inner.lifecycle);
        if lifecycle.cancel.is_some() {
            return false;
        }

        let token = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let loop_token = token.clone();
        lifecycle.handle = Some(tokio::spawn(async move {
            schedule_loop(inner, loop_token).await;
        }));
        lifecycle.cancel = Some(token);

        info!(
            interval = self.inner.settings.interval.as_secs(),
            max_concurrent = self.inner.settings.max_concurrent,
            "Scheduler started"
        );
        true
    }

    /// Stops the loop after the pass in flight, if any, has finished.
    pub async fn stop(&self) {
        let (token, handle) = {
            let mut lifecycle = lock(&self.inner.lifecycle);
            lifecycle.next_run_at = None;
            (lifecycle.cancel.take(), lifecycle.handle.take())
        };

        if let Some(token) = token {
            token.cancel();
        }
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler loop ended abnormally");
            }
            info!("Scheduler stopped");
        }
    }

    /// Requests a pass without waiting for it.
    pub fn trigger_now(&self) -> TriggerOutcome {
        if self.inner.pass_in_progress.load(Ordering::SeqCst)
            || self
                .inner
                .trigger_pending
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            debug!("Pass already running, trigger coalesced");
            return TriggerOutcome::Coalesced;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_pass().await;
            inner.trigger_pending.store(false, Ordering::SeqCst);
        });

        TriggerOutcome::Started
    }

    pub async fn run_pass(&self) -> PassSummary {
        self.inner.run_pass().await
    }

    pub fn status(&self) -> SchedulerStatus {
        let lifecycle = lock(&self.inner.lifecycle);
        SchedulerStatus {
            running: lifecycle.cancel.is_some(),
            pass_in_progress: self.inner.pass_in_progress.load(Ordering::SeqCst),
            interval_seconds: self.inner.settings.interval.as_secs(),
            next_run_at: lifecycle.next_run_at,
            last_pass: lifecycle.last_pass.clone(),
        }
    }
}

async fn schedule_loop(inner: Arc<Inner>, token: CancellationToken) {
    let mut interval = time::interval(inner.settings.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                if inner.try_run_pass().await.is_none() {
                    debug!("Pass already running, tick skipped");
                    continue;
                }

                let next = inner.clock.now()
                    + ChronoDuration::from_std(inner.settings.interval).unwrap_or_default();
                let mut lifecycle = lock(&inner.lifecycle);
                if lifecycle.cancel.is_some() {
                    lifecycle.next_run_at = Some(next);
                }
            }
        }
    }
}

impl Inner {
    async fn run_pass(&self) -> PassSummary {
        let _pass = self.pass_lock.lock().await;
        self.pass_locked().await
    }

    /// Runs a pass unless one is already running or queued by a trigger.
    async fn try_run_pass(&self) -> Option<PassSummary> {
        if self.pass_in_progress.load(Ordering::SeqCst)
            || self.trigger_pending.load(Ordering::SeqCst)
        {
            return None;
        }

        let _pass = self.pass_lock.try_lock().ok()?;
        Some(self.pass_locked().await)
    }

    #[instrument(skip_all)]
    async fn pass_locked(&self) -> PassSummary {
        self.pass_in_progress.store(true, Ordering::SeqCst);

        let now = self.clock.now();
        let mut summary = PassSummary {
            started_at: Some(now),
            ..Default::default()
        };

        let reports = match self.repository.load_configs(&ConfigFilter::enabled()).await {
            Ok(entries) => {
                let configs = split_entries(entries, &mut summary);
                let due: Vec<_> = configs
                    .into_iter()
                    .filter(|config| config.is_due(now))
                    .filter(|config| self.registry.contains(config.data_source))
                    .collect();

                info!(due = due.len(), "Starting sync pass");
                self.sync_due(due, now).await
            }
            Err(e) => {
                error!(error = %e, "Cannot load configurations");
                Vec::new()
            }
        };

        for report in &reports {
            summary.record(report);
        }

        self.enrichment.after_pass(&reports).await;

        summary.finished_at = Some(self.clock.now());
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            builds_added = summary.builds_added,
            "Sync pass finished"
        );

        lock(&self.lifecycle).last_pass = Some(summary.clone());
        self.pass_in_progress.store(false, Ordering::SeqCst);
        summary
    }

    async fn sync_due(
        &self,
        configs: Vec<SourceConfiguration>,
        now: NaiveDateTime,
    ) -> Vec<ConfigReport> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));
        let rate_limited: Arc<Mutex<HashSet<DataSource>>> = Arc::new(Mutex::new(HashSet::new()));
        let options = SyncOptions {
            limit: self.settings.max_builds,
            only_new: self.settings.only_new,
            checked_at: now,
        };

        let mut tasks = JoinSet::new();
        for config in configs {
            let Some(scraper) = self.registry.get(config.data_source) else {
                continue;
            };

            let semaphore = Arc::clone(&semaphore);
            let rate_limited = Arc::clone(&rate_limited);
            let repository = Arc::clone(&self.repository);
            let options = options.clone();
            let deadline = self.settings.sync_timeout;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return ConfigReport::skipped(config);
                };

                if lock(&rate_limited).contains(&config.data_source) {
                    debug!(config = %config.label(), "Source rate limited, skipping");
                    return ConfigReport::skipped(config);
                }

                let report = sync_one(scraper, repository, config, options, deadline).await;
                if report.rate_limited {
                    lock(&rate_limited).insert(report.config.data_source);
                }
                report
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "Sync task panicked"),
            }
        }

        reports
    }
}
