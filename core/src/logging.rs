/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use super::types::Cli;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` takes precedence over `--log-level`.
pub fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", cli.log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if cli.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

pub fn init_error_reporting(cli: &Cli) -> Option<sentry::ClientInitGuard> {
    if !cli.report_errors {
        return None;
    }

    match &cli.sentry_dsn {
        Some(dsn) => Some(sentry::init(dsn.as_str())),
        None => {
            tracing::warn!("Error reporting enabled but no DSN configured");
            None
        }
    }
}
