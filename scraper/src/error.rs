/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("request to {url} failed: {message}")]
    Fetch { url: String, message: String },
    #[error("rate limited by {service}")]
    RateLimited { service: String },
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },
    #[error("cannot map record: {0}")]
    Mapping(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },
    #[error("enrichment failed: {0}")]
    Enrichment(String),
}

impl ScrapeError {
    pub fn fetch(url: impl Into<String>, message: impl ToString) -> Self {
        ScrapeError::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn mapping(message: impl Into<String>) -> Self {
        ScrapeError::Mapping(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ScrapeError::Configuration(message.into())
    }

    /// Network, timeout and quota failures; retried on the next due cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScrapeError::Fetch { .. } | ScrapeError::RateLimited { .. } | ScrapeError::Timeout { .. }
        )
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ScrapeError::RateLimited { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Configuration(_) => "configuration",
            ScrapeError::Fetch { .. } => "fetch",
            ScrapeError::RateLimited { .. } => "rate_limited",
            ScrapeError::Timeout { .. } => "timeout",
            ScrapeError::Mapping(_) => "mapping",
            ScrapeError::Database(_) => "database",
            ScrapeError::Command { .. } => "command",
            ScrapeError::Enrichment(_) => "enrichment",
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
