/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Shared setup for connector tests.

use chrono::NaiveDate;
use beanaries_core::types::MProject;
use entity::project_config::Platform;
use uuid::Uuid;

use crate::engine::SyncOptions;
use crate::source::{SourceConfiguration, SourceLocator};
use crate::transport::{HttpRequest, HttpResponse, MockTransport};

pub fn config(locator: SourceLocator) -> SourceConfiguration {
    let created = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    SourceConfiguration {
        id: Uuid::new_v4(),
        project: MProject {
            id: Uuid::new_v4(),
            owner: "example".to_string(),
            name: "project".to_string(),
            full_name: "example/project".to_string(),
            url: "https://github.com/example/project".to_string(),
            subproject_path: None,
            description: String::new(),
            stars: 0,
            language: None,
            category: None,
            is_active: true,
            created_at: created,
            updated_at: created,
        },
        data_source: locator.data_source(),
        platform: Platform::UbuntuLatest,
        branch: "main".to_string(),
        is_enabled: true,
        check_interval_hours: 24,
        last_checked_at: None,
        locator,
    }
}

pub fn options() -> SyncOptions {
    SyncOptions {
        limit: None,
        only_new: true,
        checked_at: NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
    }
}

/// Answers each request with the body `route` picks for it, or a 404 when it picks none.
pub fn transport<F>(route: F) -> MockTransport
where
    F: Fn(&HttpRequest) -> Option<String> + Send + 'static,
{
    let mut transport = MockTransport::new();
    transport.expect_send().returning(move |request| {
        let response = match route(&request) {
            Some(body) => HttpResponse::ok(&request.url, body),
            None => HttpResponse::with_status(&request.url, 404, "not found"),
        };
        Ok(response)
    });
    transport
}
