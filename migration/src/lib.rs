/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub use sea_orm_migration::prelude::*;

mod m20250801_000001_create_table_project;
mod m20250801_000002_create_table_project_config;
mod m20250801_000003_create_table_github_actions_config;
mod m20250801_000004_create_table_luci_config;
mod m20250801_000005_create_table_buildkite_config;
mod m20250801_000006_create_table_koji_config;
mod m20250801_000007_create_table_obs_config;
mod m20250801_000008_create_table_gitlab_ci_config;
mod m20250801_000009_create_table_local_build_config;
mod m20250801_000010_create_table_build;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250801_000001_create_table_project::Migration),
            Box::new(m20250801_000002_create_table_project_config::Migration),
            Box::new(m20250801_000003_create_table_github_actions_config::Migration),
            Box::new(m20250801_000004_create_table_luci_config::Migration),
            Box::new(m20250801_000005_create_table_buildkite_config::Migration),
            Box::new(m20250801_000006_create_table_koji_config::Migration),
            Box::new(m20250801_000007_create_table_obs_config::Migration),
            Box::new(m20250801_000008_create_table_gitlab_ci_config::Migration),
            Box::new(m20250801_000009_create_table_local_build_config::Migration),
            Box::new(m20250801_000010_create_table_build::Migration),
        ]
    }
}
