/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod build;
pub mod buildkite_config;
pub mod github_actions_config;
pub mod gitlab_ci_config;
pub mod koji_config;
pub mod local_build_config;
pub mod luci_config;
pub mod obs_config;
pub mod project;
pub mod project_config;
