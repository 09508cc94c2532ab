/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod buildkite;
pub mod github;
pub mod gitlab;
pub mod koji;
pub mod local;
pub mod luci;
pub mod obs;

pub use buildkite::BuildkiteConnector;
pub use github::GithubActionsConnector;
pub use gitlab::GitlabConnector;
pub use koji::KojiConnector;
pub use local::LocalBuildConnector;
pub use luci::LuciConnector;
pub use obs::ObsConnector;

#[cfg(test)]
pub(crate) mod fixtures;
