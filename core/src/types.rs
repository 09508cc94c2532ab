/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use super::input::{greater_than_zero, parse_data_source, port_in_range};
use clap::{Args, Parser, Subcommand};
use entity::project_config::DataSource;
use entity::*;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug, Clone)]
#[command(name = "Beanaries", display_name = "Beanaries", bin_name = "beanaries-server", author = "Wavelens", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
    #[arg(long, env = "BEANARIES_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
    #[arg(long, env = "BEANARIES_LOG_JSON", default_value = "false")]
    pub log_json: bool,
    #[arg(long, env = "BEANARIES_IP", default_value = "127.0.0.1")]
    pub ip: String,
    #[arg(long, env = "BEANARIES_PORT", value_parser = port_in_range, default_value_t = 8001)]
    pub port: u16,
    #[arg(long, env = "BEANARIES_DATABASE_URL")]
    pub database_url: Option<String>,
    #[arg(long, env = "BEANARIES_DATABASE_URL_FILE")]
    pub database_url_file: Option<String>,
    #[arg(long, env = "BEANARIES_GITHUB_TOKEN")]
    pub github_token: Option<String>,
    #[arg(long, env = "BEANARIES_GITHUB_TOKEN_FILE")]
    pub github_token_file: Option<String>,
    #[arg(long, env = "BEANARIES_BUILDKITE_TOKEN")]
    pub buildkite_token: Option<String>,
    #[arg(long, env = "BEANARIES_BUILDKITE_TOKEN_FILE")]
    pub buildkite_token_file: Option<String>,
    #[arg(long, env = "BEANARIES_GITLAB_TOKEN")]
    pub gitlab_token: Option<String>,
    #[arg(long, env = "BEANARIES_GITLAB_TOKEN_FILE")]
    pub gitlab_token_file: Option<String>,
    #[arg(long, env = "BEANARIES_OBS_API_URL", default_value = "https://api.opensuse.org")]
    pub obs_api_url: String,
    #[arg(long, env = "BEANARIES_OBS_USERNAME")]
    pub obs_username: Option<String>,
    #[arg(long, env = "BEANARIES_OBS_TOKEN")]
    pub obs_token: Option<String>,
    #[arg(long, env = "BEANARIES_OBS_TOKEN_FILE")]
    pub obs_token_file: Option<String>,
    #[arg(long, env = "BEANARIES_SCHEDULER_INTERVAL", value_parser = greater_than_zero::<u64>, default_value = "7200")]
    pub scheduler_interval: u64,
    #[arg(long, env = "BEANARIES_MAX_CONCURRENT_SYNCS", value_parser = greater_than_zero::<usize>, default_value = "5")]
    pub max_concurrent_syncs: usize,
    #[arg(long, env = "BEANARIES_SYNC_TIMEOUT", value_parser = greater_than_zero::<u64>, default_value = "900")]
    pub sync_timeout: u64,
    #[arg(long, env = "BEANARIES_MAX_BUILDS", value_parser = greater_than_zero::<usize>, default_value = "100")]
    pub max_builds: usize,
    #[arg(long, env = "BEANARIES_MIRROR_ROOT", default_value = "repos")]
    pub mirror_root: String,
    #[arg(long, env = "BEANARIES_LUCI_VALIDATE_COMMITS", default_value = "false")]
    pub luci_validate_commits: bool,
    #[arg(long, env = "BEANARIES_WORKSPACE_DIR")]
    pub workspace_dir: Option<String>,
    #[arg(long, env = "BEANARIES_BINPATH_GIT", default_value = "git")]
    pub binpath_git: String,
    #[arg(long, env = "BEANARIES_BINPATH_SH", default_value = "sh")]
    pub binpath_sh: String,
    #[arg(long, env = "BEANARIES_REPORT_ERRORS", default_value = "false")]
    pub report_errors: bool,
    #[arg(long, env = "BEANARIES_SENTRY_DSN")]
    pub sentry_dsn: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the scheduler and the HTTP API (default)
    Serve,
    /// Scrape build data once and exit
    Scrape(ScrapeArgs),
    /// Refresh GitHub star counts for all projects
    UpdateStars,
    /// Fill missing commit messages from local mirrors
    BackfillCommits,
}

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Project full names (owner/name) to scrape
    pub projects: Vec<String>,
    #[arg(long)]
    pub all: bool,
    #[arg(long, value_parser = parse_data_source)]
    pub source: Option<DataSource>,
    #[arg(long, value_parser = greater_than_zero::<usize>)]
    pub max_builds: Option<usize>,
    #[arg(long, overrides_with = "no_only_new")]
    pub only_new: bool,
    #[arg(long, overrides_with = "only_new")]
    pub no_only_new: bool,
}

impl ScrapeArgs {
    pub fn only_new(&self) -> bool {
        !self.no_only_new
    }
}

#[derive(Debug)]
pub struct ServerState {
    pub db: DatabaseConnection,
    pub cli: Cli,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BaseResponse<T> {
    pub error: bool,
    pub message: T,
}

pub type EBuild = build::Entity;
pub type EBuildkiteConfig = buildkite_config::Entity;
pub type EGithubActionsConfig = github_actions_config::Entity;
pub type EGitlabCiConfig = gitlab_ci_config::Entity;
pub type EKojiConfig = koji_config::Entity;
pub type ELocalBuildConfig = local_build_config::Entity;
pub type ELuciConfig = luci_config::Entity;
pub type EObsConfig = obs_config::Entity;
pub type EProject = project::Entity;
pub type EProjectConfig = project_config::Entity;

pub type MBuild = build::Model;
pub type MBuildkiteConfig = buildkite_config::Model;
pub type MGithubActionsConfig = github_actions_config::Model;
pub type MGitlabCiConfig = gitlab_ci_config::Model;
pub type MKojiConfig = koji_config::Model;
pub type MLocalBuildConfig = local_build_config::Model;
pub type MLuciConfig = luci_config::Model;
pub type MObsConfig = obs_config::Model;
pub type MProject = project::Model;
pub type MProjectConfig = project_config::Model;

pub type ABuild = build::ActiveModel;
pub type AProject = project::ActiveModel;
pub type AProjectConfig = project_config::ActiveModel;

pub type CBuild = build::Column;
pub type CProject = project::Column;
pub type CProjectConfig = project_config::Column;
