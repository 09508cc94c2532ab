/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter, Deserialize, Serialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum Platform {
    #[sea_orm(string_value = "ubuntu-latest")]
    #[serde(rename = "ubuntu-latest")]
    UbuntuLatest,
    #[sea_orm(string_value = "ubuntu-22.04")]
    #[serde(rename = "ubuntu-22.04")]
    Ubuntu2204,
    #[sea_orm(string_value = "ubuntu-24.04")]
    #[serde(rename = "ubuntu-24.04")]
    Ubuntu2404,
    #[sea_orm(string_value = "macos-latest")]
    #[serde(rename = "macos-latest")]
    MacosLatest,
    #[sea_orm(string_value = "macos-13")]
    #[serde(rename = "macos-13")]
    Macos13,
    #[sea_orm(string_value = "macos-14")]
    #[serde(rename = "macos-14")]
    Macos14,
    #[sea_orm(string_value = "windows-latest")]
    #[serde(rename = "windows-latest")]
    WindowsLatest,
    #[sea_orm(string_value = "windows-2022")]
    #[serde(rename = "windows-2022")]
    Windows2022,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::UbuntuLatest => "ubuntu-latest",
            Platform::Ubuntu2204 => "ubuntu-22.04",
            Platform::Ubuntu2404 => "ubuntu-24.04",
            Platform::MacosLatest => "macos-latest",
            Platform::Macos13 => "macos-13",
            Platform::Macos14 => "macos-14",
            Platform::WindowsLatest => "windows-latest",
            Platform::Windows2022 => "windows-2022",
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::UbuntuLatest
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ubuntu-latest" => Ok(Platform::UbuntuLatest),
            "ubuntu-22.04" => Ok(Platform::Ubuntu2204),
            "ubuntu-24.04" => Ok(Platform::Ubuntu2404),
            "macos-latest" => Ok(Platform::MacosLatest),
            "macos-13" => Ok(Platform::Macos13),
            "macos-14" => Ok(Platform::Macos14),
            "windows-latest" => Ok(Platform::WindowsLatest),
            "windows-2022" => Ok(Platform::Windows2022),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, DeriveActiveEnum, EnumIter, Deserialize, Serialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    #[sea_orm(string_value = "github_actions")]
    GithubActions,
    #[sea_orm(string_value = "luci")]
    Luci,
    #[sea_orm(string_value = "buildkite")]
    Buildkite,
    #[sea_orm(string_value = "koji")]
    Koji,
    #[sea_orm(string_value = "obs")]
    Obs,
    #[sea_orm(string_value = "gitlab_ci")]
    GitlabCi,
    #[sea_orm(string_value = "local_build")]
    LocalBuild,
    #[sea_orm(string_value = "manual")]
    Manual,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::GithubActions => "github_actions",
            DataSource::Luci => "luci",
            DataSource::Buildkite => "buildkite",
            DataSource::Koji => "koji",
            DataSource::Obs => "obs",
            DataSource::GitlabCi => "gitlab_ci",
            DataSource::LocalBuild => "local_build",
            DataSource::Manual => "manual",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github_actions" => Ok(DataSource::GithubActions),
            "luci" => Ok(DataSource::Luci),
            "buildkite" => Ok(DataSource::Buildkite),
            "koji" => Ok(DataSource::Koji),
            "obs" => Ok(DataSource::Obs),
            "gitlab_ci" => Ok(DataSource::GitlabCi),
            "local_build" => Ok(DataSource::LocalBuild),
            "manual" => Ok(DataSource::Manual),
            _ => Err(format!("Unknown data source: {}", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "project_config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub project: Uuid,
    pub data_source: DataSource,
    pub platform: Platform,
    pub branch: String,
    pub is_enabled: bool,
    pub check_interval_hours: i32,
    pub last_checked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::Project",
        to = "super::project::Column::Id"
    )]
    Project,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
