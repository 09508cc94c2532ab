/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use chrono::{Duration, NaiveDateTime};
use beanaries_core::consts::{GITLAB_COM_HOST, GITLAB_DEFAULT_HOST};
use beanaries_core::types::*;
use entity::project_config::{DataSource, Platform};
use serde::Serialize;
use uuid::Uuid;

use super::error::{ScrapeError, ScrapeResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GithubActionsLocator {
    pub owner: String,
    pub repo: String,
    pub workflow_file: Option<String>,
    pub workflow_name: String,
    pub job_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LuciLocator {
    pub project: String,
    pub bucket: String,
    pub builder: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildkiteLocator {
    pub org: String,
    pub pipeline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KojiLocator {
    pub package: String,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObsLocator {
    pub project: String,
    pub package: String,
    pub repository: String,
    pub arch: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GitlabLocator {
    pub host: String,
    pub project_path: String,
    pub job_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalBuildLocator {
    pub repository_url: String,
    pub subproject_path: Option<String>,
    pub build_command: String,
    pub build_dir: Option<String>,
    pub source_url: Option<String>,
    pub extract_command: Option<String>,
}

/// Source-specific half of a configuration; the variant always matches the data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceLocator {
    GithubActions(GithubActionsLocator),
    Luci(LuciLocator),
    Buildkite(BuildkiteLocator),
    Koji(KojiLocator),
    Obs(ObsLocator),
    GitlabCi(GitlabLocator),
    LocalBuild(LocalBuildLocator),
    Manual,
}

impl SourceLocator {
    pub fn data_source(&self) -> DataSource {
        match self {
            SourceLocator::GithubActions(_) => DataSource::GithubActions,
            SourceLocator::Luci(_) => DataSource::Luci,
            SourceLocator::Buildkite(_) => DataSource::Buildkite,
            SourceLocator::Koji(_) => DataSource::Koji,
            SourceLocator::Obs(_) => DataSource::Obs,
            SourceLocator::GitlabCi(_) => DataSource::GitlabCi,
            SourceLocator::LocalBuild(_) => DataSource::LocalBuild,
            SourceLocator::Manual => DataSource::Manual,
        }
    }
}

/// Per-kind row loaded next to a `project_config` row.
#[derive(Debug, Clone)]
pub enum LocatorRow {
    GithubActions(MGithubActionsConfig),
    Luci(MLuciConfig),
    Buildkite(MBuildkiteConfig),
    Koji(MKojiConfig),
    Obs(MObsConfig),
    GitlabCi(MGitlabCiConfig),
    LocalBuild(MLocalBuildConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfiguration {
    pub id: Uuid,
    pub project: MProject,
    pub data_source: DataSource,
    pub platform: Platform,
    pub branch: String,
    pub is_enabled: bool,
    pub check_interval_hours: i32,
    pub last_checked_at: Option<NaiveDateTime>,
    pub locator: SourceLocator,
}

impl SourceConfiguration {
    pub fn from_rows(
        config: MProjectConfig,
        project: MProject,
        row: Option<LocatorRow>,
    ) -> ScrapeResult<Self> {
        let locator = build_locator(&config, &project, row)?;

        Ok(Self {
            id: config.id,
            project,
            data_source: config.data_source,
            platform: config.platform,
            branch: config.branch,
            is_enabled: config.is_enabled,
            check_interval_hours: config.check_interval_hours,
            last_checked_at: config.last_checked_at,
            locator,
        })
    }

    /// Due when never checked or when the check interval has fully elapsed.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        match self.last_checked_at {
            None => true,
            Some(last) => now - last >= Duration::hours(self.check_interval_hours.into()),
        }
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.project.full_name, self.data_source)
    }
}

fn required(value: &str, field: &str, config: Uuid) -> ScrapeResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ScrapeError::configuration(format!(
            "config {} is missing `{}`",
            config, field
        )));
    }
    Ok(value.to_string())
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn build_locator(
    config: &MProjectConfig,
    project: &MProject,
    row: Option<LocatorRow>,
) -> ScrapeResult<SourceLocator> {
    let id = config.id;

    let locator = match (config.data_source, row) {
        (DataSource::Manual, _) => SourceLocator::Manual,
        (DataSource::GithubActions, Some(LocatorRow::GithubActions(row))) => {
            SourceLocator::GithubActions(GithubActionsLocator {
                owner: required(&project.owner, "owner", id)?,
                repo: required(&project.name, "name", id)?,
                workflow_file: optional(&row.workflow_file),
                workflow_name: row.workflow_name.trim().to_string(),
                job_name: optional(&row.job_name),
            })
        }
        (DataSource::Luci, Some(LocatorRow::Luci(row))) => SourceLocator::Luci(LuciLocator {
            project: required(&row.project_name, "project_name", id)?,
            bucket: required(&row.bucket, "bucket", id)?,
            builder: required(&row.builder, "builder", id)?,
        }),
        (DataSource::Buildkite, Some(LocatorRow::Buildkite(row))) => {
            SourceLocator::Buildkite(BuildkiteLocator {
                org: required(&row.org_slug, "org_slug", id)?,
                pipeline: required(&row.pipeline_slug, "pipeline_slug", id)?,
            })
        }
        (DataSource::Koji, Some(LocatorRow::Koji(row))) => SourceLocator::Koji(KojiLocator {
            package: required(&row.package_name, "package_name", id)?,
            tag: optional(&row.tag),
        }),
        (DataSource::Obs, Some(LocatorRow::Obs(row))) => SourceLocator::Obs(ObsLocator {
            project: required(&row.project_name, "project_name", id)?,
            package: required(&row.package_name, "package_name", id)?,
            repository: optional(&Some(row.repository)).unwrap_or_else(|| "standard".to_string()),
            arch: optional(&Some(row.arch)).unwrap_or_else(|| "x86_64".to_string()),
        }),
        (DataSource::GitlabCi, Some(LocatorRow::GitlabCi(row))) => {
            let host = optional(&row.host).unwrap_or_else(|| {
                if project.url.starts_with(GITLAB_COM_HOST) {
                    GITLAB_COM_HOST.to_string()
                } else {
                    GITLAB_DEFAULT_HOST.to_string()
                }
            });

            SourceLocator::GitlabCi(GitlabLocator {
                host: host.trim_end_matches('/').to_string(),
                project_path: required(&row.project_path, "project_path", id)?,
                job_filter: optional(&row.job_filter),
            })
        }
        (DataSource::LocalBuild, Some(LocatorRow::LocalBuild(row))) => {
            SourceLocator::LocalBuild(LocalBuildLocator {
                repository_url: project.url.clone(),
                subproject_path: optional(&project.subproject_path),
                build_command: required(&row.build_command, "build_command", id)?,
                build_dir: optional(&row.build_dir),
                source_url: optional(&row.source_url),
                extract_command: optional(&row.extract_command),
            })
        }
        (source, Some(_)) => {
            return Err(ScrapeError::configuration(format!(
                "config {} has locator of the wrong kind for {}",
                id, source
            )));
        }
        (source, None) => {
            return Err(ScrapeError::configuration(format!(
                "config {} has no {} locator",
                id, source
            )));
        }
    };

    Ok(locator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn time(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn project() -> MProject {
        MProject {
            id: Uuid::new_v4(),
            owner: "llvm".to_string(),
            name: "llvm-project".to_string(),
            full_name: "llvm/llvm-project".to_string(),
            url: "https://github.com/llvm/llvm-project".to_string(),
            subproject_path: None,
            description: String::new(),
            stars: 0,
            language: None,
            category: None,
            is_active: true,
            created_at: time(0),
            updated_at: time(0),
        }
    }

    fn config(data_source: DataSource) -> MProjectConfig {
        MProjectConfig {
            id: Uuid::new_v4(),
            project: Uuid::new_v4(),
            data_source,
            platform: Platform::UbuntuLatest,
            branch: "main".to_string(),
            is_enabled: true,
            check_interval_hours: 24,
            last_checked_at: None,
            created_at: time(0),
        }
    }

    #[test]
    fn test_luci_locator_from_rows() {
        let config = config(DataSource::Luci);
        let row = LocatorRow::Luci(MLuciConfig {
            config: config.id,
            project_name: "chromium".to_string(),
            bucket: "ci".to_string(),
            builder: "Linux Builder".to_string(),
        });

        let source = SourceConfiguration::from_rows(config, project(), Some(row)).unwrap();
        assert_eq!(
            source.locator,
            SourceLocator::Luci(LuciLocator {
                project: "chromium".to_string(),
                bucket: "ci".to_string(),
                builder: "Linux Builder".to_string(),
            })
        );
        assert_eq!(source.locator.data_source(), DataSource::Luci);
    }

    #[test]
    fn test_missing_required_field_is_configuration_error() {
        let config = config(DataSource::Luci);
        let row = LocatorRow::Luci(MLuciConfig {
            config: config.id,
            project_name: "chromium".to_string(),
            bucket: "ci".to_string(),
            builder: "  ".to_string(),
        });

        let err = SourceConfiguration::from_rows(config, project(), Some(row)).unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(ref m) if m.contains("builder")));
    }

    #[test]
    fn test_missing_or_mismatched_row() {
        let err = SourceConfiguration::from_rows(config(DataSource::Koji), project(), None)
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(_)));

        let cfg = config(DataSource::Koji);
        let row = LocatorRow::Buildkite(MBuildkiteConfig {
            config: cfg.id,
            org_slug: "bazel".to_string(),
            pipeline_slug: "bazel".to_string(),
        });
        let err = SourceConfiguration::from_rows(cfg, project(), Some(row)).unwrap_err();
        assert!(matches!(err, ScrapeError::Configuration(_)));
    }

    #[test]
    fn test_gitlab_host_defaults() {
        let cfg = config(DataSource::GitlabCi);
        let row = LocatorRow::GitlabCi(MGitlabCiConfig {
            config: cfg.id,
            host: None,
            project_path: "mesa/mesa".to_string(),
            job_filter: None,
        });
        let source = SourceConfiguration::from_rows(cfg, project(), Some(row)).unwrap();
        let SourceLocator::GitlabCi(locator) = source.locator else {
            panic!("expected gitlab locator");
        };
        assert_eq!(locator.host, GITLAB_DEFAULT_HOST);

        let mut gitlab_project = project();
        gitlab_project.url = "https://gitlab.com/inkscape/inkscape".to_string();
        let cfg = config(DataSource::GitlabCi);
        let row = LocatorRow::GitlabCi(MGitlabCiConfig {
            config: cfg.id,
            host: None,
            project_path: "inkscape/inkscape".to_string(),
            job_filter: None,
        });
        let source = SourceConfiguration::from_rows(cfg, gitlab_project, Some(row)).unwrap();
        let SourceLocator::GitlabCi(locator) = source.locator else {
            panic!("expected gitlab locator");
        };
        assert_eq!(locator.host, GITLAB_COM_HOST);
    }

    #[test]
    fn test_due_calculation() {
        let now = time(12);
        let mut source =
            SourceConfiguration::from_rows(config(DataSource::Manual), project(), None).unwrap();

        assert!(source.is_due(now));

        source.last_checked_at = Some(now - Duration::hours(25));
        assert!(source.is_due(now));

        source.last_checked_at = Some(now - Duration::hours(1));
        assert!(!source.is_due(now));

        source.last_checked_at = Some(now - Duration::hours(24));
        assert!(source.is_due(now));
    }
}
