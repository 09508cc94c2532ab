/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use chrono::Utc;
use entity::project_config::{DataSource, Platform};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::engine::{Cursor, Page, SourceConnector, SyncTarget};
use crate::error::{ScrapeError, ScrapeResult};
use crate::git::{CommandOutput, run_command};
use crate::infer::host_platform;
use crate::record::{BuildRecord, NaturalKey};
use crate::source::{LocalBuildLocator, SourceLocator};

const GIT_TIMEOUT_SECS: u64 = 5 * 60;
const DOWNLOAD_TIMEOUT_SECS: u64 = 30 * 60;
const BUILD_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// Checked out or extracted source tree ready to build.
#[derive(Debug, Clone)]
pub struct PreparedSource {
    pub path: PathBuf,
    pub commit_sha: String,
    pub commit_message: Option<String>,
    pub platform: Platform,
}

#[derive(Debug, Clone)]
pub struct BuildRun {
    pub source: PreparedSource,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub started_at: chrono::NaiveDateTime,
    pub finished_at: chrono::NaiveDateTime,
}

/// First 12 hex characters of the SHA-256 of the archive URL.
pub fn archive_version(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(digest)[..12].to_string()
}

/// `subproject_path` joined with `build_dir`, both optional.
pub fn build_directory(subproject_path: Option<&str>, build_dir: Option<&str>) -> Option<PathBuf> {
    let parts: Vec<&str> = [subproject_path.map(|p| p.trim_end_matches('/')), build_dir]
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect();

    (!parts.is_empty()).then(|| parts.iter().collect())
}

pub struct LocalBuildConnector {
    git: String,
    shell: String,
    workspace: PathBuf,
}

impl LocalBuildConnector {
    pub fn new(git: impl Into<String>, shell: impl Into<String>, workspace_root: Option<PathBuf>) -> Self {
        let root = workspace_root.unwrap_or_else(std::env::temp_dir);
        Self {
            git: git.into(),
            shell: shell.into(),
            workspace: root.join("beanaries-builds"),
        }
    }

    fn checkout_dir(&self, target: SyncTarget<'_, LocalBuildLocator>) -> PathBuf {
        let project = &target.config.project;
        self.workspace
            .join(format!("{}_{}", project.owner, project.name))
    }

    async fn git(&self, args: &[&str], cwd: Option<&Path>) -> ScrapeResult<CommandOutput> {
        let output = run_command(&self.git, args, cwd, None, GIT_TIMEOUT_SECS).await?;
        if !output.success {
            return Err(ScrapeError::Command {
                command: format!("git {}", args.join(" ")),
                message: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    async fn checkout(&self, target: SyncTarget<'_, LocalBuildLocator>) -> ScrapeResult<PreparedSource> {
        let path = self.checkout_dir(target);
        let branch = target.config.branch.as_str();

        if path.join(".git").exists() {
            self.git(&["fetch", "origin"], Some(&path)).await?;
            self.git(&["checkout", branch], Some(&path)).await?;
            self.git(&["pull"], Some(&path)).await?;
        } else {
            create_dir(&self.workspace).await?;
            let destination = path.to_string_lossy().to_string();
            info!(url = %target.locator.repository_url, path = %destination, "Cloning repository");
            self.git(
                &[
                    "clone",
                    "--branch",
                    branch,
                    "--single-branch",
                    &target.locator.repository_url,
                    &destination,
                ],
                None,
            )
            .await?;
        }

        let sha = self.git(&["rev-parse", "HEAD"], Some(&path)).await?;
        let message = self.git(&["log", "-1", "--pretty=%B"], Some(&path)).await?;

        Ok(PreparedSource {
            path,
            commit_sha: sha.stdout.trim().to_string(),
            commit_message: Some(message.stdout.trim().to_string()),
            platform: detect_platform().await,
        })
    }

    async fn download(
        &self,
        target: SyncTarget<'_, LocalBuildLocator>,
        url: &str,
        extract_command: &str,
    ) -> ScrapeResult<PreparedSource> {
        let version = archive_version(url);
        let path = self.checkout_dir(target).join(&version);
        create_dir(&path).await?;

        let filename = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|f| !f.is_empty())
            .unwrap_or("source.tar")
            .to_string();

        if !path.join(&filename).exists() {
            info!(url = %url, "Downloading source archive");
            let output = run_command(
                "curl",
                &["-fsSL", "-o", &filename, url],
                Some(&path),
                None,
                DOWNLOAD_TIMEOUT_SECS,
            )
            .await?;
            if !output.success {
                return Err(ScrapeError::fetch(url, output.stderr.trim()));
            }
        }

        let script = format!("{} {}", extract_command, filename);
        let output = run_command(&self.shell, &["-c", &script], Some(&path), None, GIT_TIMEOUT_SECS).await?;
        if !output.success {
            return Err(ScrapeError::Command {
                command: script,
                message: output.stderr.trim().to_string(),
            });
        }

        Ok(PreparedSource {
            path,
            commit_sha: version,
            commit_message: Some(format!("Source from {}", url)),
            platform: detect_platform().await,
        })
    }

    async fn build(
        &self,
        target: SyncTarget<'_, LocalBuildLocator>,
        source: PreparedSource,
    ) -> ScrapeResult<BuildRun> {
        let locator = target.locator;
        let work_dir = match build_directory(locator.subproject_path.as_deref(), locator.build_dir.as_deref()) {
            Some(dir) => source.path.join(dir),
            None => source.path.clone(),
        };

        let stale = work_dir.join("build");
        if stale.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&stale).await {
                warn!(path = %stale.display(), error = %e, "Cannot clean previous build");
            }
        }

        info!(commit = %source.commit_sha, dir = %work_dir.display(), "Running local build");
        let started_at = Utc::now().naive_utc();
        let output = run_command(
            &self.shell,
            &["-c", &locator.build_command],
            Some(&work_dir),
            None,
            BUILD_TIMEOUT_SECS,
        )
        .await?;
        let finished_at = Utc::now().naive_utc();

        if !output.success {
            warn!(code = ?output.code, "Local build failed");
        }

        Ok(BuildRun {
            source,
            success: output.success,
            exit_code: output.code,
            started_at,
            finished_at,
        })
    }
}

async fn create_dir(path: &Path) -> ScrapeResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ScrapeError::Command {
            command: format!("mkdir {}", path.display()),
            message: e.to_string(),
        })
}

async fn detect_platform() -> Platform {
    let os_release = tokio::fs::read_to_string("/etc/os-release").await.ok();
    let macos_version = if std::env::consts::OS == "macos" {
        run_command("sw_vers", &["-productVersion"], None, None, 10)
            .await
            .ok()
            .map(|o| o.stdout)
    } else {
        None
    };

    host_platform(os_release.as_deref(), macos_version.as_deref())
}

#[async_trait]
impl SourceConnector for LocalBuildConnector {
    type Locator = LocalBuildLocator;
    type Item = PreparedSource;
    type Unit = BuildRun;

    fn data_source(&self) -> DataSource {
        DataSource::LocalBuild
    }

    fn locator<'a>(&self, locator: &'a SourceLocator) -> Option<&'a Self::Locator> {
        match locator {
            SourceLocator::LocalBuild(l) => Some(l),
            _ => None,
        }
    }

    async fn fetch_page(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        _cursor: Option<&Cursor>,
        _page_size: u32,
    ) -> ScrapeResult<Page<Self::Item>> {
        let locator = target.locator;
        let source = match (&locator.source_url, &locator.extract_command) {
            (Some(url), Some(extract)) => self.download(target, url, extract).await?,
            _ => self.checkout(target).await?,
        };

        Ok(Page::last(vec![source]))
    }

    fn stream_id(&self, item: &Self::Item) -> String {
        item.commit_sha.clone()
    }

    fn item_key(&self, _target: SyncTarget<'_, Self::Locator>, item: &Self::Item) -> Option<NaturalKey> {
        Some(NaturalKey::commit(&item.commit_sha, item.platform))
    }

    async fn expand(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        items: Vec<Self::Item>,
    ) -> ScrapeResult<Vec<Self::Unit>> {
        let mut runs = Vec::with_capacity(items.len());
        for source in items {
            runs.push(self.build(target, source).await?);
        }
        Ok(runs)
    }

    fn map_to_canonical(
        &self,
        target: SyncTarget<'_, Self::Locator>,
        unit: Self::Unit,
    ) -> ScrapeResult<BuildRecord> {
        let BuildRun {
            source,
            success,
            exit_code,
            started_at,
            finished_at,
        } = unit;

        if source.commit_sha.is_empty() {
            return Err(ScrapeError::mapping("local build has no commit"));
        }

        Ok(BuildRecord::new(
            target.config,
            NaturalKey::commit(&source.commit_sha, source.platform),
            source.commit_sha.clone(),
            success,
        )
        .with_message(source.commit_message.as_deref())
        .with_platform(source.platform)
        .with_timing(Some(started_at), Some(finished_at))
        .with_runner(Some("local".to_string()))
        .with_metadata(json!({
            "exit_code": exit_code,
            "build_command": target.locator.build_command,
            "source_url": target.locator.source_url,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_version() {
        let version = archive_version("https://ftp.gnu.org/gnu/gcc/gcc-14.1.0/gcc-14.1.0.tar.xz");
        assert_eq!(version.len(), 12);
        assert!(version.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(version, archive_version("https://ftp.gnu.org/gnu/gcc/gcc-14.1.0/gcc-14.1.0.tar.xz"));
        assert_ne!(version, archive_version("https://ftp.gnu.org/gnu/gcc/gcc-14.2.0/gcc-14.2.0.tar.xz"));
    }

    #[test]
    fn test_build_directory() {
        assert_eq!(build_directory(None, None), None);
        assert_eq!(build_directory(Some("llvm/"), Some("build")), Some(PathBuf::from("llvm/build")));
        assert_eq!(build_directory(None, Some("out")), Some(PathBuf::from("out")));
        assert_eq!(build_directory(Some("clang"), None), Some(PathBuf::from("clang")));
    }
}
