/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use beanaries_core::consts::LUCI_REPO_PATHS;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::error::{ScrapeError, ScrapeResult};

const LOG_TIMEOUT_SECS: u64 = 30;
const CAT_FILE_TIMEOUT_SECS: u64 = 60;
const SUBJECT_SEPARATOR: &str = "|||";

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` to completion, feeding `stdin` when given. The child is killed when the
/// timeout elapses.
pub async fn run_command(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    stdin: Option<String>,
    timeout_secs: u64,
) -> ScrapeResult<CommandOutput> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);

    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let display = format!("{} {}", program, args.join(" "));
    let command_error = |message: String| ScrapeError::Command {
        command: display.clone(),
        message,
    };

    let mut child = command.spawn().map_err(|e| command_error(e.to_string()))?;

    if let Some(input) = stdin {
        if let Some(mut handle) = child.stdin.take() {
            handle
                .write_all(input.as_bytes())
                .await
                .map_err(|e| command_error(e.to_string()))?;
        }
    }

    let output = match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await
    {
        Ok(output) => output.map_err(|e| command_error(e.to_string()))?,
        Err(_) => {
            return Err(ScrapeError::Timeout {
                operation: display,
                seconds: timeout_secs,
            });
        }
    };

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Bare or working-tree clone on local disk used to look up commits.
#[derive(Debug, Clone)]
pub struct GitMirror {
    git: String,
    path: PathBuf,
}

impl GitMirror {
    pub fn new(git: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            git: git.into(),
            path: path.into(),
        }
    }

    /// Mirror of a known LUCI project, if one has been cloned below `mirror_root`.
    pub fn for_luci_project(git: &str, mirror_root: &Path, project: &str) -> Option<Self> {
        let relative = luci_repo_path(project)?;
        let path = mirror_root.join(relative);
        path.exists().then(|| Self::new(git, path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subject lines of the given commits. Unknown commits are absent from the result.
    pub async fn commit_subjects(&self, shas: &[String]) -> ScrapeResult<HashMap<String, String>> {
        if shas.is_empty() {
            return Ok(HashMap::new());
        }

        let format = format!("--format=%H{}%s", SUBJECT_SEPARATOR);
        let output = run_command(
            &self.git,
            &["log", "--stdin", "--no-walk", &format],
            Some(&self.path),
            Some(stdin_lines(shas)),
            LOG_TIMEOUT_SECS,
        )
        .await?;

        // git log fails as a whole on an unknown revision; treat that as no matches.
        if !output.success {
            debug!(stderr = %output.stderr.trim(), "git log reported missing commits");
        }

        Ok(parse_subjects(&output.stdout))
    }

    pub async fn existing_commits(&self, shas: &[String]) -> ScrapeResult<HashSet<String>> {
        if shas.is_empty() {
            return Ok(HashSet::new());
        }

        let output = run_command(
            &self.git,
            &["cat-file", "--batch-check"],
            Some(&self.path),
            Some(stdin_lines(shas)),
            CAT_FILE_TIMEOUT_SECS,
        )
        .await?;

        if !output.success {
            return Err(ScrapeError::Command {
                command: "git cat-file --batch-check".to_string(),
                message: output.stderr.trim().to_string(),
            });
        }

        Ok(parse_batch_check(&output.stdout))
    }
}

pub fn luci_repo_path(project: &str) -> Option<&'static str> {
    LUCI_REPO_PATHS
        .iter()
        .find(|(name, _)| *name == project)
        .map(|(_, path)| *path)
}

fn stdin_lines(shas: &[String]) -> String {
    let mut input = shas.join("\n");
    input.push('\n');
    input
}

fn parse_subjects(stdout: &str) -> HashMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once(SUBJECT_SEPARATOR))
        .map(|(sha, subject)| (sha.trim().to_string(), subject.to_string()))
        .filter(|(sha, _)| !sha.is_empty())
        .collect()
}

fn parse_batch_check(stdout: &str) -> HashSet<String> {
    stdout
        .lines()
        .filter(|line| !line.ends_with(" missing"))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(sha), Some("commit")) => Some(sha.to_string()),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subjects() {
        let stdout = "abc123|||Fix the build\ndef456|||Subject with ||| inside\n\nnot a line\n";
        let subjects = parse_subjects(stdout);

        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects["abc123"], "Fix the build");
        assert_eq!(subjects["def456"], "Subject with ||| inside");
    }

    #[test]
    fn test_parse_batch_check() {
        let stdout = "abc123 commit 250\ndef456 missing\n0011aa tree 100\n";
        let existing = parse_batch_check(stdout);

        assert_eq!(existing, HashSet::from(["abc123".to_string()]));
    }

    #[test]
    fn test_luci_repo_path() {
        assert_eq!(luci_repo_path("dart"), Some("dart-sdk"));
        assert_eq!(luci_repo_path("llvm"), Some("llvm-googlesource"));
        assert_eq!(luci_repo_path("unknown"), None);
    }

    #[test]
    fn test_missing_mirror() {
        let root = std::env::temp_dir().join("beanaries-no-such-mirror-root");
        assert!(GitMirror::for_luci_project("git", &root, "chromium").is_none());
    }

    #[tokio::test]
    async fn test_run_command_captures_output() {
        let output = run_command("sh", &["-c", "cat; exit 3"], None, Some("hello".into()), 10)
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "hello");
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let err = run_command("sh", &["-c", "sleep 5"], None, None, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::Timeout { seconds: 1, .. }));
    }
}
