/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Mapping of source vocabularies onto the canonical platform, status and timing fields.

use chrono::{DateTime, NaiveDateTime};
use entity::project_config::Platform;

pub fn github_platform(labels: &[String]) -> Platform {
    let labels = labels.join(" ").to_lowercase();

    if labels.contains("windows") {
        if labels.contains("2022") {
            Platform::Windows2022
        } else {
            Platform::WindowsLatest
        }
    } else if labels.contains("macos") || labels.contains("mac") {
        if labels.contains("macos-13") {
            Platform::Macos13
        } else if labels.contains("macos-14") {
            Platform::Macos14
        } else {
            Platform::MacosLatest
        }
    } else if labels.contains("ubuntu") {
        if labels.contains("22.04") {
            Platform::Ubuntu2204
        } else if labels.contains("24.04") {
            Platform::Ubuntu2404
        } else {
            Platform::UbuntuLatest
        }
    } else {
        Platform::UbuntuLatest
    }
}

pub fn luci_platform(builder: &str) -> Platform {
    let builder = builder.to_lowercase();

    if builder.contains("linux") {
        Platform::UbuntuLatest
    } else if builder.contains("mac") {
        Platform::MacosLatest
    } else if builder.contains("win") {
        Platform::WindowsLatest
    } else {
        Platform::UbuntuLatest
    }
}

/// Only rules naming an `os` or `platform` are considered; first match wins.
pub fn buildkite_platform<'a>(rules: impl IntoIterator<Item = &'a str>) -> Platform {
    for rule in rules {
        let rule = rule.to_lowercase();
        if !rule.contains("os") && !rule.contains("platform") {
            continue;
        }

        if rule.contains("linux") || rule.contains("ubuntu") {
            return Platform::UbuntuLatest;
        } else if rule.contains("mac") || rule.contains("darwin") {
            return Platform::MacosLatest;
        } else if rule.contains("win") {
            return Platform::WindowsLatest;
        }
    }

    Platform::UbuntuLatest
}

/// `darwin` contains `win`, so macOS names are matched before the short Windows token.
pub fn gitlab_platform(job_name: &str) -> Platform {
    let job = job_name.to_lowercase();

    if job.contains("windows") {
        Platform::WindowsLatest
    } else if job.contains("macos") || job.contains("darwin") {
        Platform::MacosLatest
    } else if job.contains("win") {
        Platform::WindowsLatest
    } else if job.contains("ubuntu-22") {
        Platform::Ubuntu2204
    } else if job.contains("ubuntu-24") {
        Platform::Ubuntu2404
    } else {
        Platform::UbuntuLatest
    }
}

pub fn obs_platform(arch: &str) -> Platform {
    match arch.to_lowercase().as_str() {
        "aarch64" | "arm64" => Platform::MacosLatest,
        _ => Platform::UbuntuLatest,
    }
}

/// Platform of the machine running local builds.
pub fn host_platform(os_release: Option<&str>, macos_version: Option<&str>) -> Platform {
    match std::env::consts::OS {
        "macos" => match macos_version.map(str::trim) {
            Some(v) if v.starts_with("13") => Platform::Macos13,
            Some(v) if v.starts_with("14") => Platform::Macos14,
            _ => Platform::MacosLatest,
        },
        "windows" => Platform::WindowsLatest,
        _ => match os_release {
            Some(release) if release.contains("22.04") => Platform::Ubuntu2204,
            Some(release) if release.contains("24.04") => Platform::Ubuntu2404,
            _ => Platform::UbuntuLatest,
        },
    }
}

pub fn github_success(conclusion: Option<&str>) -> bool {
    conclusion == Some("success")
}

pub fn buildbucket_success(status: &str) -> bool {
    status == "SUCCESS"
}

pub fn buildkite_success(state: &str) -> bool {
    state == "passed"
}

pub fn gitlab_success(status: &str) -> bool {
    status == "success"
}

pub const KOJI_STATE_COMPLETE: i64 = 1;

pub fn koji_success(state: i64) -> bool {
    state == KOJI_STATE_COMPLETE
}

pub fn obs_success(code: &str) -> bool {
    code.eq_ignore_ascii_case("succeeded")
}

pub fn parse_rfc3339(value: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Koji reports `2024-01-01 00:00:00.123456+00:00` or the same without an offset.
pub fn parse_koji_time(value: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z")
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

pub fn from_unix(seconds: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
}

/// Whole seconds between both timestamps, or `None` when either is missing or they are inverted.
pub fn duration_seconds(
    started_at: Option<NaiveDateTime>,
    finished_at: Option<NaiveDateTime>,
) -> Option<i64> {
    let seconds = (finished_at? - started_at?).num_seconds();
    (seconds >= 0).then_some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_github_platform() {
        assert_eq!(github_platform(&labels(&["ubuntu-22.04"])), Platform::Ubuntu2204);
        assert_eq!(github_platform(&labels(&["ubuntu-24.04"])), Platform::Ubuntu2404);
        assert_eq!(github_platform(&labels(&["ubuntu-latest"])), Platform::UbuntuLatest);
        assert_eq!(github_platform(&labels(&["windows-latest"])), Platform::WindowsLatest);
        assert_eq!(github_platform(&labels(&["windows-2022"])), Platform::Windows2022);
        assert_eq!(github_platform(&labels(&["macos-13"])), Platform::Macos13);
        assert_eq!(github_platform(&labels(&["macos-14", "arm64"])), Platform::Macos14);
        assert_eq!(github_platform(&labels(&["macos-latest"])), Platform::MacosLatest);
        assert_eq!(github_platform(&labels(&["macos-14", "xcode-13"])), Platform::Macos14);
        assert_eq!(github_platform(&labels(&["macos-latest", "xcode-14"])), Platform::MacosLatest);
        assert_eq!(github_platform(&labels(&["self-hosted", "X64"])), Platform::UbuntuLatest);
        assert_eq!(github_platform(&[]), Platform::UbuntuLatest);
    }

    #[test]
    fn test_luci_platform() {
        assert_eq!(luci_platform("Linux Builder"), Platform::UbuntuLatest);
        assert_eq!(luci_platform("Mac Builder"), Platform::MacosLatest);
        assert_eq!(luci_platform("Win x64 Builder"), Platform::WindowsLatest);
        assert_eq!(luci_platform("android-arm64"), Platform::UbuntuLatest);
    }

    #[test]
    fn test_buildkite_platform() {
        assert_eq!(buildkite_platform(["queue=default", "os=macos"]), Platform::MacosLatest);
        assert_eq!(buildkite_platform(["platform=windows"]), Platform::WindowsLatest);
        assert_eq!(buildkite_platform(["queue=windows"]), Platform::UbuntuLatest);
        assert_eq!(buildkite_platform(Vec::<&str>::new()), Platform::UbuntuLatest);
    }

    #[test]
    fn test_gitlab_platform() {
        assert_eq!(gitlab_platform("build:windows"), Platform::WindowsLatest);
        assert_eq!(gitlab_platform("build-win64"), Platform::WindowsLatest);
        assert_eq!(gitlab_platform("build-darwin"), Platform::MacosLatest);
        assert_eq!(gitlab_platform("test ubuntu-22.04"), Platform::Ubuntu2204);
        assert_eq!(gitlab_platform("debian-build"), Platform::UbuntuLatest);
    }

    #[test]
    fn test_obs_platform() {
        assert_eq!(obs_platform("x86_64"), Platform::UbuntuLatest);
        assert_eq!(obs_platform("aarch64"), Platform::MacosLatest);
        assert_eq!(obs_platform("i586"), Platform::UbuntuLatest);
    }

    #[test]
    fn test_success_vocabularies() {
        assert!(buildbucket_success("SUCCESS"));
        assert!(!buildbucket_success("INFRA_FAILURE"));
        assert!(!buildbucket_success("CANCELED"));
        assert!(koji_success(1));
        assert!(!koji_success(3));
        assert!(buildkite_success("passed"));
        assert!(!buildkite_success("blocked"));
        assert!(obs_success("Succeeded"));
        assert!(!obs_success("unknown"));
        assert!(github_success(Some("success")));
        assert!(!github_success(Some("cancelled")));
        assert!(!github_success(None));
        assert!(gitlab_success("success"));
        assert!(!gitlab_success("canceled"));
    }

    #[test]
    fn test_duration_computation() {
        let start = parse_rfc3339("2024-01-01T00:00:00Z");
        let end = parse_rfc3339("2024-01-01T00:10:30Z");

        assert_eq!(duration_seconds(start, end), Some(630));
        assert_eq!(duration_seconds(start, None), None);
        assert_eq!(duration_seconds(None, end), None);
        assert_eq!(duration_seconds(end, start), None);
    }

    #[test]
    fn test_parse_koji_time() {
        let start = parse_koji_time("2024-01-01 00:00:00.123456+00:00");
        let end = parse_koji_time("2024-01-01 01:00:00.654321");

        assert!(start.is_some());
        assert_eq!(duration_seconds(start, end), Some(3600));
        assert_eq!(parse_koji_time("not a time"), None);
    }

    #[test]
    fn test_parse_rfc3339_offset() {
        let utc = parse_rfc3339("2024-01-01T02:00:00+02:00");
        assert_eq!(utc, parse_rfc3339("2024-01-01T00:00:00Z"));
        assert_eq!(parse_rfc3339(""), None);
    }
}
