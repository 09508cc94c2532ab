/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::ops::RangeInclusive;

pub const PORT_RANGE: RangeInclusive<usize> = 1..=65535;

pub const USER_AGENT: &str = "Beanaries/0.1.0";

pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const BUILDBUCKET_URL: &str = "https://cr-buildbucket.appspot.com";
pub const LUCI_UI_URL: &str = "https://ci.chromium.org";
pub const BUILDKITE_API_URL: &str = "https://api.buildkite.com";
pub const BUILDKITE_WEB_URL: &str = "https://buildkite.com";
pub const GITLAB_DEFAULT_HOST: &str = "https://gitlab.freedesktop.org";
pub const GITLAB_COM_HOST: &str = "https://gitlab.com";
pub const KOJI_HUB_URL: &str = "https://koji.fedoraproject.org/kojihub";
pub const OBS_API_URL: &str = "https://api.opensuse.org";

pub const MAX_COMMIT_MESSAGE_LEN: usize = 2000;
pub const MIN_SUCCESSFUL_JOB_SECONDS: i64 = 15;
pub const BACKFILL_BATCH_SIZE: u64 = 500;

/// LUCI project name to mirror directory below the mirror root.
pub const LUCI_REPO_PATHS: [(&str, &str); 9] = [
    ("chromium", "chromium"),
    ("dart", "dart-sdk"),
    ("flutter", "flutter"),
    ("fuchsia", "fuchsia"),
    ("gcc", "gcc"),
    ("go", "go"),
    ("llvm", "llvm-googlesource"),
    ("qemu", "qemu"),
    ("webrtc", "webrtc"),
];
