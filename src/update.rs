// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Idempotent self-update protocol.
//!
//! Two artifacts keep themselves current: the shell profile, and the shell
//! binary that runs it. Both follow the same shape:
//!
//! 1. Decide whether a check is due at all (see [`cooldown`]).
//! 2. Fetch a remote version identifier (see [`fetch`]).
//! 3. Compare it to the local one (see [`version`]).
//! 4. Replace the local artifact only if the remote one is newer.
//!
//! The profile is identified by the SHA-256 hash of its content. Its remote
//! copy is downloaded into a scratch file, hashed, and swapped in by backup
//! rotation (see [`replace`]). The shell binary is identified by a semantic
//! version. Its newer release is handed to the platform installer in
//! unattended mode, and what the installer does afterwards is out of our
//! hands.
//!
//! The two checks are independent. A failure in one must never prevent the
//! other from running, so callers wrap each in
//! [`best_effort`](crate::step::best_effort).

pub mod cooldown;
pub mod fetch;
pub mod replace;
pub mod version;

use crate::{
    config::UpdateSettings,
    exec::{CommandRunner, ExecError},
    path::Paths,
    step::{Classify, FailureKind},
    update::{
        fetch::{FetchError, Fetcher, Release},
        replace::{swap_in, ReplaceError, ScratchFile},
        version::{compare, hash_file, parse_version, Comparison, VersionInfo},
    },
};

use chrono::{DateTime, Utc};
use semver::Version;
use std::path::PathBuf;
use tracing::{info, instrument};

/// When the profile should be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// Only when the remote content differs from the local content.
    IfChanged,

    /// Always, rotating the current profile to a backup.
    Always,
}

/// Result of a profile check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileOutcome {
    /// Local content already matches remote content.
    UpToDate,

    /// No profile existed, remote content written.
    Created,

    /// Profile replaced, previous content kept at `backup`.
    Replaced { backup: PathBuf },
}

/// Check the profile against its remote copy and replace it if needed.
///
/// # Errors
///
/// - Return [`UpdateError::Fetch`] if the remote copy cannot be downloaded.
/// - Return [`UpdateError::Replace`] if staging or swapping fails.
#[instrument(skip(fetcher, paths), level = "debug")]
pub async fn check_profile(
    fetcher: &Fetcher,
    url: &str,
    paths: &Paths,
    now: DateTime<Utc>,
    policy: ReplacePolicy,
) -> Result<ProfileOutcome> {
    let mut scratch = ScratchFile::create(&paths.scratch)?;
    fetcher.download_into(url, &mut scratch).await?;
    let remote = VersionInfo::Hash(scratch.hash()?);

    if policy == ReplacePolicy::IfChanged && paths.profile.exists() {
        let local = VersionInfo::Hash(hash_file(&paths.profile).map_err(|source| {
            UpdateError::ReadProfile {
                path: paths.profile.clone(),
                source,
            }
        })?);

        if compare(&local, &remote) == Comparison::Same {
            info!("profile is already up to date");
            return Ok(ProfileOutcome::UpToDate);
        }
    }

    match swap_in(scratch, &paths.profile, now)? {
        Some(backup) => {
            info!("profile updated, restart the shell to apply changes");
            Ok(ProfileOutcome::Replaced { backup })
        }
        None => {
            info!("profile created at {:?}", paths.profile.display());
            Ok(ProfileOutcome::Created)
        }
    }
}

/// Newer shell release chosen for installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellUpdatePlan {
    pub from: Version,
    pub to: Version,
    pub asset_name: String,
    pub download_url: String,
}

/// Result of a shell binary check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOutcome {
    /// Local shell is current or newer than the latest release.
    UpToDate { version: Version },

    /// Installer for a newer release was run.
    Updated { from: Version, to: Version },
}

/// Ask the local shell for its version.
///
/// # Errors
///
/// - Return [`UpdateError::Exec`] if the shell cannot be run.
/// - Return [`UpdateError::ShellVersion`] if it fails or prints no version.
pub fn local_shell_version(
    runner: &dyn CommandRunner,
    settings: &UpdateSettings,
) -> Result<Version> {
    let output = runner.run_line(&settings.shell_version_command, &[])?;
    let printed = output.stdout_trimmed();
    if !output.success() {
        return Err(UpdateError::ShellVersion(output.stderr.trim().to_string()));
    }

    // INVARIANT: Accept both "7.4.1" and "PowerShell 7.4.1".
    printed
        .split_whitespace()
        .find_map(parse_version)
        .ok_or_else(|| UpdateError::ShellVersion(printed.to_string()))
}

/// Decide whether `release` should replace the local shell.
///
/// Returns `None` unless the release is strictly newer than `local`.
///
/// # Errors
///
/// - Return [`UpdateError::ReleaseTag`] if the tag is not a version.
/// - Return [`UpdateError::NoAsset`] if a newer release has no asset for this
///   platform.
pub fn plan_shell_update(
    local: &Version,
    release: &Release,
    asset_suffix: &str,
) -> Result<Option<ShellUpdatePlan>> {
    let remote = parse_version(&release.tag_name)
        .ok_or_else(|| UpdateError::ReleaseTag(release.tag_name.clone()))?;

    let comparison = compare(
        &VersionInfo::Semver(local.clone()),
        &VersionInfo::Semver(remote.clone()),
    );
    if comparison != Comparison::RemoteNewer {
        return Ok(None);
    }

    let asset = release
        .asset_with_suffix(asset_suffix)
        .ok_or_else(|| UpdateError::NoAsset {
            tag: release.tag_name.clone(),
            suffix: asset_suffix.to_string(),
        })?;

    Ok(Some(ShellUpdatePlan {
        from: local.clone(),
        to: remote,
        asset_name: asset.name.clone(),
        download_url: asset.browser_download_url.clone(),
    }))
}

/// Download the planned installer and run it unattended.
///
/// The payload is kept on disk after return, since the installer may still be
/// reading it.
///
/// # Errors
///
/// - Return [`UpdateError::Fetch`] if the payload cannot be downloaded.
/// - Return [`UpdateError::Payload`] if the payload cannot be stored.
/// - Return [`UpdateError::Installer`] if the installer exits nonzero.
#[instrument(skip(fetcher, runner, settings), level = "debug")]
pub async fn apply_shell_update(
    fetcher: &Fetcher,
    runner: &dyn CommandRunner,
    settings: &UpdateSettings,
    plan: &ShellUpdatePlan,
) -> Result<()> {
    let mut payload = tempfile::Builder::new()
        .prefix("shellstrap-")
        .suffix(&format!("-{}", plan.asset_name))
        .tempfile()
        .map_err(UpdateError::Payload)?;
    info!("downloading {}", plan.asset_name);
    fetcher
        .download_into(&plan.download_url, payload.as_file_mut())
        .await?;
    let (_, payload_path) = payload
        .keep()
        .map_err(|error| UpdateError::Payload(error.error))?;

    info!("running installer for shell {}", plan.to);
    let path = payload_path.to_string_lossy();
    let output = runner.run_line(&settings.shell_installer, &[("path", path.as_ref())])?;
    if !output.success() {
        return Err(UpdateError::Installer {
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(())
}

/// Check the local shell against its latest release and update it if needed.
///
/// # Errors
///
/// - Return any [`UpdateError`] from the steps this check is made of.
pub async fn check_shell(
    fetcher: &Fetcher,
    runner: &dyn CommandRunner,
    settings: &UpdateSettings,
    release_url: &str,
) -> Result<ShellOutcome> {
    let local = local_shell_version(runner, settings)?;
    let release = fetcher.latest_release(release_url).await?;

    match plan_shell_update(&local, &release, &settings.shell_asset_suffix)? {
        Some(plan) => {
            info!("updating shell from {} to {}", plan.from, plan.to);
            apply_shell_update(fetcher, runner, settings, &plan).await?;
            info!("shell updated, restart the shell to apply changes");
            Ok(ShellOutcome::Updated {
                from: plan.from,
                to: plan.to,
            })
        }
        None => {
            info!("shell {local} is up to date");
            Ok(ShellOutcome::UpToDate { version: local })
        }
    }
}

/// Self-update error types.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Remote artifact could not be retrieved.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Profile could not be staged or swapped in.
    #[error(transparent)]
    Replace(#[from] ReplaceError),

    /// External program could not be started.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Local profile could not be hashed.
    #[error("failed to read profile {path:?}: {source}")]
    ReadProfile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Local shell did not report a usable version.
    #[error("cannot determine local shell version from {0:?}")]
    ShellVersion(String),

    /// Release tag is not a version.
    #[error("release tag {0:?} is not a version")]
    ReleaseTag(String),

    /// Newer release has no asset for this platform.
    #[error("release {tag} has no asset ending with {suffix:?}")]
    NoAsset { tag: String, suffix: String },

    /// Installer payload could not be stored.
    #[error("failed to store installer payload: {0}")]
    Payload(#[source] std::io::Error),

    /// Installer exited nonzero.
    #[error("installer exited with {code:?}: {stderr}")]
    Installer { code: Option<i32>, stderr: String },
}

impl Classify for UpdateError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Fetch(error) => error.kind(),
            Self::Replace(error) => error.kind(),
            Self::ReleaseTag(_) | Self::NoAsset { .. } => FailureKind::Fetch,
            Self::Exec(_) | Self::ShellVersion(_) | Self::Installer { .. } => FailureKind::Install,
            Self::ReadProfile { .. } | Self::Payload(_) => FailureKind::Filesystem,
        }
    }
}

/// Friendly result alias :3
type Result<T, E = UpdateError> = std::result::Result<T, E>;
