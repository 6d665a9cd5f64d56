// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package presence and update ensurer.
//!
//! Packages are resolved entirely by the external package manager. We keep no
//! state about them: every decision starts from a fresh query of the local and
//! the catalog version.
//!
//! # Query Output Convention
//!
//! The `list` and `search` commands print one `name|version` line per match.
//! Lines that do not follow the convention, e.g., progress output or
//! banners, are ignored.

use crate::{
    config::PackageManagerSettings,
    exec::{CommandOutput, CommandRunner, ExecError},
    step::{Classify, FailureKind},
};

use tracing::{debug, info, instrument, warn};

/// Result of ensuring one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    /// Package was missing and got installed.
    Installed,

    /// Package was outdated and got upgraded.
    Upgraded { from: String, to: String },

    /// Local version matches catalog version.
    UpToDate { version: String },

    /// Installed, but the catalog does not know the package.
    Unresolved { version: String },

    /// Neither installed nor known to the catalog.
    NotFound,
}

/// Package manager driven through configured command lines.
pub struct PackageManager<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a PackageManagerSettings,
}

impl<'a> PackageManager<'a> {
    /// Construct new package manager.
    pub fn new(runner: &'a dyn CommandRunner, settings: &'a PackageManagerSettings) -> Self {
        Self { runner, settings }
    }

    /// Check if the package manager program can be found.
    pub fn is_available(&self) -> bool {
        self.runner.exists(&self.settings.program)
    }

    /// Make the package manager available, bootstrapping it if needed.
    ///
    /// # Errors
    ///
    /// - Return [`PackageError::Exec`] if the bootstrap command cannot be run.
    /// - Return [`PackageError::Unavailable`] if the package manager is still
    ///   missing afterwards.
    #[instrument(skip(self), level = "debug")]
    pub fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            debug!("{} is available", self.settings.program);
            return Ok(());
        }

        info!("{} not found, bootstrapping it", self.settings.program);
        let output = self.runner.run_line(&self.settings.bootstrap, &[])?;
        if !output.success() {
            warn!("bootstrap exited with {:?}: {}", output.code, output.stderr.trim());
        }

        if self.is_available() {
            Ok(())
        } else {
            Err(PackageError::Unavailable {
                program: self.settings.program.clone(),
            })
        }
    }

    /// Locally installed version of `name`.
    ///
    /// # Errors
    ///
    /// - Return [`PackageError::Exec`] if the query cannot be run.
    /// - Return [`PackageError::Failed`] if the query exits nonzero.
    pub fn query(&self, name: &str) -> Result<Option<String>> {
        let output = self.runner.run_line(&self.settings.list, &[("name", name)])?;
        let output = check_status("list", name, output)?;
        Ok(query_version(&output, name))
    }

    /// Catalog version of `name`.
    ///
    /// # Errors
    ///
    /// - Return [`PackageError::Exec`] if the query cannot be run.
    /// - Return [`PackageError::Failed`] if the query exits nonzero.
    pub fn query_remote(&self, name: &str) -> Result<Option<String>> {
        let output = self.runner.run_line(&self.settings.search, &[("name", name)])?;
        let output = check_status("search", name, output)?;
        Ok(query_version(&output, name))
    }

    /// Install `name`.
    ///
    /// # Errors
    ///
    /// - Return [`PackageError::Exec`] if the command cannot be run.
    /// - Return [`PackageError::Failed`] if it exits nonzero.
    /// - Return [`PackageError::NotListed`] if `name` is not listed afterwards.
    pub fn install(&self, name: &str) -> Result<String> {
        let output = self.runner.run_line(&self.settings.install, &[("name", name)])?;
        check_status("install", name, output)?;
        self.confirm_listed("install", name)
    }

    /// Upgrade `name`.
    ///
    /// # Errors
    ///
    /// - Return [`PackageError::Exec`] if the command cannot be run.
    /// - Return [`PackageError::Failed`] if it exits nonzero.
    /// - Return [`PackageError::NotListed`] if `name` is not listed afterwards.
    pub fn upgrade(&self, name: &str) -> Result<String> {
        let output = self.runner.run_line(&self.settings.upgrade, &[("name", name)])?;
        check_status("upgrade", name, output)?;
        self.confirm_listed("upgrade", name)
    }

    // INVARIANT: A zero exit status alone does not count as success, the
    //            package must also show up in the local listing.
    fn confirm_listed(&self, action: &'static str, name: &str) -> Result<String> {
        self.query(name)?.ok_or_else(|| PackageError::NotListed {
            action,
            name: name.to_string(),
        })
    }

    /// Install or upgrade `name` only when local and catalog versions differ.
    ///
    /// # Errors
    ///
    /// - Return [`PackageError`] if a query or the resulting install or upgrade
    ///   fails.
    #[instrument(skip(self), level = "debug")]
    pub fn ensure(&self, name: &str) -> Result<PackageOutcome> {
        let local = self.query(name)?;
        let remote = self.query_remote(name)?;

        match (local, remote) {
            (None, Some(remote)) => {
                info!("installing {name} {remote}");
                self.install(name)?;
                Ok(PackageOutcome::Installed)
            }
            (None, None) => {
                warn!("{name} is neither installed nor listed in the catalog");
                Ok(PackageOutcome::NotFound)
            }
            (Some(local), Some(remote)) if local != remote => {
                info!("upgrading {name} from {local} to {remote}");
                self.upgrade(name)?;
                Ok(PackageOutcome::Upgraded {
                    from: local,
                    to: remote,
                })
            }
            (Some(local), Some(_)) => {
                info!("{name} {local} is up to date");
                Ok(PackageOutcome::UpToDate { version: local })
            }
            (Some(local), None) => {
                warn!("{name} {local} is installed, but the catalog does not list it");
                Ok(PackageOutcome::Unresolved { version: local })
            }
        }
    }
}

/// Extract the version for `name` from `name|version` query output.
///
/// Names match case-insensitively. Only meaningful for a query that exited
/// successfully.
pub fn query_version(output: &CommandOutput, name: &str) -> Option<String> {
    output.stdout.lines().find_map(|line| {
        let (found, version) = line.trim().split_once('|')?;
        let version = version.trim();
        (found.trim().eq_ignore_ascii_case(name) && !version.is_empty())
            .then(|| version.to_string())
    })
}

fn check_status(action: &'static str, name: &str, output: CommandOutput) -> Result<CommandOutput> {
    if output.success() {
        return Ok(output);
    }

    Err(PackageError::Failed {
        action,
        name: name.to_string(),
        code: output.code,
        stderr: output.stderr.trim().to_string(),
    })
}

/// Package management error types.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// Package manager program could not be run.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Package manager is missing even after bootstrapping.
    #[error("package manager {program} is not available")]
    Unavailable { program: String },

    /// Package manager command exited nonzero.
    #[error("{action} of {name} exited with {code:?}: {stderr}")]
    Failed {
        action: &'static str,
        name: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Install or upgrade succeeded, but the package is still not listed.
    #[error("{action} of {name} finished, but {name} is not listed afterwards")]
    NotListed { action: &'static str, name: String },
}

impl Classify for PackageError {
    fn kind(&self) -> FailureKind {
        FailureKind::Install
    }
}

/// Friendly result alias :3
type Result<T, E = PackageError> = std::result::Result<T, E>;
