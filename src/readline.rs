// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Line-editing module ensurer.

use crate::{
    config::ReadlineSettings,
    exec::{CommandRunner, ExecError},
    step::{Classify, FailureKind},
};

use tracing::{info, instrument};

/// Result of ensuring the line-editing module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadlineOutcome {
    /// Module was already available in the given version.
    Present { version: String },

    /// Module was missing and got installed.
    Installed,
}

/// Make the line-editing module available to the shell.
///
/// The check command prints the available module version, or nothing when the
/// module is absent.
///
/// # Errors
///
/// - Return [`ReadlineError::Exec`] if the shell cannot be run.
/// - Return [`ReadlineError::Install`] if the module installer exits nonzero.
#[instrument(skip(runner, settings), level = "debug")]
pub fn ensure(runner: &dyn CommandRunner, settings: &ReadlineSettings) -> Result<ReadlineOutcome> {
    let vars = [("module", settings.module.as_str())];
    let check = runner.run_line(&settings.check, &vars)?;
    let version = check.stdout_trimmed().trim();
    if check.success() && !version.is_empty() {
        info!("{} {version} is available", settings.module);
        return Ok(ReadlineOutcome::Present {
            version: version.to_string(),
        });
    }

    info!("installing {}", settings.module);
    let output = runner.run_line(&settings.install, &vars)?;
    if !output.success() {
        return Err(ReadlineError::Install {
            module: settings.module.clone(),
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(ReadlineOutcome::Installed)
}

/// Line-editing module error types.
#[derive(Debug, thiserror::Error)]
pub enum ReadlineError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("failed to install {module}: {stderr}")]
    Install { module: String, stderr: String },
}

impl Classify for ReadlineError {
    fn kind(&self) -> FailureKind {
        FailureKind::Install
    }
}

/// Friendly result alias :3
type Result<T, E = ReadlineError> = std::result::Result<T, E>;
