// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run preconditions: elevated privilege and network connectivity.

use crate::{
    exec::CommandRunner,
    step::{Classify, FailureKind},
};

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// Result of the connectivity probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    /// Check if the probe reached its target.
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

/// Probe `url` once, giving up after `timeout`.
///
/// Any response, whatever its status, proves connectivity.
#[instrument(skip(client), level = "debug")]
pub async fn probe(client: &Client, url: &str, timeout: Duration) -> Connectivity {
    match client.head(url).timeout(timeout).send().await {
        Ok(response) => {
            debug!("probe answered with {}", response.status());
            Connectivity::Online
        }
        Err(error) => {
            debug!("probe failed: {error}");
            Connectivity::Offline
        }
    }
}

/// Check if the current process runs with elevated privilege.
///
/// On Windows `net session` only succeeds for administrators. Elsewhere the
/// effective user id must be zero.
pub fn is_elevated(runner: &dyn CommandRunner) -> bool {
    let output = if cfg!(windows) {
        runner.run("net", &["session".to_string()])
    } else {
        runner.run("id", &["-u".to_string()])
    };

    match output {
        Ok(output) if cfg!(windows) => output.success(),
        Ok(output) => output.success() && output.stdout_trimmed() == "0",
        Err(error) => {
            debug!("privilege check failed: {error}");
            false
        }
    }
}

/// Ensure both preconditions of a provisioning run hold.
///
/// # Errors
///
/// - Return [`PreflightError::NotElevated`] without elevated privilege.
/// - Return [`PreflightError::Offline`] if the probe target is unreachable.
pub async fn require(
    runner: &dyn CommandRunner,
    client: &Client,
    probe_url: &str,
    timeout: Duration,
) -> Result<()> {
    if !is_elevated(runner) {
        return Err(PreflightError::NotElevated);
    }

    if !probe(client, probe_url, timeout).await.is_online() {
        return Err(PreflightError::Offline {
            url: probe_url.to_string(),
        });
    }

    Ok(())
}

/// Unmet precondition.
#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("elevated privilege is required, rerun from an administrator shell")]
    NotElevated,

    #[error("cannot reach {url}, check the network connection")]
    Offline { url: String },
}

impl Classify for PreflightError {
    fn kind(&self) -> FailureKind {
        FailureKind::Precondition
    }
}

/// Friendly result alias :3
type Result<T, E = PreflightError> = std::result::Result<T, E>;
