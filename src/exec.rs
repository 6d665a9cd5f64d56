// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command invocation.
//!
//! Every program shellstrap depends on, e.g., the package manager, the shell,
//! the installer service, the prompt theme tool, is reached through the
//! [`CommandRunner`] seam. The runner captures exit status and output, and
//! leaves interpretation to the caller.

use crate::config::CommandLine;

use std::{ffi::OsStr, process::Command};
use tracing::{debug, instrument};

/// Captured result of one external command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Check if the command exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Standard output with trailing newlines chomped.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim_end_matches(['\r', '\n'])
    }
}

/// Check whether a named program is available.
pub trait Capability {
    /// Check if `program` can be found and executed.
    fn exists(&self, program: &str) -> bool;
}

/// Run external programs and capture their output.
pub trait CommandRunner: Capability {
    /// Run `program` with `args`, wait for it, and capture its output.
    ///
    /// # Errors
    ///
    /// - Return [`ExecError::Spawn`] if the process cannot be started.
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Render a [`CommandLine`] with placeholders and run it.
    ///
    /// # Errors
    ///
    /// - Return [`ExecError::EmptyCommand`] if the command line is empty.
    /// - Return [`ExecError::Spawn`] if the process cannot be started.
    fn run_line(&self, line: &CommandLine, vars: &[(&str, &str)]) -> Result<CommandOutput> {
        let (program, args) = line.render(vars).ok_or(ExecError::EmptyCommand)?;
        self.run(&program, &args)
    }
}

/// Runner that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Capability for SystemRunner {
    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

impl CommandRunner for SystemRunner {
    #[instrument(skip(self, args), level = "debug")]
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!("run {program} {args:?}");
        let output = Command::new(OsStr::new(program))
            .args(args)
            .output()
            .map_err(|source| ExecError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
        })
    }
}

/// Pick the first candidate that is available.
///
/// Candidates are tested in order through the given [`Capability`], so the
/// result is deterministic for a given environment.
pub fn first_available<'a, C>(capability: &C, candidates: &'a [String]) -> Option<&'a str>
where
    C: Capability + ?Sized,
{
    candidates
        .iter()
        .map(String::as_str)
        .find(|candidate| capability.exists(candidate))
}

/// External command error types.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Command line had no program to run.
    #[error("command line is empty")]
    EmptyCommand,

    /// Process could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Friendly result alias :3
type Result<T, E = ExecError> = std::result::Result<T, E>;
