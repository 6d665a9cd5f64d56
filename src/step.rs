// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Best-effort step execution.
//!
//! Only precondition failures abort a run. Everything else is logged as a
//! warning and the run moves on to the next unrelated step.

use std::fmt::Display;
use tracing::warn;

/// Classification of a failure by how the run reacts to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing privilege or connectivity. Aborts the run.
    Precondition,

    /// Network or HTTP failure. Step skipped, retried next run.
    Fetch,

    /// External tool exited nonzero or printed something unparsable.
    Install,

    /// Rename, write, or read denied.
    Filesystem,
}

impl FailureKind {
    /// Check if failures of this kind abort the whole run.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Precondition)
    }
}

/// Error that can be classified by [`FailureKind`].
pub trait Classify {
    /// Failure kind of this error.
    fn kind(&self) -> FailureKind;
}

/// Run a recoverable step, turning its failure into a warning.
///
/// Returns `Some` with the step's value on success, `None` after logging the
/// failure.
pub fn best_effort<T, E>(step: &str, result: Result<T, E>) -> Option<T>
where
    E: Classify + Display,
{
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!("{step} failed ({:?}): {error}", error.kind());
            None
        }
    }
}
