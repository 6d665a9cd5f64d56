// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Rate limiting of remote version checks.
//!
//! The __update marker__ is a file holding one RFC 3339 timestamp, the moment
//! of the last remote check. It is overwritten after every check regardless
//! of the check's outcome.

use crate::step::{Classify, FailureKind};

use chrono::{DateTime, TimeDelta, Utc};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Decide whether a remote check is due.
///
/// Returns false only when a previous check exists and happened less than
/// `cooldown` before `now`. A timestamp from the future means the clock moved
/// backwards, and the check is considered due.
pub fn should_check(last: Option<DateTime<Utc>>, now: DateTime<Utc>, cooldown: TimeDelta) -> bool {
    match last {
        None => true,
        Some(last) if last > now => true,
        Some(last) => now - last >= cooldown,
    }
}

/// Update marker file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMarker {
    path: PathBuf,
}

impl UpdateMarker {
    /// Construct new update marker at target path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to marker file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Timestamp of last remote check.
    ///
    /// Missing, unreadable, or unparsable marker content counts as no
    /// previous check.
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        let content = read_to_string(&self.path).ok()?;
        match DateTime::parse_from_rfc3339(content.trim()) {
            Ok(timestamp) => Some(timestamp.with_timezone(&Utc)),
            Err(error) => {
                debug!("ignore malformed update marker {:?}: {error}", self.path.display());
                None
            }
        }
    }

    /// Check if a remote check is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>, cooldown: TimeDelta) -> bool {
        should_check(self.last_checked(), now, cooldown)
    }

    /// Record `now` as the last remote check.
    ///
    /// # Errors
    ///
    /// - Return [`MarkerError`] if the marker cannot be written.
    pub fn touch(&self, now: DateTime<Utc>) -> Result<()> {
        write(&self.path, now.to_rfc3339()).map_err(|source| MarkerError {
            path: self.path.clone(),
            source,
        })
    }
}

/// Update marker could not be written.
#[derive(Debug, thiserror::Error)]
#[error("failed to write update marker {path:?}: {source}")]
pub struct MarkerError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
}

impl Classify for MarkerError {
    fn kind(&self) -> FailureKind {
        FailureKind::Filesystem
    }
}

/// Friendly result alias :3
type Result<T, E = MarkerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn no_previous_check_is_due() {
        assert!(should_check(None, at(12, 0), TimeDelta::hours(24)));
    }

    #[test]
    fn every_window_under_cooldown_is_not_due() {
        let last = at(0, 0);
        let cooldown = TimeDelta::hours(24);
        for minutes in [0, 1, 59, 60 * 12, 60 * 24 - 1] {
            let now = last + TimeDelta::minutes(minutes);
            assert!(!should_check(Some(last), now, cooldown), "{minutes} minutes");
        }
        assert!(should_check(Some(last), last + cooldown, cooldown));
        assert!(should_check(Some(last), last + TimeDelta::days(3), cooldown));
    }

    #[test]
    fn future_timestamp_is_due() {
        assert!(should_check(Some(at(13, 0)), at(12, 0), TimeDelta::hours(24)));
    }

    #[test]
    fn marker_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let marker = UpdateMarker::new(dir.path().join("marker.txt"));
        assert_eq!(marker.last_checked(), None);
        assert!(marker.is_due(at(12, 0), TimeDelta::hours(24)));

        marker.touch(at(12, 0))?;
        assert_eq!(marker.last_checked(), Some(at(12, 0)));
        assert!(!marker.is_due(at(18, 0), TimeDelta::hours(24)));

        Ok(())
    }

    #[test]
    fn malformed_marker_counts_as_missing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let marker = UpdateMarker::new(dir.path().join("marker.txt"));
        std::fs::write(marker.path(), "last tuesday")?;
        assert_eq!(marker.last_checked(), None);

        Ok(())
    }
}
