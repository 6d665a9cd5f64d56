// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Profile replacement by backup rotation.
//!
//! New profile content is first staged in a [`ScratchFile`]. Swapping it in
//! renames the current profile to `<profile>.old_<timestamp>` and then writes
//! the staged content to the canonical path. The profile is never patched in
//! place, and at no point are there zero copies of it on disk.
//!
//! # Pitfalls
//!
//! Backup timestamps have second resolution. Two replacements within the same
//! second would want the same backup name; the second one is refused rather
//! than overwriting the first backup.

use crate::{
    step::{Classify, FailureKind},
    update::version::hash_file,
};

use chrono::{DateTime, Utc};
use std::{
    ffi::OsString,
    fs::{copy, rename, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Format of the timestamp appended to backups.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Staging file for downloaded content.
///
/// # Invariant
///
/// - The file is removed when the scratch file is dropped, whether or not its
///   content was swapped in.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    file: Option<File>,
}

impl ScratchFile {
    /// Create or truncate scratch file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`ReplaceError::Scratch`] if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| ReplaceError::Scratch {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Path to scratch file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Hash of staged content.
    ///
    /// # Errors
    ///
    /// - Return [`ReplaceError::Scratch`] if the content cannot be flushed or read.
    pub fn hash(&mut self) -> Result<String> {
        self.flush_inner()?;
        hash_file(&self.path).map_err(|source| ReplaceError::Scratch {
            path: self.path.clone(),
            source,
        })
    }

    fn flush_inner(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush().map_err(|source| ReplaceError::Scratch {
                path: self.path.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

impl Write for ScratchFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(std::io::Error::other("scratch file already closed")),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        // INVARIANT: Close handle before removal, Windows refuses otherwise.
        drop(self.file.take());
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed scratch file {:?}", self.path.display()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => warn!(
                "failed to remove scratch file {:?}: {error}",
                self.path.display()
            ),
        }
    }
}

/// Name of the backup for `target` taken at `now`.
pub fn backup_path(target: &Path, now: DateTime<Utc>) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(format!(".old_{}", now.format(BACKUP_TIMESTAMP_FORMAT)));
    PathBuf::from(name)
}

/// Swap staged content into the canonical path.
///
/// Existing content at `target` is renamed to its backup first. Returns the
/// backup path, or `None` if there was nothing to back up. The scratch file is
/// consumed and removed on every exit path.
///
/// # Errors
///
/// - Return [`ReplaceError::BackupExists`] if the backup name is taken.
/// - Return [`ReplaceError::Rename`] if the current profile cannot be moved.
/// - Return [`ReplaceError::Write`] if the new content cannot be written. The
///   backup is moved back into place before returning.
#[instrument(skip(scratch), level = "debug")]
pub fn swap_in(
    mut scratch: ScratchFile,
    target: &Path,
    now: DateTime<Utc>,
) -> Result<Option<PathBuf>> {
    scratch.flush_inner()?;

    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        mkdirp::mkdirp(parent).map_err(|source| ReplaceError::Write {
            path: target.to_path_buf(),
            source,
        })?;
    }

    let backup = if target.exists() {
        let backup = backup_path(target, now);
        if backup.exists() {
            return Err(ReplaceError::BackupExists { path: backup });
        }

        rename(target, &backup).map_err(|source| ReplaceError::Rename {
            from: target.to_path_buf(),
            to: backup.clone(),
            source,
        })?;
        info!("backed up {:?} to {:?}", target.display(), backup.display());
        Some(backup)
    } else {
        None
    };

    // INVARIANT: Copy rather than rename, the temp directory may be on
    //            another volume.
    if let Err(source) = copy(scratch.path(), target) {
        if let Some(backup) = &backup {
            if let Err(error) = rename(backup, target) {
                warn!(
                    "failed to restore {:?} from {:?}: {error}",
                    target.display(),
                    backup.display()
                );
            }
        }
        return Err(ReplaceError::Write {
            path: target.to_path_buf(),
            source,
        });
    }

    info!("wrote new profile to {:?}", target.display());
    Ok(backup)
}

/// Replacement error types.
#[derive(Debug, thiserror::Error)]
pub enum ReplaceError {
    /// Scratch file could not be created, written, or read.
    #[error("scratch file {path:?}: {source}")]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backup with the same timestamp already exists.
    #[error("backup {path:?} already exists, refusing to overwrite it")]
    BackupExists { path: PathBuf },

    /// Current profile could not be renamed to its backup.
    #[error("failed to rename {from:?} to {to:?}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// New content could not be written to the canonical path.
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Classify for ReplaceError {
    fn kind(&self) -> FailureKind {
        FailureKind::Filesystem
    }
}

/// Friendly result alias :3
type Result<T, E = ReplaceError> = std::result::Result<T, E>;
