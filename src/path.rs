// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine the well-known locations shellstrap reads and writes: the shell
//! profile, the theme configuration that sits beside it, the update marker,
//! and the scratch file used while staging a downloaded profile.

use crate::config::PathOverrides;

use std::path::{Path, PathBuf};

/// File name of the update marker inside the temp directory.
pub const MARKER_FILE_NAME: &str = "shellstrap_last_update_check.txt";

/// File name of the scratch file inside the temp directory.
pub const SCRATCH_FILE_NAME: &str = "shellstrap_profile_download.ps1";

/// Determine default absolute path to the PowerShell profile.
///
/// PowerShell 7 keeps the current-user, current-host profile under
/// `Documents/PowerShell` on Windows and under `$XDG_CONFIG_HOME/powershell`
/// elsewhere. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_profile_path() -> Result<PathBuf> {
    if cfg!(windows) {
        dirs::document_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
            .map(|docs| docs.join("PowerShell").join("Microsoft.PowerShell_profile.ps1"))
            .ok_or(NoWayHome)
    } else {
        dirs::config_dir()
            .map(|config| config.join("powershell").join("Microsoft.PowerShell_profile.ps1"))
            .ok_or(NoWayHome)
    }
}

/// Determine default absolute path to shellstrap's own settings file.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_settings_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("shellstrap").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Resolved filesystem layout for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Canonical profile script.
    pub profile: PathBuf,

    /// Prompt theme configuration beside the profile.
    pub theme_config: PathBuf,

    /// Update cooldown marker.
    pub marker: PathBuf,

    /// Staging location for downloaded profile content.
    pub scratch: PathBuf,
}

impl Paths {
    /// Resolve the layout, preferring explicit overrides over platform defaults.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if a default must be computed and the home
    ///   directory cannot be determined.
    pub fn resolve(overrides: &PathOverrides, theme_file_name: &str) -> Result<Self> {
        let profile = match &overrides.profile {
            Some(path) => path.clone(),
            None => default_profile_path()?,
        };
        let temp = overrides
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        Ok(Self::with_profile(profile, temp, theme_file_name))
    }

    /// Build the layout around a known profile path and temp directory.
    pub fn with_profile(
        profile: impl Into<PathBuf>,
        temp_dir: impl AsRef<Path>,
        theme_file_name: &str,
    ) -> Self {
        let profile = profile.into();
        let theme_config = profile
            .parent()
            .map(|dir| dir.join(theme_file_name))
            .unwrap_or_else(|| PathBuf::from(theme_file_name));

        Self {
            profile,
            theme_config,
            marker: temp_dir.as_ref().join(MARKER_FILE_NAME),
            scratch: temp_dir.as_ref().join(SCRATCH_FILE_NAME),
        }
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn theme_config_sits_beside_profile() {
        let paths = Paths::with_profile("/home/blah/pwsh/profile.ps1", "/tmp", "theme.omp.json");
        assert_eq!(paths.theme_config, PathBuf::from("/home/blah/pwsh/theme.omp.json"));
        assert_eq!(paths.marker, PathBuf::from("/tmp").join(MARKER_FILE_NAME));
        assert_eq!(paths.scratch, PathBuf::from("/tmp").join(SCRATCH_FILE_NAME));
    }

    #[test]
    fn overrides_take_priority() -> anyhow::Result<()> {
        let overrides = PathOverrides {
            profile: Some(PathBuf::from("/blah/profile.ps1")),
            temp_dir: Some(PathBuf::from("/blah/tmp")),
        };
        let paths = Paths::resolve(&overrides, "theme.omp.json")?;
        assert_eq!(paths.profile, PathBuf::from("/blah/profile.ps1"));
        assert_eq!(paths.marker, PathBuf::from("/blah/tmp").join(MARKER_FILE_NAME));

        Ok(())
    }
}
