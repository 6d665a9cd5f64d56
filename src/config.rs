// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of shellstrap's settings file to simplify the process of
//! serialization and deserialization. File I/O is left to the caller to figure
//! out.
//!
//! Every section falls back to its defaults, so an empty file, or no file at
//! all, yields the stock Windows and PowerShell setup.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

/// Settings for every shellstrap operation.
///
/// # General Layout
///
/// Remote locations live under `[urls]`, optional path overrides under
/// `[paths]`, and the self-update tuning under `[update]`. External programs
/// are described as command lines whose placeholders (`{name}`, `{path}`,
/// `{module}`, `{config}`) are substituted at call time.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Package references to keep installed and current.
    pub packages: Vec<String>,

    /// Package whose presence the final verification banner checks.
    pub verify_package: String,

    /// Ordered editor candidates, first available wins.
    pub editors: Vec<String>,

    /// Remote artifact locations.
    pub urls: Urls,

    /// Optional overrides for resolved paths.
    pub paths: PathOverrides,

    /// Self-update protocol tuning.
    pub update: UpdateSettings,

    /// Package manager command lines.
    pub package_manager: PackageManagerSettings,

    /// Font to provide.
    pub font: FontSettings,

    /// Line-editing module to provide.
    pub readline: ReadlineSettings,

    /// Shell integrations whose `init` output is evaluated each session.
    pub tools: ToolSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            packages: vec![
                "JanDeDobbeleer.OhMyPosh".into(),
                "ajeetdsouza.zoxide".into(),
                "junegunn.fzf".into(),
            ],
            verify_package: "JanDeDobbeleer.OhMyPosh".into(),
            editors: [
                "nvim",
                "pvim",
                "vim",
                "vi",
                "code",
                "notepad++",
                "sublime_text",
                "notepad",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            urls: Urls::default(),
            paths: PathOverrides::default(),
            update: UpdateSettings::default(),
            package_manager: PackageManagerSettings::default(),
            font: FontSettings::default(),
            readline: ReadlineSettings::default(),
            tools: ToolSettings::default(),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path override.
        settings.paths.profile = settings.paths.profile.map(expand_path).transpose()?;
        settings.paths.temp_dir = settings.paths.temp_dir.map(expand_path).transpose()?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: PathBuf) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Remote artifact locations.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Urls {
    /// Raw file of the published profile script.
    pub profile: String,

    /// Release metadata API of the shell binary.
    pub shell_release: String,

    /// Zip archive of the font.
    pub font_archive: String,

    /// Prompt theme configuration.
    pub theme_config: String,

    /// Target of the connectivity probe.
    pub probe: String,
}

impl Urls {
    /// File name of the theme configuration, taken from its URL.
    pub fn theme_file_name(&self) -> &str {
        self.theme_config
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("theme.omp.json")
    }
}

impl Default for Urls {
    fn default() -> Self {
        Self {
            profile: "https://raw.githubusercontent.com/ChrisTitusTech/powershell-profile/main/Microsoft.PowerShell_profile.ps1".into(),
            shell_release: "https://api.github.com/repos/PowerShell/PowerShell/releases/latest".into(),
            font_archive: "https://github.com/ryanoasis/nerd-fonts/releases/download/v3.2.1/CascadiaCode.zip".into(),
            theme_config: "https://raw.githubusercontent.com/JanDeDobbeleer/oh-my-posh/main/themes/cobalt2.omp.json".into(),
            probe: "https://github.com".into(),
        }
    }
}

/// Optional overrides for resolved paths.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathOverrides {
    /// Profile script location.
    pub profile: Option<PathBuf>,

    /// Directory holding the update marker and scratch file.
    pub temp_dir: Option<PathBuf>,
}

/// Self-update protocol tuning.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateSettings {
    /// Minimum hours between remote version checks.
    pub cooldown_hours: u32,

    /// Timeout applied to regular HTTP requests.
    pub request_timeout_secs: u64,

    /// Timeout applied to the connectivity probe.
    pub probe_timeout_millis: u64,

    /// Suffix selecting the release asset for this platform.
    pub shell_asset_suffix: String,

    /// Prints the local shell version.
    pub shell_version_command: CommandLine,

    /// Runs a downloaded installer unattended; `{path}` is the payload.
    pub shell_installer: CommandLine,
}

impl UpdateSettings {
    /// Cooldown as a time delta.
    pub fn cooldown(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::hours(i64::from(self.cooldown_hours))
    }

    /// Regular request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connectivity probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_millis)
    }
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            cooldown_hours: 24,
            request_timeout_secs: 30,
            probe_timeout_millis: 1000,
            shell_asset_suffix: "win-x64.msi".into(),
            shell_version_command: CommandLine::from([
                "pwsh",
                "-NoProfile",
                "-Command",
                "$PSVersionTable.PSVersion.ToString()",
            ]),
            shell_installer: CommandLine::from(["msiexec", "/i", "{path}", "/quiet", "/norestart"]),
        }
    }
}

/// Package manager command lines.
///
/// The `list` and `search` commands must print one `name|version` line per
/// match.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PackageManagerSettings {
    /// Program whose presence means the package manager is available.
    pub program: String,

    /// Installs the package manager itself.
    pub bootstrap: CommandLine,

    /// Prints the locally installed version.
    pub list: CommandLine,

    /// Prints the catalog version.
    pub search: CommandLine,

    /// Installs a package.
    pub install: CommandLine,

    /// Upgrades a package.
    pub upgrade: CommandLine,
}

impl Default for PackageManagerSettings {
    fn default() -> Self {
        Self {
            program: "winget".into(),
            bootstrap: CommandLine::from([
                "pwsh",
                "-NoProfile",
                "-Command",
                "Install-Script -Name winget-install -Force; winget-install -Force",
            ]),
            list: CommandLine::from([
                "pwsh",
                "-NoProfile",
                "-Command",
                "Get-WinGetPackage -Id '{name}' -MatchOption Equals | ForEach-Object { \"$($_.Id)|$($_.InstalledVersion)\" }",
            ]),
            search: CommandLine::from([
                "pwsh",
                "-NoProfile",
                "-Command",
                "Find-WinGetPackage -Id '{name}' -MatchOption Equals | ForEach-Object { \"$($_.Id)|$($_.Version)\" }",
            ]),
            install: CommandLine::from([
                "winget",
                "install",
                "--id",
                "{name}",
                "--exact",
                "--silent",
                "--accept-source-agreements",
                "--accept-package-agreements",
            ]),
            upgrade: CommandLine::from([
                "winget",
                "upgrade",
                "--id",
                "{name}",
                "--exact",
                "--silent",
                "--accept-source-agreements",
                "--accept-package-agreements",
            ]),
        }
    }
}

/// Font to provide.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FontSettings {
    /// Family name shown in the registry.
    pub name: String,

    /// Prefix shared by the font's file names.
    pub file_prefix: String,

    /// Per-user font directory override.
    pub install_dir: Option<PathBuf>,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            name: "CaskaydiaCove NF".into(),
            file_prefix: "CaskaydiaCove".into(),
            install_dir: None,
        }
    }
}

/// Line-editing module to provide.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadlineSettings {
    /// Module name.
    pub module: String,

    /// Prints the available module version, empty when absent.
    pub check: CommandLine,

    /// Installs the module for the current user.
    pub install: CommandLine,
}

impl Default for ReadlineSettings {
    fn default() -> Self {
        Self {
            module: "PSReadLine".into(),
            check: CommandLine::from([
                "pwsh",
                "-NoProfile",
                "-Command",
                "Get-Module -ListAvailable -Name {module} | Select-Object -First 1 -ExpandProperty Version",
            ]),
            install: CommandLine::from([
                "pwsh",
                "-NoProfile",
                "-Command",
                "Install-Module -Name {module} -Scope CurrentUser -Force -SkipPublisherCheck",
            ]),
        }
    }
}

/// Shell integrations evaluated on every session.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Prompt theme `init` verb; `{config}` is the theme configuration path.
    pub theme: CommandLine,

    /// Directory-jump tool `init` verb.
    pub jump: CommandLine,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            theme: CommandLine::from(["oh-my-posh", "init", "pwsh", "--config", "{config}"]),
            jump: CommandLine::from(["zoxide", "init", "--cmd", "z", "powershell"]),
        }
    }
}

/// External command line with `{placeholder}` substitution.
///
/// The first element is the program, the rest are its arguments.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CommandLine(Vec<String>);

impl CommandLine {
    /// Construct new command line.
    pub fn new(parts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Program to invoke, if any.
    pub fn program(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Substitute placeholders, splitting into program and arguments.
    ///
    /// Returns `None` for an empty command line.
    pub fn render(&self, vars: &[(&str, &str)]) -> Option<(String, Vec<String>)> {
        let mut parts = self.0.iter().map(|part| {
            vars.iter().fold(part.clone(), |acc, (key, value)| {
                acc.replace(&format!("{{{key}}}"), value)
            })
        });
        let program = parts.next()?;

        Some((program, parts.collect()))
    }
}

impl<const N: usize> From<[&str; N]> for CommandLine {
    fn from(parts: [&str; N]) -> Self {
        Self::new(parts)
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah")])]
    fn deserialize_partial_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            packages = ["foo.bar"]
            verify_package = "foo.bar"

            [paths]
            profile = "$BLAH/profile.ps1"

            [update]
            cooldown_hours = 6
            shell_asset_suffix = "linux-x64.tar.gz"
        "#
        .parse()?;

        assert_eq!(result.packages, vec!["foo.bar".to_string()]);
        assert_eq!(result.paths.profile, Some(PathBuf::from("/home/blah/profile.ps1")));
        assert_eq!(result.paths.temp_dir, None);
        assert_eq!(result.update.cooldown_hours, 6);
        assert_eq!(result.update.shell_asset_suffix, "linux-x64.tar.gz");
        assert_eq!(result.update.probe_timeout_millis, 1000);
        assert_eq!(result.urls, Urls::default());

        Ok(())
    }

    #[test]
    fn empty_settings_are_default() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        assert_eq!(result, Settings::default());
        assert_eq!(result.verify_package, "JanDeDobbeleer.OhMyPosh");
        assert_eq!(result.update.cooldown(), chrono::TimeDelta::hours(24));

        Ok(())
    }

    #[test]
    fn command_line_substitutes_placeholders() {
        let line = CommandLine::from(["winget", "install", "--id", "{name}"]);
        let (program, args) = line.render(&[("name", "junegunn.fzf")]).unwrap();
        assert_eq!(program, "winget");
        assert_eq!(args, vec!["install", "--id", "junegunn.fzf"]);

        assert_eq!(CommandLine::default().render(&[]), None);
    }

    #[test]
    fn command_line_leaves_script_braces_alone() {
        let line = CommandLine::from(["pwsh", "-Command", "Get-Thing '{name}' | % { $_.Id }"]);
        let (_, args) = line.render(&[("name", "foo")]).unwrap();
        assert_eq!(args[1], "Get-Thing 'foo' | % { $_.Id }");
    }

    #[test]
    fn theme_file_name_comes_from_url() {
        assert_eq!(Urls::default().theme_file_name(), "cobalt2.omp.json");
    }
}
