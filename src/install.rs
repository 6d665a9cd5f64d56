// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! One-shot workstation provisioning.
//!
//! The installer runs its steps in a fixed order:
//!
//! 1. Preconditions: elevated privilege and connectivity.
//! 2. Profile creation or rotation from the remote profile.
//! 3. Theme configuration beside the profile.
//! 4. Package manager presence, then every configured package.
//! 5. Font, if absent.
//! 6. Line-editing module.
//! 7. Verification banner.
//!
//! Only the preconditions are fatal. Every other step is best-effort: its
//! failure is logged and the installer moves on to the next step.

use crate::{
    config::Settings,
    exec::CommandRunner,
    font,
    package::{PackageManager, PackageOutcome},
    path::Paths,
    preflight::{self, PreflightError},
    readline::{self, ReadlineOutcome},
    step::{best_effort, Classify, FailureKind},
    update::{
        check_profile,
        fetch::{FetchError, Fetcher},
        ProfileOutcome, ReplacePolicy,
    },
};

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Ask the user to confirm a destructive step.
pub trait Confirmer {
    /// Ask `message`, returning the user's answer.
    fn confirm(&self, message: &str) -> bool;
}

/// Interactive confirmation on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquireConfirmer;

impl Confirmer for InquireConfirmer {
    fn confirm(&self, message: &str) -> bool {
        match Confirm::new(message).with_default(false).prompt() {
            Ok(answer) => answer,
            Err(error) => {
                warn!("cannot prompt for confirmation: {error}");
                false
            }
        }
    }
}

/// Confirmation that always answers yes.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _message: &str) -> bool {
        true
    }
}

/// Final verification of a provisioning run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub profile: bool,
    pub package: bool,
    pub font: bool,
}

impl Verification {
    /// Check if every verified item is present.
    pub fn passed(&self) -> bool {
        self.profile && self.package && self.font
    }
}

/// Summary of a provisioning run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Profile step outcome, `None` if skipped or failed.
    pub profile: Option<ProfileOutcome>,

    /// Theme configuration location, `None` if skipped or failed.
    pub theme_config: Option<PathBuf>,

    /// Outcome per package that could be ensured.
    pub packages: Vec<(String, PackageOutcome)>,

    /// Font files installed by this run.
    pub font_files: Vec<PathBuf>,

    /// Line-editing module outcome, `None` if failed.
    pub readline: Option<ReadlineOutcome>,

    /// Final verification.
    pub verification: Verification,
}

/// Workstation provisioner.
pub struct Installer<'a> {
    runner: &'a dyn CommandRunner,
    fetcher: &'a Fetcher,
    confirmer: &'a dyn Confirmer,
    settings: &'a Settings,
    paths: &'a Paths,
}

impl<'a> Installer<'a> {
    /// Construct new installer.
    pub fn new(
        runner: &'a dyn CommandRunner,
        fetcher: &'a Fetcher,
        confirmer: &'a dyn Confirmer,
        settings: &'a Settings,
        paths: &'a Paths,
    ) -> Self {
        Self {
            runner,
            fetcher,
            confirmer,
            settings,
            paths,
        }
    }

    /// Provision the workstation.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Preflight`] if a precondition does not hold.
    ///   No other failure is returned.
    #[instrument(skip(self), level = "debug")]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<InstallReport> {
        preflight::require(
            self.runner,
            self.fetcher.client(),
            &self.settings.urls.probe,
            self.settings.update.probe_timeout(),
        )
        .await?;

        let mut report = InstallReport {
            profile: self.install_profile(now).await,
            theme_config: best_effort("theme configuration", self.install_theme().await),
            ..Default::default()
        };

        let manager = PackageManager::new(self.runner, &self.settings.package_manager);
        if best_effort("package manager", manager.ensure_available()).is_some() {
            report.packages =
                best_effort("packages", self.install_packages(&manager)).unwrap_or_default();
        }

        report.font_files = self.install_font().await;
        report.readline = best_effort(
            "line-editing module",
            readline::ensure(self.runner, &self.settings.readline),
        );

        report.verification = self.verify(&manager);
        if report.verification.passed() {
            info!("setup completed, restart the shell to apply changes");
        } else {
            warn!("setup completed with errors: {:?}", report.verification);
        }

        Ok(report)
    }

    async fn install_profile(&self, now: DateTime<Utc>) -> Option<ProfileOutcome> {
        if self.paths.profile.exists() {
            let message = format!(
                "Replace existing profile at {}? A backup will be kept.",
                self.paths.profile.display()
            );
            if !self.confirmer.confirm(&message) {
                info!("keeping existing profile");
                return None;
            }
        }

        best_effort(
            "profile",
            check_profile(
                self.fetcher,
                &self.settings.urls.profile,
                self.paths,
                now,
                ReplacePolicy::Always,
            )
            .await,
        )
    }

    async fn install_theme(&self) -> Result<PathBuf> {
        let content = self.fetcher.bytes(&self.settings.urls.theme_config).await?;
        let path = &self.paths.theme_config;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            mkdirp::mkdirp(parent).map_err(|source| InstallError::write(path, source))?;
        }
        std::fs::write(path, content).map_err(|source| InstallError::write(path, source))?;
        info!("theme configuration written to {:?}", path.display());

        Ok(path.clone())
    }

    fn install_packages(
        &self,
        manager: &PackageManager<'_>,
    ) -> Result<Vec<(String, PackageOutcome)>> {
        let bar = ProgressBar::new(self.settings.packages.len() as u64);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<40}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);

        let mut outcomes = Vec::new();
        for name in &self.settings.packages {
            bar.set_message(name.clone());
            let result = bar.suspend(|| manager.ensure(name));
            if let Some(outcome) = best_effort(name, result) {
                outcomes.push((name.clone(), outcome));
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok(outcomes)
    }

    async fn install_font(&self) -> Vec<PathBuf> {
        let font = &self.settings.font;
        if font::is_installed(&font.file_prefix, &font::font_dirs(font)) {
            info!("font {} is already installed", font.name);
            return Vec::new();
        }

        best_effort(
            "font",
            font::install(self.fetcher, self.runner, font, &self.settings.urls.font_archive).await,
        )
        .unwrap_or_default()
    }

    fn verify(&self, manager: &PackageManager<'_>) -> Verification {
        let package = match manager.query(&self.settings.verify_package) {
            Ok(version) => version.is_some(),
            Err(error) => {
                warn!("cannot verify {}: {error}", self.settings.verify_package);
                false
            }
        };
        let font = &self.settings.font;

        Verification {
            profile: self.paths.profile.exists(),
            package,
            font: font::is_installed(&font.file_prefix, &font::font_dirs(font)),
        }
    }
}

/// Installer error types.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Precondition does not hold.
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    /// Remote artifact could not be retrieved.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Downloaded artifact could not be written.
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

impl InstallError {
    fn write(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Classify for InstallError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Preflight(error) => error.kind(),
            Self::Fetch(error) => error.kind(),
            Self::Write { .. } => FailureKind::Filesystem,
            Self::IndicatifStyleTemplate(_) => FailureKind::Install,
        }
    }
}

/// Friendly result alias :3
type Result<T, E = InstallError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exec::{fake::ScriptedRunner, CommandOutput},
        update::fetch::testing::serve,
    };
    use pretty_assertions::assert_eq;
    use std::{
        fs::{read_dir, read_to_string, write, File},
        io::Write,
        path::Path,
        time::Duration,
    };

    struct AssumeNo;

    impl Confirmer for AssumeNo {
        fn confirm(&self, _message: &str) -> bool {
            false
        }
    }

    fn now() -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 15).unwrap()
    }

    fn font_archive() -> anyhow::Result<Vec<u8>> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut buffer);
        writer.start_file(
            "CaskaydiaCoveNerdFont-Regular.ttf",
            zip::write::SimpleFileOptions::default(),
        )?;
        writer.write_all(b"font")?;
        writer.finish()?;

        Ok(buffer.into_inner())
    }

    fn settings_for(base: &str, font_dir: &Path) -> Settings {
        let mut settings = Settings {
            packages: vec!["foo".into(), "bar".into()],
            verify_package: "foo".into(),
            ..Default::default()
        };
        settings.urls.profile = format!("{base}/profile.ps1");
        settings.urls.theme_config = format!("{base}/cobalt2.omp.json");
        settings.urls.font_archive = format!("{base}/font.zip");
        settings.urls.probe = base.to_string();
        settings.font.install_dir = Some(font_dir.to_path_buf());
        settings.package_manager.program = "pm".into();
        settings.package_manager.list = ["pm", "list", "{name}"].into();
        settings.package_manager.search = ["pm", "search", "{name}"].into();
        settings.package_manager.install = ["pm", "install", "{name}"].into();
        settings.package_manager.upgrade = ["pm", "upgrade", "{name}"].into();

        settings
    }

    fn admin_runner() -> ScriptedRunner {
        ScriptedRunner::new()
            .with_program("pm")
            .respond("id -u", CommandOutput::ok("0\n"))
            .respond("net session", CommandOutput::ok(""))
            .respond("pm list foo", CommandOutput::ok("foo|1.0.0\n"))
            .respond("pm search foo", CommandOutput::ok("foo|1.0.0\n"))
            .respond_once("pm list bar", CommandOutput::ok(""))
            .respond("pm list bar", CommandOutput::ok("bar|2.0.0\n"))
            .respond("pm search bar", CommandOutput::ok("bar|2.0.0\n"))
            .respond("Get-Module", CommandOutput::ok("2.3.5\n"))
    }

    #[tokio::test]
    async fn fresh_workstation_is_provisioned() -> anyhow::Result<()> {
        let base = serve(vec![
            ("/profile.ps1", 200, b"function gs { git status }\n".to_vec()),
            ("/cobalt2.omp.json", 200, b"{}".to_vec()),
            ("/font.zip", 200, font_archive()?),
        ])
        .await;
        let (home, temp, fonts) = (
            tempfile::tempdir()?,
            tempfile::tempdir()?,
            tempfile::tempdir()?,
        );
        let settings = settings_for(&base, fonts.path());
        let paths = Paths::with_profile(
            home.path().join("profile.ps1"),
            temp.path(),
            "cobalt2.omp.json",
        );
        let runner = admin_runner();
        let fetcher = Fetcher::new(Duration::from_secs(5))?;

        let report = Installer::new(&runner, &fetcher, &AssumeNo, &settings, &paths)
            .run(now())
            .await?;

        assert_eq!(report.profile, Some(ProfileOutcome::Created));
        assert_eq!(report.theme_config, Some(home.path().join("cobalt2.omp.json")));
        assert_eq!(read_to_string(&paths.theme_config)?, "{}");
        assert_eq!(
            report.packages,
            vec![
                (
                    "foo".to_string(),
                    PackageOutcome::UpToDate {
                        version: "1.0.0".into()
                    }
                ),
                ("bar".to_string(), PackageOutcome::Installed),
            ]
        );
        assert!(runner.called("pm install bar"));
        assert_eq!(
            report.font_files,
            vec![fonts.path().join("CaskaydiaCoveNerdFont-Regular.ttf")]
        );
        assert_eq!(
            report.readline,
            Some(ReadlineOutcome::Present {
                version: "2.3.5".into()
            })
        );
        assert!(report.verification.passed());

        Ok(())
    }

    #[tokio::test]
    async fn declined_confirmation_keeps_profile() -> anyhow::Result<()> {
        let base = serve(vec![("/profile.ps1", 200, b"new".to_vec())]).await;
        let (home, temp, fonts) = (
            tempfile::tempdir()?,
            tempfile::tempdir()?,
            tempfile::tempdir()?,
        );
        File::create(fonts.path().join("CaskaydiaCove-Bold.ttf"))?;
        let settings = settings_for(&base, fonts.path());
        let paths = Paths::with_profile(
            home.path().join("profile.ps1"),
            temp.path(),
            "cobalt2.omp.json",
        );
        write(&paths.profile, "mine")?;
        let fetcher = Fetcher::new(Duration::from_secs(5))?;

        let report = Installer::new(&admin_runner(), &fetcher, &AssumeNo, &settings, &paths)
            .run(now())
            .await?;

        assert_eq!(report.profile, None);
        assert_eq!(read_to_string(&paths.profile)?, "mine");
        assert_eq!(report.theme_config, None);
        assert!(report.font_files.is_empty());
        assert!(report.verification.passed());

        Ok(())
    }

    #[tokio::test]
    async fn confirmed_replacement_rotates_profile() -> anyhow::Result<()> {
        let base = serve(vec![("/profile.ps1", 200, b"new".to_vec())]).await;
        let (home, temp, fonts) = (
            tempfile::tempdir()?,
            tempfile::tempdir()?,
            tempfile::tempdir()?,
        );
        let settings = settings_for(&base, fonts.path());
        let paths = Paths::with_profile(
            home.path().join("profile.ps1"),
            temp.path(),
            "cobalt2.omp.json",
        );
        write(&paths.profile, "new")?;
        let fetcher = Fetcher::new(Duration::from_secs(5))?;

        let report = Installer::new(&admin_runner(), &fetcher, &AssumeYes, &settings, &paths)
            .run(now())
            .await?;

        assert!(matches!(report.profile, Some(ProfileOutcome::Replaced { .. })));
        assert_eq!(read_to_string(&paths.profile)?, "new");
        assert_eq!(read_dir(home.path())?.count(), 2);
        assert!(!report.verification.font);

        Ok(())
    }

    #[tokio::test]
    async fn missing_privilege_aborts_before_any_change() -> anyhow::Result<()> {
        let base = serve(vec![("/profile.ps1", 200, b"new".to_vec())]).await;
        let (home, temp, fonts) = (
            tempfile::tempdir()?,
            tempfile::tempdir()?,
            tempfile::tempdir()?,
        );
        let settings = settings_for(&base, fonts.path());
        let paths = Paths::with_profile(
            home.path().join("profile.ps1"),
            temp.path(),
            "cobalt2.omp.json",
        );
        let runner = ScriptedRunner::new()
            .respond("id -u", CommandOutput::ok("1000\n"))
            .respond("net session", CommandOutput::failed(2, "Access is denied."));
        let fetcher = Fetcher::new(Duration::from_secs(5))?;

        let error = Installer::new(&runner, &fetcher, &AssumeYes, &settings, &paths)
            .run(now())
            .await
            .unwrap_err();

        assert!(error.kind().is_fatal());
        assert!(!paths.profile.exists());
        assert_eq!(read_dir(home.path())?.count(), 0);

        Ok(())
    }
}
