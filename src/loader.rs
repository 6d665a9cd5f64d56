// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-session profile loader.
//!
//! Runs on every shell startup. Never fails: an offline machine, a cooling
//! down marker, or a broken update check only changes what gets logged, and
//! the session script is produced regardless.

use crate::{
    config::Settings,
    exec::CommandRunner,
    path::Paths,
    preflight::probe,
    profile::render_session_script,
    step::best_effort,
    update::{
        check_profile, check_shell, cooldown::UpdateMarker, fetch::Fetcher, ProfileOutcome,
        ReplacePolicy, ShellOutcome,
    },
};

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

/// What the update checks of one session amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// Probe failed, nothing was checked.
    Offline,

    /// Last check is more recent than the cooldown.
    CoolingDown,

    /// Both checks ran; `None` marks a check that failed.
    Checked {
        profile: Option<ProfileOutcome>,
        shell: Option<ShellOutcome>,
    },
}

/// Run the profile and shell update checks if they are due.
///
/// With `force` the cooldown is ignored. The marker is rewritten after the
/// checks ran, whatever their outcome.
#[instrument(skip(runner, fetcher, settings, paths), level = "debug")]
pub async fn run_update_checks(
    runner: &dyn CommandRunner,
    fetcher: &Fetcher,
    settings: &Settings,
    paths: &Paths,
    now: DateTime<Utc>,
    force: bool,
) -> CheckStatus {
    let timeout = settings.update.probe_timeout();
    if !probe(fetcher.client(), &settings.urls.probe, timeout).await.is_online() {
        warn!("cannot reach {}, skipping update checks", settings.urls.probe);
        return CheckStatus::Offline;
    }

    let marker = UpdateMarker::new(&paths.marker);
    if !force && !marker.is_due(now, settings.update.cooldown()) {
        debug!("update checks are cooling down");
        return CheckStatus::CoolingDown;
    }

    let profile = best_effort(
        "profile update check",
        check_profile(fetcher, &settings.urls.profile, paths, now, ReplacePolicy::IfChanged).await,
    );
    let shell = best_effort(
        "shell update check",
        check_shell(fetcher, runner, &settings.update, &settings.urls.shell_release).await,
    );
    best_effort("update marker", marker.touch(now));

    CheckStatus::Checked { profile, shell }
}

/// Run due update checks, then render the session script.
pub async fn load(
    runner: &dyn CommandRunner,
    fetcher: &Fetcher,
    settings: &Settings,
    paths: &Paths,
    now: DateTime<Utc>,
    force: bool,
) -> String {
    run_update_checks(runner, fetcher, settings, paths, now, force).await;
    render_session_script(runner, settings, paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exec::{fake::ScriptedRunner, CommandOutput},
        update::fetch::testing::serve,
    };
    use chrono::{TimeDelta, TimeZone};
    use pretty_assertions::assert_eq;
    use semver::Version;
    use std::{
        fs::{read_to_string, write},
        path::Path,
        time::Duration,
    };

    const PROFILE: &[u8] = b"function gs { git status }\n";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 15).unwrap()
    }

    fn settings_for(base: &str) -> Settings {
        let mut settings = Settings::default();
        settings.urls.profile = format!("{base}/profile.ps1");
        settings.urls.shell_release = format!("{base}/release");
        settings.urls.probe = base.to_string();
        settings.update.shell_version_command = ["pwsh", "--version"].into();

        settings
    }

    fn layout(home: &Path, temp: &Path) -> Paths {
        Paths::with_profile(home.join("profile.ps1"), temp, "cobalt2.omp.json")
    }

    fn shell_runner() -> ScriptedRunner {
        ScriptedRunner::new().respond("pwsh --version", CommandOutput::ok("7.4.1\n"))
    }

    async fn remote() -> String {
        serve(vec![
            ("/profile.ps1", 200, PROFILE.to_vec()),
            ("/release", 200, br#"{"tag_name": "v7.4.1", "assets": []}"#.to_vec()),
        ])
        .await
    }

    #[tokio::test]
    async fn due_checks_run_and_touch_marker() -> anyhow::Result<()> {
        let base = remote().await;
        let (home, temp) = (tempfile::tempdir()?, tempfile::tempdir()?);
        let paths = layout(home.path(), temp.path());
        let fetcher = Fetcher::new(Duration::from_secs(5))?;

        let settings = settings_for(&base);
        let status =
            run_update_checks(&shell_runner(), &fetcher, &settings, &paths, now(), false).await;

        assert_eq!(
            status,
            CheckStatus::Checked {
                profile: Some(ProfileOutcome::Created),
                shell: Some(ShellOutcome::UpToDate {
                    version: Version::new(7, 4, 1)
                }),
            }
        );
        assert_eq!(UpdateMarker::new(&paths.marker).last_checked(), Some(now()));

        Ok(())
    }

    #[tokio::test]
    async fn recent_marker_skips_checks_unless_forced() -> anyhow::Result<()> {
        let base = remote().await;
        let (home, temp) = (tempfile::tempdir()?, tempfile::tempdir()?);
        let paths = layout(home.path(), temp.path());
        let settings = settings_for(&base);
        let fetcher = Fetcher::new(Duration::from_secs(5))?;
        let runner = shell_runner();
        UpdateMarker::new(&paths.marker).touch(now() - TimeDelta::hours(1))?;

        let status = run_update_checks(&runner, &fetcher, &settings, &paths, now(), false).await;
        assert_eq!(status, CheckStatus::CoolingDown);
        assert!(!paths.profile.exists());
        assert!(runner.calls().is_empty());

        let status = run_update_checks(&runner, &fetcher, &settings, &paths, now(), true).await;
        assert!(matches!(status, CheckStatus::Checked { .. }));
        assert_eq!(read_to_string(&paths.profile)?.as_bytes(), PROFILE);

        Ok(())
    }

    #[tokio::test]
    async fn failed_profile_check_does_not_block_shell_check() -> anyhow::Result<()> {
        let base = serve(vec![(
            "/release",
            200,
            br#"{"tag_name": "v7.4.1", "assets": []}"#.to_vec(),
        )])
        .await;
        let (home, temp) = (tempfile::tempdir()?, tempfile::tempdir()?);
        let paths = layout(home.path(), temp.path());
        write(&paths.profile, "current")?;
        let fetcher = Fetcher::new(Duration::from_secs(5))?;

        let settings = settings_for(&base);
        let status =
            run_update_checks(&shell_runner(), &fetcher, &settings, &paths, now(), false).await;

        let CheckStatus::Checked { profile, shell } = status else {
            panic!("expected checks to run, got {status:?}");
        };
        assert_eq!(profile, None);
        assert!(shell.is_some());
        assert_eq!(read_to_string(&paths.profile)?, "current");
        assert!(UpdateMarker::new(&paths.marker).last_checked().is_some());

        Ok(())
    }

    #[tokio::test]
    async fn offline_skips_checks_but_still_renders_script() -> anyhow::Result<()> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let base = format!("http://{}", listener.local_addr()?);
        drop(listener);

        let (home, temp) = (tempfile::tempdir()?, tempfile::tempdir()?);
        let paths = layout(home.path(), temp.path());
        let settings = settings_for(&base);
        let fetcher = Fetcher::new(Duration::from_secs(5))?;
        let runner = shell_runner();

        let status = run_update_checks(&runner, &fetcher, &settings, &paths, now(), true).await;
        assert_eq!(status, CheckStatus::Offline);

        let script = load(&runner, &fetcher, &settings, &paths, now(), true).await;
        assert!(script.contains("function gs { git status @args }"));
        assert!(!runner.called("--version"));
        assert!(!paths.profile.exists());
        assert!(!paths.marker.exists());

        Ok(())
    }
}
