// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use shellstrap::{
    config::Settings,
    exec::SystemRunner,
    install::{AssumeYes, Confirmer, InquireConfirmer, Installer},
    loader::{load, run_update_checks, CheckStatus},
    path::{default_settings_path, Paths},
    update::fetch::Fetcher,
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::{io::ErrorKind, path::PathBuf, process::exit};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "shellstrap [options] <shellstrap-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to settings file to use instead of the default one.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = load_settings(self.config)?;
        debug!("effective settings:\n{settings}");
        let paths = Paths::resolve(&settings.paths, settings.urls.theme_file_name())?;
        let fetcher = Fetcher::new(settings.update.request_timeout())?;

        match self.command {
            Command::Install(opts) => run_install(opts, &settings, &paths, &fetcher).await,
            Command::Init(opts) => run_init(opts, &settings, &paths, &fetcher).await,
            Command::Update => run_update(&settings, &paths, &fetcher).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Provision this workstation: profile, packages, font, line editing.
    #[command(override_usage = "shellstrap install [options]")]
    Install(InstallOptions),

    /// Check for updates if due, then print the session script.
    #[command(override_usage = "shellstrap init [options]")]
    Init(InitOptions),

    /// Check profile and shell for updates right now.
    #[command(override_usage = "shellstrap update [options]")]
    Update,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InstallOptions {
    /// Replace an existing profile without asking.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Ignore the update cooldown.
    #[arg(short, long)]
    pub force: bool,
}

#[tokio::main]
async fn main() {
    // INVARIANT: Log to stderr, stdout of init is evaluated by the shell.
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn load_settings(path: Option<PathBuf>) -> Result<Settings> {
    let path = match path {
        Some(path) => path,
        None => default_settings_path()?,
    };

    match std::fs::read_to_string(&path) {
        Ok(data) => data
            .parse()
            .with_context(|| format!("invalid settings file {:?}", path.display())),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(Settings::default()),
        Err(error) => Err(error)
            .with_context(|| format!("cannot read settings file {:?}", path.display())),
    }
}

async fn run_install(
    opts: InstallOptions,
    settings: &Settings,
    paths: &Paths,
    fetcher: &Fetcher,
) -> Result<()> {
    let confirmer: &dyn Confirmer = if opts.yes { &AssumeYes } else { &InquireConfirmer };
    Installer::new(&SystemRunner, fetcher, confirmer, settings, paths)
        .run(Utc::now())
        .await?;

    Ok(())
}

async fn run_init(
    opts: InitOptions,
    settings: &Settings,
    paths: &Paths,
    fetcher: &Fetcher,
) -> Result<()> {
    let script = load(&SystemRunner, fetcher, settings, paths, Utc::now(), opts.force).await;
    print!("{script}");

    Ok(())
}

async fn run_update(settings: &Settings, paths: &Paths, fetcher: &Fetcher) -> Result<()> {
    match run_update_checks(&SystemRunner, fetcher, settings, paths, Utc::now(), true).await {
        CheckStatus::Checked { profile, shell } => {
            info!("profile: {profile:?}, shell: {shell:?}");
        }
        status => info!("no update check ran: {status:?}"),
    }

    Ok(())
}
