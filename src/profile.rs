// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Session script rendering.
//!
//! The session script is what the shell evaluates on every startup. It is made
//! of the static alias table, the editor alias, and the `init` output of the
//! prompt theme and directory-jump tools. Tool output is included verbatim; we
//! never look inside it.

use crate::{
    config::{CommandLine, Settings},
    exec::{first_available, Capability, CommandRunner},
    path::Paths,
};

use std::fmt::Write as _;
use tracing::{debug, instrument, warn};

/// Named shell function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alias {
    /// Function name.
    pub name: &'static str,

    /// Function body.
    pub expansion: &'static str,
}

impl Alias {
    const fn new(name: &'static str, expansion: &'static str) -> Self {
        Self { name, expansion }
    }

    /// Render as a PowerShell function definition.
    pub fn render(&self) -> String {
        format!("function {} {{ {} }}", self.name, self.expansion)
    }
}

/// Static alias table.
pub const ALIASES: &[Alias] = &[
    // Git.
    Alias::new("gs", "git status @args"),
    Alias::new("ga", "git add . @args"),
    Alias::new("gp", "git push @args"),
    Alias::new("gcl", "git clone @args"),
    Alias::new("gcom", "git add .; git commit -m \"$args\""),
    Alias::new("lazyg", "git add .; git commit -m \"$args\"; git push"),
    // Navigation.
    Alias::new("docs", "Set-Location -Path ([Environment]::GetFolderPath('MyDocuments'))"),
    Alias::new("dtop", "Set-Location -Path ([Environment]::GetFolderPath('Desktop'))"),
    Alias::new("mkcd", "param($dir) mkdir $dir -Force | Out-Null; Set-Location $dir"),
    Alias::new("la", "Get-ChildItem -Path . -Force | Format-Table -AutoSize"),
    Alias::new("ll", "Get-ChildItem -Path . -Force -Hidden | Format-Table -AutoSize"),
    // Files.
    Alias::new(
        "ff",
        "param($name) Get-ChildItem -Recurse -Filter \"*${name}*\" -ErrorAction SilentlyContinue | ForEach-Object { $_.FullName }",
    ),
    Alias::new(
        "touch",
        "param($file) if (Test-Path $file) { (Get-Item $file).LastWriteTime = Get-Date } else { '' | Out-File $file -Encoding ASCII }",
    ),
    Alias::new("nf", "param($name) New-Item -ItemType File -Path . -Name $name"),
    Alias::new(
        "unzip",
        "param($file) Expand-Archive -Path (Get-ChildItem -Path $pwd -Filter $file).FullName -DestinationPath $pwd",
    ),
    Alias::new(
        "grep",
        "param($regex, $dir) if ($dir) { Get-ChildItem $dir | Select-String $regex } else { $input | Select-String $regex }",
    ),
    Alias::new(
        "sed",
        "param($file, $find, $replace) (Get-Content $file).Replace(\"$find\", $replace) | Set-Content $file",
    ),
    Alias::new("head", "param($Path, $n = 10) Get-Content $Path -Head $n"),
    Alias::new(
        "tail",
        "param($Path, $n = 10, [switch]$f = $false) Get-Content $Path -Tail $n -Wait:$f",
    ),
    // System.
    Alias::new(
        "which",
        "param($name) Get-Command $name | Select-Object -ExpandProperty Definition",
    ),
    Alias::new(
        "export",
        "param($name, $value) Set-Item -Force -Path \"env:$name\" -Value $value",
    ),
    Alias::new(
        "pkill",
        "param($name) Get-Process $name -ErrorAction SilentlyContinue | Stop-Process",
    ),
    Alias::new("pgrep", "param($name) Get-Process $name"),
    Alias::new("k9", "Stop-Process -Name $args[0]"),
    Alias::new(
        "uptime",
        "$boot = (Get-CimInstance Win32_OperatingSystem).LastBootUpTime; \"Uptime: $((Get-Date) - $boot)\"",
    ),
    Alias::new("sysinfo", "Get-ComputerInfo"),
    Alias::new("flushdns", "Clear-DnsClientCache; Write-Host 'DNS cache flushed'"),
    Alias::new("reload-profile", "& $PROFILE"),
    Alias::new("admin", "Start-Process wt -Verb RunAs"),
    // Clipboard.
    Alias::new("cpy", "Set-Clipboard $args[0]"),
    Alias::new("pst", "Get-Clipboard"),
];

/// Pick the editor to alias.
///
/// Candidates are tested in order, first available wins. When none is
/// available, the last candidate is used anyway.
pub fn select_editor<'a, C>(capability: &C, candidates: &'a [String]) -> Option<&'a str>
where
    C: Capability + ?Sized,
{
    first_available(capability, candidates).or_else(|| candidates.last().map(String::as_str))
}

/// Capture the output of a tool's `init` verb.
///
/// Returns `None` if the tool is missing or its `init` fails.
pub fn tool_init(
    runner: &dyn CommandRunner,
    line: &CommandLine,
    vars: &[(&str, &str)],
) -> Option<String> {
    let program = line.program()?;
    if !runner.exists(program) {
        warn!("{program} not found, skipping its shell integration");
        return None;
    }

    match runner.run_line(line, vars) {
        Ok(output) if output.success() => Some(output.stdout),
        Ok(output) => {
            warn!("{program} init exited with {:?}: {}", output.code, output.stderr.trim());
            None
        }
        Err(error) => {
            warn!("{error}");
            None
        }
    }
}

/// Render the complete session script.
#[instrument(skip_all, level = "debug")]
pub fn render_session_script(
    runner: &dyn CommandRunner,
    settings: &Settings,
    paths: &Paths,
) -> String {
    let mut script = String::new();

    for alias in ALIASES {
        script.push_str(&alias.render());
        script.push('\n');
    }

    if let Some(editor) = select_editor(runner, &settings.editors) {
        debug!("selected editor {editor}");
        let _ = writeln!(script, "$EDITOR = '{}'", editor.replace('\'', "''"));
        script.push_str("Set-Alias -Name vim -Value $EDITOR\n");
        script.push_str("function edit { & $EDITOR @args }\n");
    }

    let config = paths.theme_config.to_string_lossy();
    let vars = [("config", config.as_ref())];
    for line in [&settings.tools.theme, &settings.tools.jump] {
        if let Some(output) = tool_init(runner, line, &vars) {
            script.push_str(&output);
            if !output.ends_with('\n') {
                script.push('\n');
            }
        }
    }

    script
}
