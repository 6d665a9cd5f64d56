// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Font presence check and per-user installation.
//!
//! A font counts as installed when any font directory holds a file whose name
//! starts with the configured prefix. Installation extracts every TrueType and
//! OpenType file of the font archive into the per-user font directory. Windows
//! additionally needs each file registered under the per-user font registry
//! key before applications can see it.

use crate::{
    config::FontSettings,
    exec::{CommandRunner, ExecError},
    step::{Classify, FailureKind},
    update::fetch::{FetchError, Fetcher},
};

use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Registry key holding per-user font registrations.
pub const FONT_REGISTRY_KEY: &str = r"HKCU\Software\Microsoft\Windows NT\CurrentVersion\Fonts";

const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

/// Per-user font directory.
pub fn user_font_dir(settings: &FontSettings) -> Option<PathBuf> {
    if let Some(dir) = &settings.install_dir {
        return Some(dir.clone());
    }

    if cfg!(windows) {
        dirs::data_local_dir().map(|dir| dir.join("Microsoft").join("Windows").join("Fonts"))
    } else {
        dirs::font_dir()
    }
}

/// Every directory the platform loads fonts from.
pub fn font_dirs(settings: &FontSettings) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if cfg!(windows) {
        if let Some(windir) = std::env::var_os("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    } else {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
    }
    dirs.extend(user_font_dir(settings));

    dirs
}

/// Check if any of `dirs` holds a font file starting with `prefix`.
pub fn is_installed(prefix: &str, dirs: &[PathBuf]) -> bool {
    dirs.iter().any(|dir| {
        let pattern = format!(
            "{}/**/{}*",
            glob::Pattern::escape(&dir.to_string_lossy()),
            glob::Pattern::escape(prefix)
        );
        match glob::glob(&pattern) {
            Ok(paths) => paths.flatten().any(|path| is_font_file(&path)),
            Err(error) => {
                debug!("skip font directory {:?}: {error}", dir.display());
                false
            }
        }
    })
}

/// Extract every font file of the zip archive at `archive` into `dest`.
///
/// Archive directories are flattened, and entries with unsafe paths are
/// skipped. Returns the extracted paths.
///
/// # Errors
///
/// - Return [`FontError::Io`] if the archive or a destination file cannot be
///   opened.
/// - Return [`FontError::Zip`] if the archive is malformed.
pub fn extract_fonts(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive).map_err(|source| FontError::io(archive, source))?;
    let mut archive = zip::ZipArchive::new(file)?;
    mkdirp::mkdirp(dest).map_err(|source| FontError::io(dest, source))?;

    let mut extracted = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(name) = entry.enclosed_name() else {
            warn!("skipping zip entry with unsafe path");
            continue;
        };
        if entry.is_dir() || !is_font_file(&name) {
            continue;
        }
        let Some(file_name) = name.file_name() else {
            continue;
        };

        let out_path = dest.join(file_name);
        let mut out = File::create(&out_path).map_err(|source| FontError::io(&out_path, source))?;
        std::io::copy(&mut entry, &mut out).map_err(|source| FontError::io(&out_path, source))?;
        debug!("extracted {:?}", out_path.display());
        extracted.push(out_path);
    }

    Ok(extracted)
}

/// Register font files under the per-user font registry key.
///
/// # Errors
///
/// - Return [`FontError::Exec`] if `reg` cannot be run.
/// - Return [`FontError::Register`] if `reg` exits nonzero.
pub fn register_fonts(runner: &dyn CommandRunner, files: &[PathBuf]) -> Result<()> {
    for file in files {
        let value = registry_value_name(file);
        let args = [
            "add",
            FONT_REGISTRY_KEY,
            "/v",
            value.as_str(),
            "/t",
            "REG_SZ",
            "/d",
            file.to_string_lossy().as_ref(),
            "/f",
        ]
        .map(String::from);

        let output = runner.run("reg", &args)?;
        if !output.success() {
            return Err(FontError::Register {
                file: file.clone(),
                stderr: output.stderr.trim().to_string(),
            });
        }
    }

    Ok(())
}

/// Download and install the configured font for the current user.
///
/// # Errors
///
/// - Return [`FontError::NoFontDir`] if no per-user font directory exists.
/// - Return [`FontError::Fetch`] if the archive cannot be downloaded.
/// - Return any extraction or registration error.
#[instrument(skip(fetcher, runner, settings), level = "debug")]
pub async fn install(
    fetcher: &Fetcher,
    runner: &dyn CommandRunner,
    settings: &FontSettings,
    archive_url: &str,
) -> Result<Vec<PathBuf>> {
    let dest = user_font_dir(settings).ok_or(FontError::NoFontDir)?;
    let mut archive = tempfile::Builder::new()
        .prefix("shellstrap-font-")
        .suffix(".zip")
        .tempfile()
        .map_err(|source| FontError::io(&std::env::temp_dir(), source))?;

    info!("downloading font {}", settings.name);
    fetcher
        .download_into(archive_url, archive.as_file_mut())
        .await?;

    let files = extract_fonts(archive.path(), &dest)?;
    if cfg!(windows) {
        register_fonts(runner, &files)?;
    }
    info!("installed {} font files for {}", files.len(), settings.name);

    Ok(files)
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FONT_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

fn registry_value_name(file: &Path) -> String {
    let stem = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let kind = match file.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("otf") => "OpenType",
        _ => "TrueType",
    };

    format!("{stem} ({kind})")
}

/// Font installation error types.
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    /// No per-user font directory on this platform.
    #[error("cannot determine per-user font directory")]
    NoFontDir,

    /// Font archive could not be downloaded.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Font archive is malformed.
    #[error("failed to read font archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// File could not be opened or written.
    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registry tool could not be run.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Registry tool exited nonzero.
    #[error("failed to register font {file:?}: {stderr}")]
    Register { file: PathBuf, stderr: String },
}

impl FontError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Classify for FontError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Fetch(error) => error.kind(),
            Self::NoFontDir | Self::Io { .. } => FailureKind::Filesystem,
            Self::Zip(_) | Self::Exec(_) | Self::Register { .. } => FailureKind::Install,
        }
    }
}

/// Friendly result alias :3
type Result<T, E = FontError> = std::result::Result<T, E>;
