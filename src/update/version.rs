// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version identifiers and their comparison.
//!
//! The profile is identified by the SHA-256 hash of its content, so two
//! profiles are either the same or different. The shell binary is identified
//! by a semantic version, so a remote release can also be older.

use semver::Version;
use sha2::{Digest, Sha256};
use std::{fmt, io::Read, path::Path};

/// Version identifier of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionInfo {
    /// Lowercase hex SHA-256 of the artifact content.
    Hash(String),

    /// Semantic version of a release.
    Semver(Version),
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hash(hash) => fmt.write_str(hash),
            Self::Semver(version) => write!(fmt, "{version}"),
        }
    }
}

/// Outcome of comparing a local and a remote version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Same,
    RemoteNewer,
    RemoteOlder,
}

/// Compare local version against remote version.
///
/// Hashes have no order, so any difference counts as [`Comparison::RemoteNewer`].
/// Mixed identifier kinds cannot be ordered either and are treated the same
/// way.
pub fn compare(local: &VersionInfo, remote: &VersionInfo) -> Comparison {
    match (local, remote) {
        (VersionInfo::Hash(local), VersionInfo::Hash(remote)) => {
            if local.eq_ignore_ascii_case(remote) {
                Comparison::Same
            } else {
                Comparison::RemoteNewer
            }
        }
        (VersionInfo::Semver(local), VersionInfo::Semver(remote)) => {
            match remote.cmp_precedence(local) {
                std::cmp::Ordering::Greater => Comparison::RemoteNewer,
                std::cmp::Ordering::Less => Comparison::RemoteOlder,
                std::cmp::Ordering::Equal => Comparison::Same,
            }
        }
        _ => Comparison::RemoteNewer,
    }
}

/// Parse a version string or release tag into a semantic version.
///
/// Accepts a leading `v`, surrounding whitespace, and partial versions such
/// as `7` or `7.4`, which are padded with zeros.
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let suffix_idx = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(suffix_idx);
    let mut parts = core.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = parts.next().map(str::parse::<u64>).transpose().ok()?;
    let patch = parts.next().map(str::parse::<u64>).transpose().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let normalized = format!(
        "{major}.{}.{}{suffix}",
        minor.unwrap_or(0),
        patch.unwrap_or(0)
    );
    Version::parse(&normalized).ok()
}

/// Hash bytes into lowercase hex SHA-256.
pub fn sha256_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("{:x}", Sha256::digest(bytes.as_ref()))
}

/// Hash file content into lowercase hex SHA-256.
///
/// # Errors
///
/// - Return [`std::io::Error`] if the file cannot be opened or read.
pub fn hash_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path.as_ref())?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    fn semver(version: &str) -> VersionInfo {
        VersionInfo::Semver(parse_version(version).unwrap())
    }

    #[test_case("1.2.0", "1.3.0", Comparison::RemoteNewer; "minor bump")]
    #[test_case("1.2.0", "1.1.9", Comparison::RemoteOlder; "older patch line")]
    #[test_case("1.2.0", "1.2.0", Comparison::Same; "identical")]
    #[test_case("7.2.0", "v7.4.1", Comparison::RemoteNewer; "release tag")]
    #[test_case("7.4", "7.4.0", Comparison::Same; "partial version")]
    #[test_case("7.4.0-preview.1", "7.4.0", Comparison::RemoteNewer; "release after preview")]
    #[test]
    fn compare_semver(local: &str, remote: &str, expect: Comparison) {
        assert_eq!(compare(&semver(local), &semver(remote)), expect);
    }

    #[test]
    fn compare_hash_is_reflexive() {
        let hash = VersionInfo::Hash("abc123".into());
        assert_eq!(compare(&hash, &hash), Comparison::Same);
        assert_eq!(
            compare(&hash, &VersionInfo::Hash("ABC123".into())),
            Comparison::Same
        );
        assert_eq!(
            compare(&hash, &VersionInfo::Hash("def456".into())),
            Comparison::RemoteNewer
        );
    }

    #[test]
    fn parse_version_rejects_garbage() {
        assert_eq!(parse_version("PowerShell"), None);
        assert_eq!(parse_version("1.2.3.4"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn hash_file_matches_hash_of_bytes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("profile.ps1");
        std::fs::write(&path, "Set-Alias ll Get-ChildItem\n")?;
        assert_eq!(hash_file(&path)?, sha256_hex("Set-Alias ll Get-ChildItem\n"));
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        Ok(())
    }
}
