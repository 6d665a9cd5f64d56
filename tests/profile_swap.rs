// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use shellstrap::{
    path::Paths,
    update::{
        cooldown::UpdateMarker,
        replace::{backup_path, swap_in, ScratchFile},
        version::{compare, hash_file, Comparison, VersionInfo},
    },
};

use anyhow::Result;
use chrono::{TimeDelta, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::{
    fs::{read_dir, read_to_string, write},
    io::Write,
};

#[test]
fn repeated_swaps_keep_one_backup_per_replacement() -> Result<()> {
    let (home, temp) = (tempfile::tempdir()?, tempfile::tempdir()?);
    let paths = Paths::with_profile(home.path().join("profile.ps1"), temp.path(), "theme.omp.json");
    write(&paths.profile, "first")?;

    let first = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
    let second = first + TimeDelta::seconds(1);
    for (now, content) in [(first, "second"), (second, "third")] {
        let mut scratch = ScratchFile::create(&paths.scratch)?;
        scratch.write_all(content.as_bytes())?;
        swap_in(scratch, &paths.profile, now)?;
    }

    assert_eq!(read_to_string(&paths.profile)?, "third");
    assert_eq!(read_to_string(backup_path(&paths.profile, first))?, "first");
    assert_eq!(read_to_string(backup_path(&paths.profile, second))?, "second");
    assert_eq!(read_dir(home.path())?.count(), 3);
    assert_eq!(read_dir(temp.path())?.count(), 0);

    Ok(())
}

#[test]
fn swapped_profile_hashes_like_staged_content() -> Result<()> {
    let (home, temp) = (tempfile::tempdir()?, tempfile::tempdir()?);
    let paths = Paths::with_profile(home.path().join("profile.ps1"), temp.path(), "theme.omp.json");

    let mut scratch = ScratchFile::create(&paths.scratch)?;
    scratch.write_all(b"function gs { git status }\n")?;
    let staged = VersionInfo::Hash(scratch.hash()?);
    swap_in(scratch, &paths.profile, Utc::now())?;

    let local = VersionInfo::Hash(hash_file(&paths.profile)?);
    assert_eq!(compare(&local, &staged), Comparison::Same);

    Ok(())
}

#[test]
fn marker_gates_next_check_for_cooldown() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let paths = Paths::with_profile(temp.path().join("profile.ps1"), temp.path(), "theme.omp.json");
    let marker = UpdateMarker::new(&paths.marker);
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
    let cooldown = TimeDelta::hours(24);

    assert!(marker.is_due(now, cooldown));
    marker.touch(now)?;
    assert!(!marker.is_due(now + TimeDelta::hours(23), cooldown));
    assert!(marker.is_due(now + TimeDelta::hours(24), cooldown));

    Ok(())
}
