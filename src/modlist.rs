//! Mod list snapshots: one enabled folder name per line.

use crate::{
    engine::{Partition, RestoreOutcome},
    error::ModError,
    library::Mod,
    sorted::SortedMods,
};
use anyhow::{Context, Result};
use std::{
    collections::HashSet,
    fs,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

pub const LINE_ENDING: &str = if cfg!(windows) { "\r\n" } else { "\n" };
pub const MODLIST_EXTENSION: &str = "txt";

/// Folder names of `enabled`, sorted ordinally and joined by the platform line ending.
pub fn serialize<'a>(enabled: impl IntoIterator<Item = &'a Mod>) -> String {
    let mut names: Vec<&str> = enabled
        .into_iter()
        .map(|item| item.folder_name.as_str())
        .collect();
    names.sort_unstable();
    names.dedup();
    names.join(LINE_ENDING)
}

/// Reads snapshot lines. Blank lines are skipped; invalid UTF-8 is an error.
pub fn parse_snapshot<R: Read>(reader: R) -> Result<Vec<String>, ModError> {
    let mut names = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line.map_err(|source| ModError::SnapshotRead { source })?;
        if line.trim().is_empty() {
            continue;
        }
        names.push(line);
    }
    Ok(names)
}

/// Builds a fresh partition from `roster`: listed folders enabled, the rest disabled.
pub fn restore<'a, S: AsRef<str>>(
    names: &[S],
    roster: impl IntoIterator<Item = &'a Mod>,
) -> (Partition, RestoreOutcome) {
    let wanted: HashSet<&str> = names.iter().map(|name| name.as_ref()).collect();
    let mut seen = HashSet::new();
    let mut enabled = Vec::new();
    let mut disabled = Vec::new();

    for item in roster {
        if wanted.contains(item.folder_name.as_str()) {
            seen.insert(item.folder_name.clone());
            enabled.push(item.clone());
        } else {
            disabled.push(item.clone());
        }
    }

    let mut missing: Vec<String> = Vec::new();
    for name in names {
        let name = name.as_ref();
        if !seen.contains(name) && !missing.iter().any(|existing| existing == name) {
            missing.push(name.to_string());
        }
    }

    (
        Partition {
            enabled: SortedMods::from_unsorted(enabled),
            disabled: SortedMods::from_unsorted(disabled),
        },
        RestoreOutcome { missing },
    )
}

pub fn write_modlist<'a>(path: &Path, enabled: impl IntoIterator<Item = &'a Mod>) -> Result<()> {
    let parent = path.parent().context("mod list parent dir")?;
    fs::create_dir_all(parent).context("create mod list dir")?;
    let file_name = path.file_name().context("mod list filename")?;
    let mut temp_name = std::ffi::OsString::from(file_name);
    temp_name.push(".tmp");
    let temp_path = parent.join(temp_name);
    fs::write(&temp_path, serialize(enabled)).context("write mod list temp")?;
    fs::rename(&temp_path, path).context("finalize mod list")?;
    Ok(())
}

pub fn read_modlist(path: &Path) -> Result<Vec<String>> {
    let file = fs::File::open(path)
        .with_context(|| format!("open mod list {}", path.display()))?;
    let names = parse_snapshot(file)
        .with_context(|| format!("parse mod list {}", path.display()))?;
    Ok(names)
}

pub fn default_modlist_path(dir: &Path) -> PathBuf {
    dir.join(format!("modlist-{}.{MODLIST_EXTENSION}", export_timestamp()))
}

fn export_timestamp() -> String {
    let now = time::OffsetDateTime::now_utc();
    let format = time::macros::format_description!("[year][month][day]-[hour][minute][second]");
    now.format(&format)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
