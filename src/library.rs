use crate::{
    error::ModError,
    metadata::{self, Metadata},
};
use serde::Serialize;
use std::{
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Empty marker file whose presence means the game skips the mod.
pub const SENTINEL_FILE: &str = "disable.it";

/// A single mod folder. Identity is the folder name; metadata is informational.
#[derive(Debug, Clone, Serialize)]
pub struct Mod {
    pub folder_name: String,
    pub metadata: Option<Metadata>,
}

impl Mod {
    pub fn new(folder_name: impl Into<String>, metadata: Option<Metadata>) -> Self {
        Self {
            folder_name: folder_name.into(),
            metadata,
        }
    }

    pub fn display_name(&self) -> &str {
        match &self.metadata {
            Some(meta) if !meta.name.trim().is_empty() => meta.name.trim(),
            _ => &self.folder_name,
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .map(|meta| meta.version.as_str())
            .filter(|version| !version.is_empty())
    }

    pub fn workshop_id(&self) -> Option<i64> {
        self.metadata
            .as_ref()
            .map(|meta| meta.id)
            .filter(|id| *id != 0)
    }
}

impl PartialEq for Mod {
    fn eq(&self, other: &Self) -> bool {
        self.folder_name == other.folder_name
    }
}

impl Eq for Mod {}

impl Hash for Mod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folder_name.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataPolicy {
    /// A broken descriptor leaves the mod without metadata and records a warning.
    #[default]
    Lenient,
    /// A broken descriptor fails the whole scan.
    Strict,
}

#[derive(Debug, Clone)]
pub struct ScannedMod {
    pub entry: Mod,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataWarning {
    pub folder_name: String,
    pub message: String,
}

/// Everything one scan of a mods folder found.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub mods: Vec<ScannedMod>,
    pub warnings: Vec<MetadataWarning>,
}

pub fn sentinel_path(mods_root: &Path, folder_name: &str) -> PathBuf {
    mods_root.join(folder_name).join(SENTINEL_FILE)
}

/// `Err` when the sentinel's presence cannot be determined, e.g. an unreadable folder.
pub fn is_disabled_on_disk(mods_root: &Path, folder_name: &str) -> Result<bool, ModError> {
    let path = sentinel_path(mods_root, folder_name);
    path.try_exists()
        .map_err(|source| ModError::Sentinel { path, source })
}

/// Lists the immediate subfolders of `mods_root` as mods.
pub fn scan(mods_root: &Path, policy: MetadataPolicy) -> Result<Roster, ModError> {
    if !mods_root.is_dir() {
        return Err(ModError::ModsRootNotFound {
            path: mods_root.to_path_buf(),
        });
    }

    let mut roster = Roster::default();
    for entry in WalkDir::new(mods_root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            // Only the root itself failing aborts the scan; a bad child is skipped.
            Err(err) if err.depth() > 0 => {
                let folder_name = err
                    .path()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                roster.warnings.push(MetadataWarning {
                    folder_name,
                    message: format!("{err}; skipped"),
                });
                continue;
            }
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| mods_root.to_path_buf());
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                return Err(ModError::Io { path, source });
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(folder_name) = entry.file_name().to_str().map(str::to_string) else {
            roster.warnings.push(MetadataWarning {
                folder_name: entry.file_name().to_string_lossy().into_owned(),
                message: "folder name is not valid UTF-8; skipped".to_string(),
            });
            continue;
        };

        let metadata = match metadata::read_metadata(entry.path()) {
            Ok(metadata) => metadata,
            Err(err @ (ModError::InvalidMetadata { .. } | ModError::Io { .. }))
                if policy == MetadataPolicy::Lenient =>
            {
                roster.warnings.push(MetadataWarning {
                    folder_name: folder_name.clone(),
                    message: err.to_string(),
                });
                None
            }
            Err(err) => return Err(err),
        };

        let disabled = match is_disabled_on_disk(mods_root, &folder_name) {
            Ok(disabled) => disabled,
            Err(err) => {
                roster.warnings.push(MetadataWarning {
                    folder_name,
                    message: format!("{err}; skipped"),
                });
                continue;
            }
        };
        let enabled = !disabled;
        roster.mods.push(ScannedMod {
            entry: Mod::new(folder_name, metadata),
            enabled,
        });
    }

    Ok(roster)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metadata::METADATA_FILE;
    use std::fs;

    pub(crate) fn make_mod(root: &Path, folder: &str, disabled: bool, name: Option<&str>) {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        if disabled {
            fs::write(dir.join(SENTINEL_FILE), b"").unwrap();
        }
        if let Some(name) = name {
            fs::write(
                dir.join(METADATA_FILE),
                format!("<metadata><name>{name}</name><id>7</id></metadata>"),
            )
            .unwrap();
        }
    }

    fn named(folder: &str, name: &str) -> Mod {
        Mod::new(
            folder,
            Some(Metadata {
                name: name.to_string(),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn display_name_prefers_metadata() {
        assert_eq!(named("folder_1", "Pretty").display_name(), "Pretty");
        assert_eq!(named("folder_1", "   ").display_name(), "folder_1");
        assert_eq!(Mod::new("folder_1", None).display_name(), "folder_1");
    }

    #[test]
    fn identity_ignores_metadata() {
        assert_eq!(named("a", "One"), named("a", "Two"));
        assert_ne!(Mod::new("a", None), Mod::new("A", None));
    }

    #[test]
    fn scan_reads_sentinels_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        make_mod(dir.path(), "AFoo", false, Some("Foo"));
        make_mod(dir.path(), "BBar", true, None);
        fs::write(dir.path().join("readme.txt"), "not a mod").unwrap();

        let mut roster = scan(dir.path(), MetadataPolicy::Lenient).unwrap();
        roster
            .mods
            .sort_by(|a, b| a.entry.folder_name.cmp(&b.entry.folder_name));
        assert_eq!(roster.mods.len(), 2);
        assert_eq!(roster.mods[0].entry.folder_name, "AFoo");
        assert!(roster.mods[0].enabled);
        assert_eq!(roster.mods[0].entry.display_name(), "Foo");
        assert_eq!(roster.mods[0].entry.workshop_id(), Some(7));
        assert_eq!(roster.mods[1].entry.folder_name, "BBar");
        assert!(!roster.mods[1].enabled);
        assert!(roster.mods[1].entry.metadata.is_none());
    }

    #[test]
    fn scan_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("mods");
        assert!(matches!(
            scan(&missing, MetadataPolicy::Lenient),
            Err(ModError::ModsRootNotFound { .. })
        ));
    }

    #[test]
    fn scan_root_that_is_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mods");
        fs::write(&file, "").unwrap();
        assert!(matches!(
            scan(&file, MetadataPolicy::Lenient),
            Err(ModError::ModsRootNotFound { .. })
        ));
    }

    #[test]
    fn lenient_scan_degrades_broken_metadata() {
        let dir = tempfile::tempdir().unwrap();
        make_mod(dir.path(), "Broken", false, None);
        fs::write(dir.path().join("Broken").join(METADATA_FILE), "<oops>").unwrap();

        let roster = scan(dir.path(), MetadataPolicy::Lenient).unwrap();
        assert_eq!(roster.mods.len(), 1);
        assert!(roster.mods[0].entry.metadata.is_none());
        assert_eq!(roster.warnings.len(), 1);
        assert_eq!(roster.warnings[0].folder_name, "Broken");
    }

    #[test]
    fn strict_scan_fails_on_broken_metadata() {
        let dir = tempfile::tempdir().unwrap();
        make_mod(dir.path(), "Broken", false, None);
        fs::write(dir.path().join("Broken").join(METADATA_FILE), "<oops>").unwrap();

        assert!(matches!(
            scan(dir.path(), MetadataPolicy::Strict),
            Err(ModError::InvalidMetadata { .. })
        ));
    }

    #[test]
    fn lenient_scan_degrades_unreadable_metadata() {
        let dir = tempfile::tempdir().unwrap();
        make_mod(dir.path(), "AFoo", false, Some("Foo"));
        make_mod(dir.path(), "BBar", false, None);
        fs::create_dir(dir.path().join("BBar").join(METADATA_FILE)).unwrap();

        let mut roster = scan(dir.path(), MetadataPolicy::Lenient).unwrap();
        roster
            .mods
            .sort_by(|a, b| a.entry.folder_name.cmp(&b.entry.folder_name));
        assert_eq!(roster.mods.len(), 2);
        assert!(roster.mods[1].entry.metadata.is_none());
        assert_eq!(roster.warnings.len(), 1);
        assert_eq!(roster.warnings[0].folder_name, "BBar");

        assert!(matches!(
            scan(dir.path(), MetadataPolicy::Strict),
            Err(ModError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn scan_skips_dangling_symlink() {
        let dir = tempfile::tempdir().unwrap();
        make_mod(dir.path(), "AFoo", false, None);
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("stale_link"))
            .unwrap();

        let roster = scan(dir.path(), MetadataPolicy::Lenient).unwrap();
        assert_eq!(roster.mods.len(), 1);
        assert_eq!(roster.mods[0].entry.folder_name, "AFoo");
        assert_eq!(roster.warnings.len(), 1);
        assert_eq!(roster.warnings[0].folder_name, "stale_link");
    }

    #[test]
    fn sentinel_check_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        make_mod(dir.path(), "AFoo", true, None);
        make_mod(dir.path(), "BBar", false, None);
        fs::write(dir.path().join("not_a_folder"), b"").unwrap();

        assert!(is_disabled_on_disk(dir.path(), "AFoo").unwrap());
        assert!(!is_disabled_on_disk(dir.path(), "BBar").unwrap());
        assert!(!is_disabled_on_disk(dir.path(), "Missing").unwrap());
        assert!(matches!(
            is_disabled_on_disk(dir.path(), "not_a_folder"),
            Err(ModError::Sentinel { .. })
        ));
    }

    #[test]
    fn scan_does_not_recurse() {
        let dir = tempfile::tempdir().unwrap();
        make_mod(dir.path(), "Outer", false, None);
        make_mod(&dir.path().join("Outer"), "Inner", false, None);

        let roster = scan(dir.path(), MetadataPolicy::Lenient).unwrap();
        assert_eq!(roster.mods.len(), 1);
        assert_eq!(roster.mods[0].entry.folder_name, "Outer");
    }
}
