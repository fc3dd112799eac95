//! The enabled/disabled partition of a mods folder and its reconciliation to disk.
//!
//! Nothing here touches the filesystem except `load_roster` (a scan) and
//! `apply` (sentinel writes). Every mutating call returns a [`ChangeSet`] so the
//! caller knows what to re-render.

use crate::{
    error::{ModError, SentinelAction, SentinelFailure},
    game,
    library::{self, MetadataPolicy, MetadataWarning, Mod},
    modlist,
    sorted::SortedMods,
};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModChange {
    Reloaded { enabled: usize, disabled: usize },
    Moved { folder_name: String, to: Side },
}

pub type ChangeSet = Vec<ModChange>;

/// Result of restoring a mod list: names that matched nothing installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub missing: Vec<String>,
}

/// What `apply` did, and what it could not do.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub created: Vec<String>,
    pub removed: Vec<String>,
    pub failures: Vec<SentinelFailure>,
}

impl ApplyReport {
    pub fn changed(&self) -> usize {
        self.created.len() + self.removed.len()
    }

    pub fn into_result(self) -> Result<Self, ModError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(ModError::ApplyIncomplete {
                failures: self.failures,
            })
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub enabled: SortedMods,
    pub disabled: SortedMods,
}

#[derive(Debug, Default)]
pub struct ModState {
    partition: Partition,
    mods_root: Option<PathBuf>,
    warnings: Vec<MetadataWarning>,
}

impl ModState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.mods_root.is_some()
    }

    pub fn enabled(&self) -> &SortedMods {
        &self.partition.enabled
    }

    pub fn disabled(&self) -> &SortedMods {
        &self.partition.disabled
    }

    pub fn warnings(&self) -> &[MetadataWarning] {
        &self.warnings
    }

    /// Every mod from the last load, in display order.
    pub fn roster(&self) -> SortedMods {
        SortedMods::from_unsorted(
            self.partition
                .enabled
                .iter()
                .chain(self.partition.disabled.iter())
                .cloned(),
        )
    }

    pub fn find(&self, folder_name: &str) -> Option<&Mod> {
        self.partition
            .enabled
            .find_by_folder(folder_name)
            .or_else(|| self.partition.disabled.find_by_folder(folder_name))
    }

    pub fn side_of(&self, folder_name: &str) -> Option<Side> {
        if self.partition.enabled.find_by_folder(folder_name).is_some() {
            Some(Side::Enabled)
        } else if self.partition.disabled.find_by_folder(folder_name).is_some() {
            Some(Side::Disabled)
        } else {
            None
        }
    }

    pub fn load_roster(&mut self, mods_root: &Path) -> Result<ChangeSet, ModError> {
        self.load_roster_with(mods_root, MetadataPolicy::Lenient)
    }

    /// Rescans `mods_root` and replaces the partition. On error the previous
    /// partition is kept.
    pub fn load_roster_with(
        &mut self,
        mods_root: &Path,
        policy: MetadataPolicy,
    ) -> Result<ChangeSet, ModError> {
        let roster = library::scan(mods_root, policy)?;
        let (enabled, disabled): (Vec<_>, Vec<_>) =
            roster.mods.into_iter().partition(|scanned| scanned.enabled);

        self.partition = Partition {
            enabled: SortedMods::from_unsorted(enabled.into_iter().map(|scanned| scanned.entry)),
            disabled: SortedMods::from_unsorted(
                disabled.into_iter().map(|scanned| scanned.entry),
            ),
        };
        self.mods_root = Some(mods_root.to_path_buf());
        self.warnings = roster.warnings;
        Ok(vec![self.reloaded()])
    }

    pub fn enable<'a>(&mut self, mods: impl IntoIterator<Item = &'a Mod>) -> ChangeSet {
        self.move_to(mods, Side::Enabled)
    }

    pub fn disable<'a>(&mut self, mods: impl IntoIterator<Item = &'a Mod>) -> ChangeSet {
        self.move_to(mods, Side::Disabled)
    }

    /// Like [`ModState::enable`] but by folder name. Unknown names are returned.
    pub fn enable_by_name<S: AsRef<str>>(&mut self, names: &[S]) -> (ChangeSet, Vec<String>) {
        self.move_by_name(names, Side::Enabled)
    }

    pub fn disable_by_name<S: AsRef<str>>(&mut self, names: &[S]) -> (ChangeSet, Vec<String>) {
        self.move_by_name(names, Side::Disabled)
    }

    fn move_by_name<S: AsRef<str>>(&mut self, names: &[S], to: Side) -> (ChangeSet, Vec<String>) {
        let mut found = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            match self.find(name.as_ref()) {
                Some(item) => found.push(item.clone()),
                None => unknown.push(name.as_ref().to_string()),
            }
        }
        (self.move_to(found.iter(), to), unknown)
    }

    fn move_to<'a>(&mut self, mods: impl IntoIterator<Item = &'a Mod>, to: Side) -> ChangeSet {
        let (from, into) = match to {
            Side::Enabled => (&mut self.partition.disabled, &mut self.partition.enabled),
            Side::Disabled => (&mut self.partition.enabled, &mut self.partition.disabled),
        };

        let mut changes = Vec::new();
        for item in mods {
            let Some(moved) = from.remove(item) else {
                continue;
            };
            let folder_name = moved.folder_name.clone();
            into.insert(moved);
            changes.push(ModChange::Moved { folder_name, to });
        }
        changes
    }

    /// Replaces the partition so that exactly the listed folders are enabled.
    pub fn restore_snapshot<S: AsRef<str>>(&mut self, names: &[S]) -> (ChangeSet, RestoreOutcome) {
        let roster = self.roster();
        let (partition, outcome) = modlist::restore(names, roster.iter());
        self.partition = partition;
        (vec![self.reloaded()], outcome)
    }

    /// Writes the partition to disk as sentinel files under `<game_root>/mods`.
    ///
    /// Each mod's sentinel is checked before writing, so mods already matching
    /// are left alone. A failure on one mod is recorded and the loop continues.
    pub fn apply(&self, game_root: &Path) -> Result<ApplyReport, ModError> {
        if !game_root.is_dir() {
            return Err(ModError::GameRootNotFound {
                path: game_root.to_path_buf(),
            });
        }
        let mods_root = game::mods_root(game_root);
        if !mods_root.is_dir() {
            return Err(ModError::ModsRootNotFound { path: mods_root });
        }

        let mut report = ApplyReport::default();
        for item in &self.partition.enabled {
            let path = library::sentinel_path(&mods_root, &item.folder_name);
            match path.try_exists() {
                Ok(true) => {}
                Ok(false) => continue,
                Err(source) => {
                    report.failures.push(SentinelFailure {
                        folder_name: item.folder_name.clone(),
                        action: SentinelAction::Remove,
                        error: ModError::Sentinel { path, source },
                    });
                    continue;
                }
            }
            match fs::remove_file(&path) {
                Ok(()) => report.removed.push(item.folder_name.clone()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(source) => report.failures.push(SentinelFailure {
                    folder_name: item.folder_name.clone(),
                    action: SentinelAction::Remove,
                    error: ModError::Sentinel { path, source },
                }),
            }
        }

        for item in &self.partition.disabled {
            let path = library::sentinel_path(&mods_root, &item.folder_name);
            match path.try_exists() {
                Ok(false) => {}
                Ok(true) => continue,
                Err(source) => {
                    report.failures.push(SentinelFailure {
                        folder_name: item.folder_name.clone(),
                        action: SentinelAction::Create,
                        error: ModError::Sentinel { path, source },
                    });
                    continue;
                }
            }
            match fs::write(&path, b"") {
                Ok(()) => report.created.push(item.folder_name.clone()),
                Err(source) => report.failures.push(SentinelFailure {
                    folder_name: item.folder_name.clone(),
                    action: SentinelAction::Create,
                    error: ModError::Sentinel { path, source },
                }),
            }
        }

        Ok(report)
    }

    fn reloaded(&self) -> ModChange {
        ModChange::Reloaded {
            enabled: self.partition.enabled.len(),
            disabled: self.partition.disabled.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{tests::make_mod, SENTINEL_FILE};
    use std::collections::HashSet;

    struct Fixture {
        _dir: tempfile::TempDir,
        game_root: PathBuf,
        mods_root: PathBuf,
    }

    fn fixture(mods: &[(&str, bool)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let game_root = dir.path().join("game");
        let mods_root = game_root.join("mods");
        fs::create_dir_all(&mods_root).unwrap();
        for (folder, disabled) in mods {
            make_mod(&mods_root, folder, *disabled, None);
        }
        Fixture {
            _dir: dir,
            game_root,
            mods_root,
        }
    }

    fn loaded(fx: &Fixture) -> ModState {
        let mut state = ModState::new();
        state.load_roster(&fx.mods_root).unwrap();
        state
    }

    #[test]
    fn load_partitions_by_sentinel() {
        let fx = fixture(&[("AFoo", false), ("BBar", true)]);
        let mut state = ModState::new();
        assert!(!state.is_loaded());
        let changes = state.load_roster(&fx.mods_root).unwrap();

        assert_eq!(
            changes,
            vec![ModChange::Reloaded {
                enabled: 1,
                disabled: 1
            }]
        );
        assert_eq!(state.enabled().folder_names(), vec!["AFoo"]);
        assert_eq!(state.disabled().folder_names(), vec!["BBar"]);
        assert!(state.is_loaded());
    }

    #[test]
    fn load_covers_roster_exactly_once() {
        let fx = fixture(&[("a", false), ("b", true), ("c", false), ("d", true), ("e", true)]);
        let state = loaded(&fx);
        let enabled: HashSet<&str> = state.enabled().folder_names().into_iter().collect();
        let disabled: HashSet<&str> = state.disabled().folder_names().into_iter().collect();
        assert!(enabled.is_disjoint(&disabled));
        let all: HashSet<&str> = enabled.union(&disabled).copied().collect();
        assert_eq!(all, HashSet::from(["a", "b", "c", "d", "e"]));
    }

    #[test]
    fn failed_load_keeps_previous_partition() {
        let fx = fixture(&[("AFoo", false)]);
        let mut state = loaded(&fx);
        assert!(state.load_roster(&fx.mods_root.join("nope")).is_err());
        assert_eq!(state.enabled().folder_names(), vec!["AFoo"]);
    }

    #[test]
    fn disable_moves_into_sorted_position() {
        let fx = fixture(&[("AFoo", false), ("BBar", true)]);
        let mut state = loaded(&fx);
        let afoo = state.find("AFoo").cloned().unwrap();

        let changes = state.disable([&afoo]);
        assert_eq!(
            changes,
            vec![ModChange::Moved {
                folder_name: "AFoo".to_string(),
                to: Side::Disabled
            }]
        );
        assert!(state.enabled().is_empty());
        assert_eq!(state.disabled().folder_names(), vec!["AFoo", "BBar"]);
        assert_eq!(state.side_of("AFoo"), Some(Side::Disabled));
    }

    #[test]
    fn toggles_are_idempotent() {
        let fx = fixture(&[("AFoo", false), ("BBar", true)]);
        let mut state = loaded(&fx);
        let afoo = state.find("AFoo").cloned().unwrap();
        let bbar = state.find("BBar").cloned().unwrap();

        assert!(state.enable([&afoo]).is_empty());
        assert!(state.disable([&bbar]).is_empty());
        assert_eq!(state.enabled().folder_names(), vec!["AFoo"]);
        assert_eq!(state.disabled().folder_names(), vec!["BBar"]);

        state.disable([&afoo]);
        assert!(state.disable([&afoo]).is_empty());
        state.enable([&afoo]);
        assert_eq!(state.enabled().folder_names(), vec!["AFoo"]);
    }

    #[test]
    fn by_name_reports_unknown() {
        let fx = fixture(&[("AFoo", false), ("BBar", true)]);
        let mut state = loaded(&fx);
        let (changes, unknown) = state.enable_by_name(&["BBar", "Ghost"]);
        assert_eq!(changes.len(), 1);
        assert_eq!(unknown, vec!["Ghost".to_string()]);
        assert_eq!(state.enabled().folder_names(), vec!["AFoo", "BBar"]);
    }

    #[test]
    fn toggles_do_not_touch_disk() {
        let fx = fixture(&[("AFoo", false)]);
        let mut state = loaded(&fx);
        state.disable_by_name(&["AFoo"]);
        assert!(!fx.mods_root.join("AFoo").join(SENTINEL_FILE).exists());
    }

    #[test]
    fn apply_writes_sentinels() {
        let fx = fixture(&[("AFoo", false), ("BBar", true)]);
        let mut state = loaded(&fx);
        state.disable_by_name(&["AFoo"]);
        state.enable_by_name(&["BBar"]);

        let report = state.apply(&fx.game_root).unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.created, vec!["AFoo".to_string()]);
        assert_eq!(report.removed, vec!["BBar".to_string()]);

        let sentinel = fx.mods_root.join("AFoo").join(SENTINEL_FILE);
        assert!(sentinel.exists());
        assert_eq!(fs::metadata(&sentinel).unwrap().len(), 0);
        assert!(!fx.mods_root.join("BBar").join(SENTINEL_FILE).exists());

        let mut reloaded = ModState::new();
        reloaded.load_roster(&fx.mods_root).unwrap();
        assert_eq!(reloaded.enabled().folder_names(), vec!["BBar"]);
        assert_eq!(reloaded.disabled().folder_names(), vec!["AFoo"]);
    }

    #[test]
    fn apply_is_idempotent() {
        let fx = fixture(&[("AFoo", false), ("BBar", true), ("CBaz", false)]);
        let mut state = loaded(&fx);
        state.disable_by_name(&["CBaz"]);

        let first = state.apply(&fx.game_root).unwrap();
        assert_eq!(first.changed(), 1);
        let second = state.apply(&fx.game_root).unwrap();
        assert_eq!(second.changed(), 0);
        assert!(second.failures.is_empty());
        assert!(fx.mods_root.join("CBaz").join(SENTINEL_FILE).exists());
        assert!(fx.mods_root.join("BBar").join(SENTINEL_FILE).exists());
        assert!(!fx.mods_root.join("AFoo").join(SENTINEL_FILE).exists());
    }

    #[test]
    fn apply_without_pending_changes_writes_nothing() {
        let fx = fixture(&[("AFoo", false)]);
        let state = loaded(&fx);
        let report = state.apply(&fx.game_root).unwrap();
        assert_eq!(report.changed(), 0);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn apply_collects_failures_and_continues() {
        let fx = fixture(&[("AFoo", false), ("Gone", false), ("Zed", false)]);
        let mut state = loaded(&fx);
        state.disable_by_name(&["AFoo", "Gone", "Zed"]);
        fs::remove_dir_all(fx.mods_root.join("Gone")).unwrap();

        let report = state.apply(&fx.game_root).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].folder_name, "Gone");
        assert_eq!(report.failures[0].action, SentinelAction::Create);
        assert_eq!(report.created, vec!["AFoo".to_string(), "Zed".to_string()]);
        assert!(matches!(
            report.into_result(),
            Err(ModError::ApplyIncomplete { failures }) if failures.len() == 1
        ));
    }

    #[test]
    fn apply_reports_unreadable_sentinel() {
        let fx = fixture(&[("AFoo", true), ("BBar", false)]);
        let mut state = loaded(&fx);
        state.enable_by_name(&["AFoo"]);
        // A file where the mod folder was makes the sentinel stat fail with ENOTDIR.
        fs::remove_dir_all(fx.mods_root.join("AFoo")).unwrap();
        fs::write(fx.mods_root.join("AFoo"), b"").unwrap();

        let report = state.apply(&fx.game_root).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].folder_name, "AFoo");
        assert_eq!(report.failures[0].action, SentinelAction::Remove);
        assert!(report.removed.is_empty());
    }

    #[test]
    fn apply_requires_game_and_mods_roots() {
        let fx = fixture(&[("AFoo", false)]);
        let state = loaded(&fx);
        assert!(matches!(
            state.apply(&fx.game_root.join("missing")),
            Err(ModError::GameRootNotFound { .. })
        ));
        fs::remove_dir_all(&fx.mods_root).unwrap();
        assert!(matches!(
            state.apply(&fx.game_root),
            Err(ModError::ModsRootNotFound { .. })
        ));
    }

    #[test]
    fn restore_replaces_partition() {
        let fx = fixture(&[("AFoo", true), ("BBar", false)]);
        let mut state = loaded(&fx);
        let (changes, outcome) = state.restore_snapshot(&["AFoo", "Uninstalled"]);
        assert_eq!(
            changes,
            vec![ModChange::Reloaded {
                enabled: 1,
                disabled: 1
            }]
        );
        assert_eq!(outcome.missing, vec!["Uninstalled".to_string()]);
        assert_eq!(state.enabled().folder_names(), vec!["AFoo"]);
        assert_eq!(state.disabled().folder_names(), vec!["BBar"]);
    }

    #[test]
    fn serialize_restore_round_trip() {
        let fx = fixture(&[("a", false), ("b", true), ("c", false), ("d", true)]);
        let mut state = loaded(&fx);
        let before_enabled = state.enabled().folder_names().join(",");
        let before_disabled = state.disabled().folder_names().join(",");

        let text = modlist::serialize(state.enabled().iter());
        state.enable_by_name(&["b", "d"]);
        let names = modlist::parse_snapshot(text.as_bytes()).unwrap();
        state.restore_snapshot(&names);

        assert_eq!(state.enabled().folder_names().join(","), before_enabled);
        assert_eq!(state.disabled().folder_names().join(","), before_disabled);
    }
}
