use crate::game;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const SETTINGS_FILE: &str = "settings.json";
const MODLIST_DIR: &str = "modlists";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub game_path: PathBuf,
    #[serde(default)]
    pub apply_modlist_on_load: bool,
    #[serde(default)]
    pub last_modlist: Option<PathBuf>,
}

impl Settings {
    /// Missing file yields defaults; a file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).context("read settings")?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings = serde_json::from_str(&raw).context("parse settings")?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create settings dir")?;
        }
        let raw = serde_json::to_string_pretty(self).context("serialize settings")?;
        fs::write(path, raw).context("write settings")?;
        Ok(())
    }

    pub fn has_game_path(&self) -> bool {
        !self.game_path.as_os_str().is_empty()
    }

    pub fn mods_root(&self) -> Option<PathBuf> {
        self.has_game_path()
            .then(|| game::mods_root(&self.game_path))
    }
}

/// `settings.json` next to the running binary.
pub fn default_settings_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("resolve executable path")?;
    let dir = exe.parent().context("executable dir")?;
    Ok(dir.join(SETTINGS_FILE))
}

/// Mod lists live beside the settings file they belong to.
pub fn modlist_dir(settings_path: &Path) -> PathBuf {
    settings_path
        .parent()
        .map(|parent| parent.join(MODLIST_DIR))
        .unwrap_or_else(|| PathBuf::from(MODLIST_DIR))
}

pub fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("modkeeper"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(!settings.has_game_path());
        assert_eq!(settings.mods_root(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let settings = Settings {
            game_path: PathBuf::from("/games/isaac"),
            apply_modlist_on_load: true,
            last_modlist: Some(PathBuf::from("/games/lists/a.txt")),
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
        assert_eq!(
            settings.mods_root(),
            Some(PathBuf::from("/games/isaac").join("mods"))
        );
    }

    #[test]
    fn uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"gamePath": "/g", "applyModlistOnLoad": true}"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.game_path, PathBuf::from("/g"));
        assert!(settings.apply_modlist_on_load);
        assert_eq!(settings.last_modlist, None);

        settings.save(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"gamePath\""));
        assert!(raw.contains("\"applyModlistOnLoad\""));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{not json").unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn modlists_sit_beside_settings() {
        let path = Path::new("/opt/modkeeper/settings.json");
        assert_eq!(modlist_dir(path), PathBuf::from("/opt/modkeeper/modlists"));
    }
}
