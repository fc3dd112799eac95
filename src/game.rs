use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const GAME_NAME: &str = "The Binding of Isaac: Rebirth";
pub const GAME_EXECUTABLE: &str = "isaac-ng.exe";
pub const MODS_DIR: &str = "mods";
const STEAM_FOLDER: &str = "The Binding of Isaac Rebirth";

#[derive(Debug, Clone)]
pub struct GamePaths {
    pub game_root: PathBuf,
    pub mods_root: PathBuf,
}

impl GamePaths {
    pub fn from_root(game_root: &Path) -> Result<Self> {
        if !looks_like_game_root(game_root) {
            bail!(
                "invalid game root: expected {GAME_EXECUTABLE} in {}",
                game_root.display()
            );
        }
        Ok(Self {
            game_root: game_root.to_path_buf(),
            mods_root: mods_root(game_root),
        })
    }
}

pub fn mods_root(game_root: &Path) -> PathBuf {
    game_root.join(MODS_DIR)
}

pub fn looks_like_game_root(path: &Path) -> bool {
    path.join(GAME_EXECUTABLE).is_file()
}

/// Looks for a Steam install in the usual library locations.
pub fn detect_game_root() -> Option<PathBuf> {
    let mut libraries = Vec::new();
    for base in steam_roots() {
        let vdf = base.join("steamapps/libraryfolders.vdf");
        if vdf.exists() {
            if let Ok(paths) = parse_steam_library_paths(&vdf) {
                libraries.extend(paths);
            }
        }
        libraries.push(base);
    }

    libraries
        .into_iter()
        .map(|lib| lib.join("steamapps/common").join(STEAM_FOLDER))
        .find(|candidate| looks_like_game_root(candidate))
}

fn steam_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = dirs_home() {
        roots.push(home.join(".local/share/Steam"));
        roots.push(home.join(".steam/steam"));
        roots.push(home.join("Library/Application Support/Steam"));
    }
    if cfg!(windows) {
        roots.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
        roots.push(PathBuf::from(r"C:\Program Files\Steam"));
    }
    roots
}

fn parse_steam_library_paths(path: &Path) -> Result<Vec<PathBuf>> {
    let raw = fs::read_to_string(path).context("read libraryfolders.vdf")?;
    Ok(library_paths_from_vdf(&raw))
}

fn library_paths_from_vdf(raw: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if !line.contains("\"path\"") {
            continue;
        }
        let parts: Vec<&str> = line.split('"').collect();
        if parts.len() >= 4 {
            paths.push(PathBuf::from(parts[3].replace("\\\\", "\\")));
        }
    }
    paths
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|base| base.home_dir().to_path_buf())
}
