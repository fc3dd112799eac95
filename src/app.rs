use crate::{
    config::{self, Settings},
    engine::{ApplyReport, ChangeSet, ModChange, ModState, RestoreOutcome, Side},
    game::{self, GamePaths},
    modlist,
};
use anyhow::{bail, Context, Result};
use arboard::Clipboard;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

const LOG_CAPACITY: usize = 200;
const LOG_FILE: &str = "modkeeper.log";

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn echoes(self, level: LogLevel) -> bool {
        match self {
            Verbosity::Quiet => level == LogLevel::Error,
            Verbosity::Normal => level >= LogLevel::Warn,
            Verbosity::Verbose => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub settings_path: PathBuf,
    /// `None` keeps the log in memory only.
    pub log_path: Option<PathBuf>,
    pub verbosity: Verbosity,
    /// Session start: honor `apply_modlist_on_load`. Off for ordinary commands.
    pub apply_on_start: bool,
}

impl AppOptions {
    pub fn from_env(settings_override: Option<PathBuf>, verbosity: Verbosity) -> Result<Self> {
        let settings_path = match settings_override {
            Some(path) => path,
            None => config::default_settings_path()?,
        };
        let log_path = config::base_data_dir().ok().and_then(|dir| {
            fs::create_dir_all(&dir).ok()?;
            Some(dir.join(LOG_FILE))
        });
        Ok(Self {
            settings_path,
            log_path,
            verbosity,
            apply_on_start: false,
        })
    }
}

pub struct App {
    pub settings: Settings,
    pub state: ModState,
    pub logs: Vec<LogEntry>,
    pub status: String,
    /// Set when startup restored and applied the last mod list.
    pub startup_applied: bool,
    settings_path: PathBuf,
    log_path: Option<PathBuf>,
    verbosity: Verbosity,
    clipboard: Option<Clipboard>,
}

impl App {
    pub fn initialize(options: AppOptions) -> Result<Self> {
        let settings = Settings::load(&options.settings_path)?;
        let mut app = App {
            settings,
            state: ModState::new(),
            logs: Vec::new(),
            status: String::new(),
            startup_applied: false,
            settings_path: options.settings_path,
            log_path: options.log_path,
            verbosity: options.verbosity,
            clipboard: None,
        };

        if app.settings.has_game_path() {
            if let Err(err) = app.refresh() {
                app.log_warn(format!("Mods not loaded: {err:#}"));
            }
        }

        if options.apply_on_start && app.settings.apply_modlist_on_load && app.state.is_loaded() {
            if let Some(path) = app.settings.last_modlist.clone() {
                if path.exists() {
                    app.log_info(format!("Applying last mod list: {}", path.display()));
                    let applied = app
                        .load_modlist(&path)
                        .and_then(|_| app.apply().map(|_| ()));
                    match applied {
                        Ok(()) => app.startup_applied = true,
                        Err(err) => app.log_error(format!("Startup mod list failed: {err:#}")),
                    }
                } else {
                    app.log_warn(format!("Last mod list missing: {}", path.display()));
                }
            }
        }

        Ok(app)
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn modlist_dir(&self) -> PathBuf {
        config::modlist_dir(&self.settings_path)
    }

    fn game_paths(&self) -> Result<GamePaths> {
        if !self.settings.has_game_path() {
            bail!("game path not set; run `modkeeper config set-game <path>`");
        }
        Ok(GamePaths {
            game_root: self.settings.game_path.clone(),
            mods_root: game::mods_root(&self.settings.game_path),
        })
    }

    fn require_loaded(&self) -> Result<()> {
        if !self.state.is_loaded() {
            bail!("no mods loaded; check the game path");
        }
        Ok(())
    }

    pub fn refresh(&mut self) -> Result<()> {
        let paths = self.game_paths()?;
        let changes = self
            .state
            .load_roster(&paths.mods_root)
            .context("load mods")?;
        for warning in self.state.warnings().to_vec() {
            self.log_warn(format!("{}: {}", warning.folder_name, warning.message));
        }
        self.log_changes(&changes);
        Ok(())
    }

    pub fn set_game_path(&mut self, input: &str) -> Result<()> {
        let path = expand_path(input);
        let paths = GamePaths::from_root(&path)?;
        self.settings.game_path = paths.game_root;
        self.save_settings()?;
        self.log_info(format!("Game path set: {}", self.settings.game_path.display()));
        self.refresh()
    }

    pub fn detect_game_path(&mut self) -> Result<Option<PathBuf>> {
        let Some(found) = game::detect_game_root() else {
            self.status = format!("{} not found in Steam libraries", game::GAME_NAME);
            return Ok(None);
        };
        self.settings.game_path = found.clone();
        self.save_settings()?;
        self.log_info(format!("Detected game path: {}", found.display()));
        self.refresh()?;
        Ok(Some(found))
    }

    pub fn set_apply_on_load(&mut self, enabled: bool) -> Result<()> {
        self.settings.apply_modlist_on_load = enabled;
        self.save_settings()?;
        self.log_info(format!(
            "Apply mod list on load: {}",
            if enabled { "on" } else { "off" }
        ));
        Ok(())
    }

    /// Moves the named mods to the enabled side. Returns names that matched nothing.
    pub fn enable(&mut self, names: &[String]) -> Result<Vec<String>> {
        self.require_loaded()?;
        self.log_unchanged(names, Side::Enabled);
        let (changes, unknown) = self.state.enable_by_name(names);
        self.log_changes(&changes);
        self.log_unknown(&unknown);
        Ok(unknown)
    }

    pub fn disable(&mut self, names: &[String]) -> Result<Vec<String>> {
        self.require_loaded()?;
        self.log_unchanged(names, Side::Disabled);
        let (changes, unknown) = self.state.disable_by_name(names);
        self.log_changes(&changes);
        self.log_unknown(&unknown);
        Ok(unknown)
    }

    pub fn apply(&mut self) -> Result<ApplyReport> {
        self.require_loaded()?;
        let paths = self.game_paths()?;
        let report = self.state.apply(&paths.game_root).context("apply mods")?;
        for name in &report.removed {
            self.log_info(format!("Enabled on disk: {name}"));
        }
        for name in &report.created {
            self.log_info(format!("Disabled on disk: {name}"));
        }
        for failure in &report.failures {
            self.log_error(format!("Apply failed: {failure}"));
        }
        self.status = format!(
            "Applied: {} enabled, {} disabled, {} change(s)",
            self.state.enabled().len(),
            self.state.disabled().len(),
            report.changed()
        );
        self.log_info(self.status.clone());
        Ok(report.into_result()?)
    }

    pub fn save_modlist(&mut self, path: Option<PathBuf>) -> Result<PathBuf> {
        self.require_loaded()?;
        let path = path.unwrap_or_else(|| modlist::default_modlist_path(&self.modlist_dir()));
        modlist::write_modlist(&path, self.state.enabled())?;
        self.settings.last_modlist = Some(path.clone());
        self.save_settings()?;
        self.log_info(format!("Mod list saved: {}", path.display()));
        Ok(path)
    }

    /// Replaces the in-memory partition with the one in the file. A read
    /// failure leaves it unchanged. Settings are not touched; see
    /// [`App::remember_modlist`].
    pub fn load_modlist(&mut self, path: &Path) -> Result<RestoreOutcome> {
        self.require_loaded()?;
        let names = modlist::read_modlist(path)?;
        let (changes, outcome) = self.state.restore_snapshot(&names);
        self.log_changes(&changes);
        for name in &outcome.missing {
            self.log_warn(format!("Mod list entry not installed: {name}"));
        }
        self.log_info(format!("Mod list loaded: {}", path.display()));
        Ok(outcome)
    }

    /// Records `path` as the list to re-apply at startup.
    pub fn remember_modlist(&mut self, path: &Path) -> Result<()> {
        self.settings.last_modlist = Some(path.to_path_buf());
        self.save_settings()
    }

    pub fn copy_modlist_to_clipboard(&mut self) -> Result<()> {
        self.require_loaded()?;
        let text = modlist::serialize(self.state.enabled());
        if self.clipboard.is_none() {
            self.clipboard = Some(Clipboard::new().context("open clipboard")?);
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            clipboard.set_text(text).context("copy mod list")?;
        }
        self.status = "Mod list copied to clipboard".to_string();
        self.log_info(self.status.clone());
        Ok(())
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.save_settings()
    }

    fn save_settings(&self) -> Result<()> {
        self.settings.save(&self.settings_path)
    }

    fn log_changes(&mut self, changes: &ChangeSet) {
        for change in changes {
            match change {
                ModChange::Reloaded { enabled, disabled } => {
                    self.status = format!("{enabled} enabled, {disabled} disabled");
                    self.log_info(format!("Mods loaded: {enabled} enabled, {disabled} disabled"));
                }
                ModChange::Moved { folder_name, to } => {
                    self.log_info(format!("Marked {}: {folder_name}", side_label(*to)));
                }
            }
        }
    }

    fn log_unchanged(&mut self, names: &[String], side: Side) {
        for name in names {
            if self.state.side_of(name) == Some(side) {
                self.log_info(format!("{name} is already {}", side_label(side)));
            }
        }
    }

    fn log_unknown(&mut self, unknown: &[String]) {
        for name in unknown {
            self.log_warn(format!("No installed mod named {name}"));
        }
    }

    pub fn log_info(&mut self, message: String) {
        self.push_log(LogLevel::Info, message);
    }

    pub fn log_warn(&mut self, message: String) {
        self.push_log(LogLevel::Warn, message);
    }

    pub fn log_error(&mut self, message: String) {
        self.push_log(LogLevel::Error, message);
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        if self.verbosity.echoes(level) {
            eprintln!("[{}] {message}", log_level_label(level));
        }
        if let Some(path) = &self.log_path {
            let _ = append_log_file(path, level, &message);
        }
        self.logs.push(LogEntry { level, message });
        if self.logs.len() > LOG_CAPACITY {
            let overflow = self.logs.len() - LOG_CAPACITY;
            self.logs.drain(0..overflow);
        }
    }
}

fn log_level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Enabled => "enabled",
        Side::Disabled => "disabled",
    }
}

fn append_log_file(path: &Path, level: LogLevel, message: &str) -> std::io::Result<()> {
    let label = log_level_label(level);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "[{label}] {message}")
}

/// Accepts paths as pasted from file managers: quoted, `file://`, `%20`, `~`.
pub(crate) fn expand_path(input: &str) -> PathBuf {
    let mut value = input.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            value = &value[1..value.len() - 1];
        }
    }
    let value = value
        .strip_prefix("file://")
        .map(|rest| rest.trim_start_matches("localhost"))
        .unwrap_or(value)
        .replace("%20", " ");
    if let Some(stripped) = value.strip_prefix('~') {
        if let Some(base) = directories::BaseDirs::new() {
            return base.home_dir().join(stripped.trim_start_matches('/'));
        }
    }
    PathBuf::from(value)
}
