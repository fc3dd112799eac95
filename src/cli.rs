use crate::{
    app::{App, AppOptions, Verbosity},
    config, game, modlist,
};
use anyhow::{bail, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GlobalOptions {
    format: OutputFormat,
    settings: Option<PathBuf>,
    verbosity: Verbosity,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            settings: None,
            verbosity: Verbosity::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListScope {
    All,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    ModsList {
        scope: ListScope,
        filter: Option<String>,
    },
    Enable {
        names: Vec<String>,
        dry_run: bool,
    },
    Disable {
        names: Vec<String>,
        dry_run: bool,
    },
    Apply {
        startup: bool,
    },
    Refresh,
    ModlistSave(Option<PathBuf>),
    ModlistLoad {
        path: PathBuf,
        dry_run: bool,
    },
    ModlistShow,
    ModlistCopy,
    ConfigShow,
    ConfigSetGame(String),
    ConfigDetect,
    ConfigApplyOnLoad(bool),
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, command) = parse_args(&args)?;
    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("modkeeper v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        command => {
            let mut options = AppOptions::from_env(global.settings.clone(), global.verbosity)?;
            options.apply_on_start = matches!(command, CliCommand::Apply { startup: true });
            let mut app = App::initialize(options)?;
            let result = run_command(&mut app, command, global.format);
            app.shutdown()?;
            result
        }
    }
}

fn parse_args(args: &[String]) -> Result<(GlobalOptions, CliCommand)> {
    let (global, tokens) = parse_global_options(args)?;
    let command = parse_subcommand(&tokens)?;
    Ok((global, command))
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut global = GlobalOptions::default();
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            global.format = parse_format(value)?;
            continue;
        }
        if let Some(value) = arg.strip_prefix("--settings=") {
            global.settings = Some(PathBuf::from(value));
            continue;
        }
        match arg.as_str() {
            "--format" => {
                let Some(value) = iter.next() else {
                    bail!("--format requires a value");
                };
                global.format = parse_format(value)?;
            }
            "--settings" => {
                let Some(value) = iter.next() else {
                    bail!("--settings requires a path");
                };
                global.settings = Some(PathBuf::from(value));
            }
            "-q" | "--quiet" => global.verbosity = Verbosity::Quiet,
            "-v" | "--verbose" => global.verbosity = Verbosity::Verbose,
            _ => tokens.push(arg.to_string()),
        }
    }
    Ok((global, tokens))
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    OutputFormat::parse(value).ok_or_else(|| anyhow::anyhow!("Unknown format: {value}"))
}

fn parse_subcommand(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Help);
    };
    let rest = &tokens[1..];
    match head.as_str() {
        "-h" | "--help" | "help" => Ok(CliCommand::Help),
        "-V" | "--version" | "version" => Ok(CliCommand::Version),
        "mods" => parse_mods_list(rest),
        "enable" | "disable" => {
            let (names, dry_run) = parse_names(rest)?;
            if names.is_empty() {
                bail!("{head} requires one or more mod folder names");
            }
            Ok(if head == "enable" {
                CliCommand::Enable { names, dry_run }
            } else {
                CliCommand::Disable { names, dry_run }
            })
        }
        "apply" => match rest {
            [] => Ok(CliCommand::Apply { startup: false }),
            [flag] if flag == "--startup" => Ok(CliCommand::Apply { startup: true }),
            _ => bail!("apply takes no arguments besides --startup"),
        },
        "refresh" => Ok(CliCommand::Refresh),
        "modlist" => parse_modlist(rest),
        "config" => parse_config(rest),
        other => bail!("Unknown command: {other} (see --help)"),
    }
}

fn parse_mods_list(args: &[String]) -> Result<CliCommand> {
    let mut scope = ListScope::All;
    let mut filter = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "list" => {}
            "--enabled" => scope = ListScope::Enabled,
            "--disabled" => scope = ListScope::Disabled,
            "--filter" => {
                let Some(value) = iter.next() else {
                    bail!("--filter requires a value");
                };
                filter = Some(value.to_string());
            }
            value if value.starts_with("--filter=") => {
                filter = Some(value.trim_start_matches("--filter=").to_string());
            }
            other => bail!("Unknown mods option: {other}"),
        }
    }
    Ok(CliCommand::ModsList { scope, filter })
}

fn parse_names(args: &[String]) -> Result<(Vec<String>, bool)> {
    let mut names = Vec::new();
    let mut dry_run = false;
    let mut literal = false;
    for arg in args {
        if literal {
            names.push(arg.to_string());
            continue;
        }
        match arg.as_str() {
            "--" => literal = true,
            "--dry-run" | "-n" => dry_run = true,
            other if other.starts_with('-') => bail!("Unknown option: {other}"),
            other => names.push(other.to_string()),
        }
    }
    Ok((names, dry_run))
}

fn parse_modlist(args: &[String]) -> Result<CliCommand> {
    let sub = args.first().map(|value| value.as_str()).unwrap_or("show");
    let rest = args.get(1..).unwrap_or(&[]);
    match sub {
        "save" => Ok(CliCommand::ModlistSave(rest.first().map(PathBuf::from))),
        "load" => {
            let (paths, dry_run) = parse_names(rest)?;
            let [path] = paths.as_slice() else {
                bail!("modlist load requires exactly one path");
            };
            Ok(CliCommand::ModlistLoad {
                path: PathBuf::from(path),
                dry_run,
            })
        }
        "show" => Ok(CliCommand::ModlistShow),
        "copy" => Ok(CliCommand::ModlistCopy),
        other => bail!("Unknown modlist command: {other} (use 'save', 'load', 'show', or 'copy')"),
    }
}

fn parse_config(args: &[String]) -> Result<CliCommand> {
    let sub = args.first().map(|value| value.as_str()).unwrap_or("show");
    match sub {
        "show" => Ok(CliCommand::ConfigShow),
        "detect" => Ok(CliCommand::ConfigDetect),
        "set-game" => {
            let Some(path) = args.get(1) else {
                bail!("config set-game requires a path");
            };
            Ok(CliCommand::ConfigSetGame(path.to_string()))
        }
        "apply-on-load" => {
            let value = args.get(1).map(|value| value.as_str());
            let enabled = match value {
                Some("on" | "true" | "yes" | "1") => true,
                Some("off" | "false" | "no" | "0") => false,
                _ => bail!("config apply-on-load requires 'on' or 'off'"),
            };
            Ok(CliCommand::ConfigApplyOnLoad(enabled))
        }
        other => bail!(
            "Unknown config command: {other} (use 'show', 'set-game', 'detect', or 'apply-on-load')"
        ),
    }
}

fn run_command(app: &mut App, command: CliCommand, format: OutputFormat) -> Result<()> {
    match command {
        CliCommand::ModsList { scope, filter } => list_mods(app, scope, filter.as_deref(), format),
        CliCommand::Enable { names, dry_run } => {
            let unknown = app.enable(&names)?;
            finish_change(app, unknown, dry_run, format)
        }
        CliCommand::Disable { names, dry_run } => {
            let unknown = app.disable(&names)?;
            finish_change(app, unknown, dry_run, format)
        }
        CliCommand::Apply { startup } => {
            if startup && !app.settings.apply_modlist_on_load {
                println!("Apply mod list on load is off; applying current state");
            }
            if app.startup_applied {
                println!("{}", app.status);
                return Ok(());
            }
            let report = app.apply()?;
            println!("{}", app.status);
            if report.changed() == 0 {
                println!("Mods folder already up to date");
            }
            Ok(())
        }
        CliCommand::Refresh => {
            app.refresh()?;
            println!("{}", app.status);
            Ok(())
        }
        CliCommand::ModlistSave(path) => {
            let path = app.save_modlist(path)?;
            println!("Saved {}", path.display());
            Ok(())
        }
        CliCommand::ModlistLoad { path, dry_run } => {
            let outcome = app.load_modlist(&path)?;
            finish_change(app, outcome.missing, dry_run, format)?;
            if !dry_run {
                app.remember_modlist(&path)?;
            }
            Ok(())
        }
        CliCommand::ModlistShow => {
            if !app.state.is_loaded() {
                bail!("no mods loaded; check the game path");
            }
            let text = modlist::serialize(app.state.enabled());
            if !text.is_empty() {
                println!("{text}");
            }
            Ok(())
        }
        CliCommand::ModlistCopy => {
            app.copy_modlist_to_clipboard()?;
            println!("{}", app.status);
            Ok(())
        }
        CliCommand::ConfigShow => show_config(app, format),
        CliCommand::ConfigSetGame(path) => {
            app.set_game_path(&path)?;
            println!("Game path: {}", app.settings.game_path.display());
            println!("{}", app.status);
            Ok(())
        }
        CliCommand::ConfigDetect => {
            match app.detect_game_path()? {
                Some(path) => println!("Game path: {}", path.display()),
                None => println!("{}", app.status),
            }
            Ok(())
        }
        CliCommand::ConfigApplyOnLoad(enabled) => {
            app.set_apply_on_load(enabled)?;
            println!(
                "Apply mod list on load: {}",
                if enabled { "on" } else { "off" }
            );
            Ok(())
        }
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

fn finish_change(
    app: &mut App,
    unknown: Vec<String>,
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    for name in &unknown {
        eprintln!("Not installed: {name}");
    }
    if dry_run {
        return list_mods(app, ListScope::All, None, format);
    }
    app.apply()?;
    println!("{}", app.status);
    Ok(())
}

#[derive(Serialize)]
struct ModListItem {
    folder_name: String,
    display_name: String,
    enabled: bool,
    version: Option<String>,
    workshop_id: Option<i64>,
    tags: Vec<String>,
}

fn collect_items(app: &App, scope: ListScope, filter: Option<&str>) -> Vec<ModListItem> {
    let filter = filter.unwrap_or("");
    let mut items = Vec::new();
    let sides = [(true, app.state.enabled()), (false, app.state.disabled())];
    for (enabled, list) in sides {
        let wanted = match scope {
            ListScope::All => true,
            ListScope::Enabled => enabled,
            ListScope::Disabled => !enabled,
        };
        if !wanted {
            continue;
        }
        for item in list.search(filter) {
            items.push(ModListItem {
                folder_name: item.folder_name.clone(),
                display_name: item.display_name().to_string(),
                enabled,
                version: item.version().map(str::to_string),
                workshop_id: item.workshop_id(),
                tags: item
                    .metadata
                    .as_ref()
                    .map(|meta| meta.tag_names().map(str::to_string).collect())
                    .unwrap_or_default(),
            });
        }
    }
    items
}

fn list_mods(
    app: &App,
    scope: ListScope,
    filter: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    if !app.state.is_loaded() {
        bail!("no mods loaded; check the game path");
    }
    let items = collect_items(app, scope, filter);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            for item in items {
                let enabled = if item.enabled { "x" } else { " " };
                let version = item.version.as_deref().unwrap_or("-");
                if item.display_name == item.folder_name {
                    println!("[{enabled}] {version:<8} {}", item.display_name);
                } else {
                    println!(
                        "[{enabled}] {version:<8} {} ({})",
                        item.display_name, item.folder_name
                    );
                }
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ConfigOutput {
    settings_path: String,
    game_path: String,
    mods_root: Option<String>,
    game_root_valid: bool,
    apply_modlist_on_load: bool,
    last_modlist: Option<String>,
    modlist_dir: String,
    log_path: Option<String>,
}

fn show_config(app: &App, format: OutputFormat) -> Result<()> {
    let settings = &app.settings;
    let output = ConfigOutput {
        settings_path: app.settings_path().display().to_string(),
        game_path: settings.game_path.display().to_string(),
        mods_root: settings.mods_root().map(|path| path.display().to_string()),
        game_root_valid: settings.has_game_path()
            && game::looks_like_game_root(&settings.game_path),
        apply_modlist_on_load: settings.apply_modlist_on_load,
        last_modlist: settings
            .last_modlist
            .as_ref()
            .map(|path| path.display().to_string()),
        modlist_dir: config::modlist_dir(app.settings_path())
            .display()
            .to_string(),
        log_path: app.log_path().map(|path| path.display().to_string()),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("Settings: {}", output.settings_path);
            println!(
                "Game path: {}{}",
                if output.game_path.is_empty() {
                    "(not set)"
                } else {
                    output.game_path.as_str()
                },
                if output.game_path.is_empty() || output.game_root_valid {
                    ""
                } else {
                    " (missing isaac-ng.exe)"
                }
            );
            if let Some(mods_root) = &output.mods_root {
                println!("Mods folder: {mods_root}");
            }
            println!(
                "Apply mod list on load: {}",
                if output.apply_modlist_on_load { "on" } else { "off" }
            );
            println!(
                "Last mod list: {}",
                output.last_modlist.as_deref().unwrap_or("(none)")
            );
            println!("Mod lists: {}", output.modlist_dir);
            if let Some(log_path) = &output.log_path {
                println!("Log: {log_path}");
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!("modkeeper v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  modkeeper mods list [--enabled|--disabled] [--filter <text>]");
    println!("  modkeeper enable <folder...> [--dry-run]   Enable mods and apply");
    println!("  modkeeper disable <folder...> [--dry-run]  Disable mods and apply");
    println!("  modkeeper apply [--startup]               Write enabled state to disk");
    println!("                                            (--startup re-applies the last mod list");
    println!("                                            when apply-on-load is on)");
    println!("  modkeeper refresh                         Rescan the mods folder");
    println!("  modkeeper modlist save [path]             Save enabled mods as a mod list");
    println!("  modkeeper modlist load <path> [--dry-run] Enable exactly the mods in a list");
    println!("  modkeeper modlist show                    Print the current mod list");
    println!("  modkeeper modlist copy                    Copy the current mod list");
    println!("  modkeeper config show                     Show settings");
    println!("  modkeeper config set-game <path>          Set the game folder");
    println!("  modkeeper config detect                   Find the game in Steam libraries");
    println!("  modkeeper config apply-on-load <on|off>   Let apply --startup re-apply the last list");
    println!();
    println!("Global options:");
    println!("  --format <json|text>   Output format for list commands");
    println!("  --settings <path>      Settings file (default: beside the binary)");
    println!("  -q, --quiet            Errors only");
    println!("  -v, --verbose          Echo every log line");
    println!("  -h, --help             Show help");
    println!("  -V, --version          Show version");
}
