use anyhow::{bail, Context, Result};
use refup::{
    build_catalog,
    catalog::{Catalog, CatalogStatus},
    list_references,
    logging::{self, Verbosity},
    manifest::ManifestScene,
    replace::ApplyReport,
    selection::{self, Choices},
    startup::{self, AutoUpdateStatus},
    Inventory, JsonSettingsStore, ReplacementEngine, SceneHost, SceneId, SceneSettings,
    SettingsStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

const SETTINGS_READY: &str = "Settings are up to date.";
const SETTINGS_STALE: &str = "You need to update your settings!";

#[derive(Clone, Copy, PartialEq, Eq)]
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

struct GlobalOptions {
    format: OutputFormat,
    settings: Option<PathBuf>,
    verbosity: Verbosity,
}

enum CliCommand {
    Refs {
        scene: PathBuf,
    },
    Scan {
        scene: PathBuf,
        dir: Option<PathBuf>,
    },
    Update {
        scene: PathBuf,
        dir: Option<PathBuf>,
        picks: Vec<(String, String)>,
        latest: bool,
    },
    Auto {
        scene: PathBuf,
    },
    Settings {
        scene: PathBuf,
        edit: SettingsEdit,
    },
    Help,
    Version,
}

#[derive(Default)]
struct SettingsEdit {
    directory: Option<String>,
    enable: Vec<String>,
    disable: Vec<String>,
}

impl SettingsEdit {
    fn is_empty(&self) -> bool {
        self.directory.is_none() && self.enable.is_empty() && self.disable.is_empty()
    }
}

struct Session {
    scene: ManifestScene,
    scene_id: SceneId,
    store: JsonSettingsStore,
    settings: SceneSettings,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, tokens) = parse_global_options(&args)?;
    let command = parse_command(&tokens)?;
    logging::init(global.verbosity);

    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("RefUp v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        command => run_command(command, &global),
    }
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut format = OutputFormat::Text;
    let mut settings = None;
    let mut verbosity = Verbosity::Normal;
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            format = parse_format(value)?;
            continue;
        }
        match arg.as_str() {
            "--format" => {
                let value = iter.next().context("--format requires a value")?;
                format = parse_format(value)?;
            }
            "--settings" => {
                let value = iter.next().context("--settings requires a path")?;
                settings = Some(PathBuf::from(value));
            }
            "-q" | "--quiet" => verbosity = Verbosity::Quiet,
            "--verbose" => verbosity = Verbosity::Verbose,
            "--verbosity" => {
                let level = iter.next().context("--verbosity requires a level")?;
                verbosity = Verbosity::parse(level)
                    .with_context(|| format!("Unknown verbosity: {level}"))?;
            }
            _ if arg.starts_with("-v") && !arg.starts_with("--") && arg.len() > 1 => {
                let count = arg.chars().filter(|ch| *ch == 'v').count();
                verbosity = if count >= 2 {
                    Verbosity::Debug
                } else {
                    Verbosity::Verbose
                };
            }
            _ => tokens.push(arg.to_string()),
        }
    }

    Ok((
        GlobalOptions {
            format,
            settings,
            verbosity,
        },
        tokens,
    ))
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    OutputFormat::parse(value).with_context(|| format!("Unknown format: {value}"))
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Help);
    };
    let rest = tokens.get(1..).unwrap_or(&[]);
    match head.as_str() {
        "--help" | "-h" | "help" => Ok(CliCommand::Help),
        "--version" | "-V" | "version" => Ok(CliCommand::Version),
        "refs" => Ok(CliCommand::Refs {
            scene: scene_arg(head, rest)?,
        }),
        "scan" => {
            let mut dir = None;
            let mut iter = rest.iter().skip(1);
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--dir" => dir = Some(PathBuf::from(iter.next().context("--dir requires a path")?)),
                    other => bail!("Unexpected argument for scan: {other}"),
                }
            }
            Ok(CliCommand::Scan {
                scene: scene_arg(head, rest)?,
                dir,
            })
        }
        "update" => {
            let mut dir = None;
            let mut picks = Vec::new();
            let mut latest = false;
            let mut iter = rest.iter().skip(1);
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--dir" => dir = Some(PathBuf::from(iter.next().context("--dir requires a path")?)),
                    "--latest" => latest = true,
                    pick => {
                        let (base, version) = pick
                            .split_once('=')
                            .with_context(|| format!("Expected <base>=<version>, got {pick}"))?;
                        picks.push((base.to_string(), version.to_string()));
                    }
                }
            }
            Ok(CliCommand::Update {
                scene: scene_arg(head, rest)?,
                dir,
                picks,
                latest,
            })
        }
        "auto" => Ok(CliCommand::Auto {
            scene: scene_arg(head, rest)?,
        }),
        "settings" => {
            let mut edit = SettingsEdit::default();
            let mut iter = rest.iter().skip(1);
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--dir" => {
                        edit.directory = Some(iter.next().context("--dir requires a path")?.to_string())
                    }
                    "--auto" => edit
                        .enable
                        .push(iter.next().context("--auto requires a base name")?.to_string()),
                    "--no-auto" => edit
                        .disable
                        .push(iter.next().context("--no-auto requires a base name")?.to_string()),
                    other => bail!("Unexpected argument for settings: {other}"),
                }
            }
            Ok(CliCommand::Settings {
                scene: scene_arg(head, rest)?,
                edit,
            })
        }
        other => bail!("Unknown command: {other} (see --help)"),
    }
}

fn scene_arg(command: &str, rest: &[String]) -> Result<PathBuf> {
    match rest.first() {
        Some(path) if !path.starts_with('-') => Ok(PathBuf::from(path)),
        _ => bail!("{command} requires a scene manifest path"),
    }
}

fn open_session(scene_path: &Path, global: &GlobalOptions) -> Result<Session> {
    let scene = ManifestScene::load(scene_path)?;
    let scene_id = SceneId::new(scene.scene_path().context("query scene path")?);
    let store = match &global.settings {
        Some(path) => JsonSettingsStore::new(path),
        None => JsonSettingsStore::open_default()?,
    };
    let settings = store.load(&scene_id)?;
    Ok(Session {
        scene,
        scene_id,
        store,
        settings,
    })
}

fn run_command(command: CliCommand, global: &GlobalOptions) -> Result<()> {
    match command {
        CliCommand::Refs { scene } => {
            let session = open_session(&scene, global)?;
            let inventory = list_references(&session.scene)?;
            print_inventory(&inventory, global.format)
        }
        CliCommand::Scan { scene, dir } => {
            let session = open_session(&scene, global)?;
            let inventory = list_references(&session.scene)?;
            let root = dir.unwrap_or_else(|| session.settings.directory_path());
            let catalog = build_catalog(&root, &inventory.files);
            print_catalog(&session.settings, &catalog, global.format)
        }
        CliCommand::Update {
            scene,
            dir,
            picks,
            latest,
        } => {
            let mut session = open_session(&scene, global)?;
            let inventory = list_references(&session.scene)?;
            let root = dir.unwrap_or_else(|| session.settings.directory_path());
            let catalog = build_catalog(&root, &inventory.files);
            if let CatalogStatus::NotReady(reason) = catalog.status() {
                println!("{SETTINGS_STALE}");
                println!("Nothing updated: {reason}");
                return Ok(());
            }

            let mut choices = if latest {
                selection::latest_choices(&catalog)
            } else {
                selection::recent_choices(&catalog)
            };
            apply_picks(&catalog, &mut choices, &picks)?;

            let desired = selection::desired_map(&inventory.files, &choices);
            let report = ReplacementEngine::new(&mut session.scene).apply(&desired)?;
            if session.scene.is_dirty() {
                session.scene.save()?;
            }
            print_apply_report(&report, global.format)
        }
        CliCommand::Auto { scene } => {
            let mut session = open_session(&scene, global)?;
            let report = startup::run_auto_update(&mut session.scene, &session.store)?;
            if session.scene.is_dirty() {
                session.scene.save()?;
            }
            match report.status {
                AutoUpdateStatus::SettingsNotReady => {
                    println!("{SETTINGS_STALE}");
                    Ok(())
                }
                AutoUpdateStatus::CatalogNotReady(reason) => {
                    println!("{SETTINGS_STALE}");
                    println!("Auto-update skipped: {reason}");
                    Ok(())
                }
                AutoUpdateStatus::NothingToUpdate => {
                    println!("No references flagged for auto-update.");
                    Ok(())
                }
                AutoUpdateStatus::Applied(applied) => print_apply_report(&applied, global.format),
            }
        }
        CliCommand::Settings { scene, edit } => {
            let mut session = open_session(&scene, global)?;
            if !edit.is_empty() {
                if let Some(directory) = edit.directory {
                    session.settings.directory = directory;
                }
                for base in &edit.enable {
                    session.settings.enable_auto_update(&auto_key(base));
                }
                for base in &edit.disable {
                    session.settings.disable_auto_update(base);
                }
                session
                    .store
                    .save(&session.scene_id, &session.settings)?;
            }
            print_settings(&session, global.format)
        }
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

// Auto-update entries are stored with the trailing underscore of the base.
fn auto_key(base: &str) -> String {
    format!("{}_", base.trim_end_matches('_'))
}

fn apply_picks(catalog: &Catalog, choices: &mut Choices, picks: &[(String, String)]) -> Result<()> {
    for (name, version) in picks {
        let base = selection::resolve_base(catalog, name)
            .with_context(|| format!("No versions found for {name}"))?;
        let path = selection::choose_version(catalog, base, version)
            .with_context(|| format!("Unknown version {version} for {name}"))?;
        choices.insert(base.to_string(), path);
    }
    Ok(())
}

fn print_inventory(inventory: &Inventory, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(inventory)?);
        }
        OutputFormat::Text => {
            if inventory.files.is_empty() {
                println!("No references loaded.");
            }
            for file in &inventory.files {
                println!("{file}");
            }
            for skipped in &inventory.skipped {
                println!("Warning: skipping invalid reference node {}", skipped.node);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct CatalogOutput {
    root: String,
    ready: bool,
    status: String,
    walk_errors: usize,
    assets: Vec<AssetItem>,
}

#[derive(Serialize)]
struct AssetItem {
    base: String,
    auto_update: bool,
    latest: Option<String>,
    versions: Vec<VersionItem>,
}

#[derive(Serialize)]
struct VersionItem {
    version: String,
    path: String,
    modified_at: Option<i64>,
}

fn print_catalog(settings: &SceneSettings, catalog: &Catalog, format: OutputFormat) -> Result<()> {
    let status = match catalog.status() {
        CatalogStatus::Ready => SETTINGS_READY.to_string(),
        CatalogStatus::NotReady(reason) => reason.to_string(),
    };
    let assets: Vec<AssetItem> = catalog
        .base_names()
        .map(|base| AssetItem {
            base: base.to_string(),
            auto_update: settings.wants_auto_update(base),
            latest: catalog.latest(base).map(str::to_string),
            versions: catalog
                .recent_first(base)
                .into_iter()
                .map(|candidate| VersionItem {
                    modified_at: candidate.modified_unix(),
                    version: candidate.version,
                    path: candidate.path,
                })
                .collect(),
        })
        .collect();
    let output = CatalogOutput {
        root: catalog.root().display().to_string(),
        ready: catalog.is_ready(),
        status,
        walk_errors: catalog.walk_errors(),
        assets,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if output.ready && settings.is_ready() {
                println!("{SETTINGS_READY}");
            } else {
                println!("{SETTINGS_STALE}");
                if !output.ready {
                    println!("  {}", output.status);
                }
            }
            if output.walk_errors > 0 {
                println!("Warning: {} entries could not be read", output.walk_errors);
            }
            if output.ready && output.assets.is_empty() {
                println!("No versions found for the referenced files.");
            }
            for asset in output.assets {
                let auto = if asset.auto_update { " [auto]" } else { "" };
                println!("{}{auto}", asset.base);
                for version in asset.versions {
                    let label = if version.version.is_empty() {
                        "-".to_string()
                    } else {
                        version.version
                    };
                    println!(
                        "  {label:<6} {} {}",
                        format_modified(version.modified_at),
                        version.path
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_apply_report(report: &ApplyReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            if report.rebound.is_empty() && report.failures.is_empty() {
                println!("No references updated.");
            }
            for rebind in &report.rebound {
                println!("{}: {} -> {}", rebind.node, rebind.from, rebind.to);
            }
            for failure in &report.failures {
                match &failure.target {
                    Some(target) => println!(
                        "Error updating {} to {}: {}",
                        failure.node, target, failure.error
                    ),
                    None => println!("Error updating {}: {}", failure.node, failure.error),
                }
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct SettingsOutput<'a> {
    scene: &'a str,
    settings_file: String,
    ready: bool,
    #[serde(flatten)]
    settings: &'a SceneSettings,
}

fn print_settings(session: &Session, format: OutputFormat) -> Result<()> {
    let output = SettingsOutput {
        scene: session.scene_id.as_str(),
        settings_file: session.store.path().display().to_string(),
        ready: session.settings.is_ready(),
        settings: &session.settings,
    };
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("Scene: {}", output.scene);
            println!("Settings file: {}", output.settings_file);
            println!("Directory: {}", output.settings.directory);
            println!("Files to auto-update:");
            if output.settings.files_to_update.is_empty() {
                println!("  (none)");
            }
            for base in &output.settings.files_to_update {
                println!("  {base}");
            }
            println!(
                "{}",
                if output.ready { SETTINGS_READY } else { SETTINGS_STALE }
            );
        }
    }
    Ok(())
}

fn print_help() {
    println!("RefUp v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  refup refs <scene>                         List referenced files");
    println!("  refup scan <scene> [--dir <path>]          Show available versions, newest first");
    println!("  refup update <scene> [<base>=<version>...]  Apply versions (default: most recent file)");
    println!("        [--latest] [--dir <path>]            --latest picks the highest version");
    println!("  refup auto <scene>                         Run the auto-update pass");
    println!("  refup settings <scene> [--dir <path>]      Show or edit scene settings");
    println!("        [--auto <base>] [--no-auto <base>]");
    println!();
    println!("<scene> is a JSON scene manifest listing reference nodes.");
    println!();
    println!("Global options:");
    println!("  --format <json|text>                       Output format");
    println!("  --settings <path>                          Settings file (default: $REFUP_SETTINGS or data dir)");
    println!("  -q, --quiet                                Errors only");
    println!("  -v, -vv                                    Increase verbosity");
    println!("  --verbosity <level>                        quiet | normal | verbose | debug");
    println!("  -h, --help                                 Show help");
    println!("  -V, --version                              Show version");
}

fn format_modified(value: Option<i64>) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");
    value
        .and_then(|stamp| time::OffsetDateTime::from_unix_timestamp(stamp).ok())
        .and_then(|date| date.format(&format).ok())
        .unwrap_or_else(|| "---- -- -- --:--".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn global_options_are_pulled_out() {
        let (global, tokens) = parse_global_options(&args(&[
            "scan",
            "--format",
            "json",
            "-vv",
            "shot.json",
            "--settings",
            "/tmp/settings.json",
        ]))
        .expect("parse");
        assert!(global.format == OutputFormat::Json);
        assert_eq!(global.verbosity, Verbosity::Debug);
        assert_eq!(global.settings, Some(PathBuf::from("/tmp/settings.json")));
        assert_eq!(tokens, args(&["scan", "shot.json"]));
    }

    #[test]
    fn update_collects_picks() {
        let command = parse_command(&args(&["update", "shot.json", "widget=v003", "--latest"]))
            .expect("parse");
        let CliCommand::Update { picks, latest, .. } = command else {
            panic!("expected update");
        };
        assert!(latest);
        assert_eq!(picks, vec![("widget".to_string(), "v003".to_string())]);
    }

    #[test]
    fn commands_need_a_scene() {
        assert!(parse_command(&args(&["refs"])).is_err());
        assert!(parse_command(&args(&["scan", "--dir", "/repo"])).is_err());
        assert!(parse_command(&args(&["bogus"])).is_err());
    }

    #[test]
    fn settings_edits_parse() {
        let command = parse_command(&args(&[
            "settings", "shot.json", "--dir", "/repo", "--auto", "widget", "--no-auto", "gadget_",
        ]))
        .expect("parse");
        let CliCommand::Settings { edit, .. } = command else {
            panic!("expected settings");
        };
        assert_eq!(edit.directory.as_deref(), Some("/repo"));
        assert_eq!(edit.enable, vec!["widget"]);
        assert_eq!(edit.disable, vec!["gadget_"]);
        assert_eq!(auto_key("widget"), "widget_");
    }

    #[test]
    fn missing_mtime_prints_placeholder() {
        assert_eq!(format_modified(None), "---- -- -- --:--");
        assert_eq!(format_modified(Some(0)), "1970-01-01 00:00");
    }
}
