//! Doctor command: diagnose configuration, parsers, and environment.

use clap::Args;
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use cela_core::config::{self, Config};
use cela_core::parser;

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    directories: DirectoryPaths,
    config: ConfigStatus,
    parsers: ParsersStatus,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data: Option<String>,
    data_local: Option<String>,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Project dotfile, if any
    project_file: Option<String>,
    /// User config file, if any
    user_file: Option<String>,
    /// Whether any config file was found
    found: bool,
}

#[derive(Serialize)]
struct ParsersStatus {
    /// Resolved parsers directory, if configured
    dir: Option<String>,
    /// Whether the directory exists
    exists: bool,
    /// Parsers that loaded
    loaded: Vec<String>,
    /// Parsers whose config failed to load, with the reason
    broken: Vec<BrokenParser>,
    /// Parsers whose fetcher or updater program cannot be found
    missing_programs: Vec<String>,
}

#[derive(Serialize)]
struct BrokenParser {
    name: String,
    error: String,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    /// Current working directory
    cwd: Option<String>,
    /// Relevant environment variables
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

impl EnvVar {
    fn read(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            value: std::env::var(name).ok(),
            description,
        }
    }
}

impl ParsersStatus {
    fn gather(config: &Config, cwd: &camino::Utf8Path) -> Self {
        let mut status = Self {
            dir: None,
            exists: false,
            loaded: Vec::new(),
            broken: Vec::new(),
            missing_programs: Vec::new(),
        };
        let Ok(dir) = config.parsers_dir(cwd) else {
            return status;
        };
        status.exists = dir.is_dir();
        status.dir = Some(dir.to_string());
        if !status.exists {
            return status;
        }

        let Ok(entries) = parser::list_parsers(&dir) else {
            return status;
        };
        for (path, result) in entries {
            let name = path.file_name().unwrap_or_default().to_string();
            match result {
                Ok(parser) => {
                    let (fetcher_ok, updater_ok) = parser.programs_available();
                    if !(fetcher_ok && updater_ok) {
                        status.missing_programs.push(name.clone());
                    }
                    status.loaded.push(name);
                }
                Err(err) => status.broken.push(BrokenParser {
                    name,
                    error: err.to_string(),
                }),
            }
        }
        status
    }
}

impl DoctorReport {
    fn gather(config: &Config, cwd: &camino::Utf8Path) -> Self {
        let project_file = config::find_project_config(cwd);
        let user_file = config::find_user_config();

        Self {
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                data: config::user_data_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
            },
            config: ConfigStatus {
                found: project_file.is_some() || user_file.is_some(),
                project_file: project_file.map(|p| p.to_string()),
                user_file: user_file.map(|p| p.to_string()),
            },
            parsers: ParsersStatus::gather(config, cwd),
            environment: EnvironmentInfo {
                cwd: Some(cwd.to_string()),
                env_vars: vec![
                    EnvVar::read("XDG_CONFIG_HOME", "Override config directory"),
                    EnvVar::read("XDG_DATA_HOME", "Override data directory"),
                    EnvVar::read("RUST_LOG", "Log filter directive"),
                    EnvVar::read("CELA_LOG_PATH", "Explicit log file path"),
                    EnvVar::read("CELA_LOG_DIR", "Log directory"),
                ],
            },
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `cwd` - Current working directory
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = super::spinner(!global_json, "Gathering diagnostics...");
    let report = DoctorReport::gather(config, cwd);
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    if let Some(ref file) = report.config.project_file {
        println!("  {} Project config: {}", "✓".green(), file.cyan());
    }
    if let Some(ref file) = report.config.user_file {
        println!("  {} User config: {}", "✓".green(), file.cyan());
    }
    if !report.config.found {
        println!("  {} No config file found", "○".yellow());
        offer_config_creation()?;
    }
    println!();

    println!("{}", "Parsers".bold().underline());
    print_parsers(&report.parsers);
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Cache", report.directories.cache.as_deref());
    print_dir("  Data", report.directories.data.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), cwd.cyan());
    let set_vars: Vec<_> = report
        .environment
        .env_vars
        .iter()
        .filter(|v| v.value.is_some())
        .collect();
    if set_vars.is_empty() {
        println!("  {} No XDG/logging overrides set", "○".dimmed());
    } else {
        for var in set_vars {
            println!(
                "  {}: {}",
                var.name.dimmed(),
                var.value.as_deref().unwrap_or_default().cyan()
            );
        }
    }

    Ok(())
}

fn print_parsers(status: &ParsersStatus) {
    let Some(ref dir) = status.dir else {
        println!("  {} parsers_dir is not configured", "✗".red());
        return;
    };
    if !status.exists {
        println!("  {} {} does not exist", "✗".red(), dir.cyan());
        return;
    }
    println!("  {} Directory: {}", "✓".green(), dir.cyan());
    println!("  {} {} parser(s) loaded", "✓".green(), status.loaded.len());
    for name in &status.missing_programs {
        println!(
            "  {} {}: fetcher or updater program not found",
            "!".yellow(),
            name.bold()
        );
    }
    for broken in &status.broken {
        println!("  {} {}: {}", "✗".red(), broken.name.bold(), broken.error);
    }
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// Offer to create a user config file when none exists.
fn offer_config_creation() -> anyhow::Result<()> {
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };
    let config_path = config_dir.join("config.yml");

    // Don't prompt if running non-interactively
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }

    let create = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    // Declined or interrupted: nothing to do
    if !matches!(create, Ok(true)) {
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    let default_config = Config {
        parsers_dir: Some(config_dir.join("parsers")),
        ..Config::default()
    };
    std::fs::write(&config_path, serde_saphyr::to_string(&default_config)?)?;
    println!("  {} Created {}", "✓".green(), config_path.cyan());

    Ok(())
}
