//! Parsers command: list the parsers cela can run.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use cela_core::config::Config;
use cela_core::parser::{self, Parser, ScriptConfig};

/// Arguments for the `parsers` subcommand.
#[derive(Args, Debug, Default)]
pub struct ParsersArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct ParserListing {
    parsers_dir: String,
    parsers: Vec<ParserEntry>,
}

#[derive(Serialize)]
struct ParserEntry {
    name: String,
    dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fetcher: Option<ScriptEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updater: Option<ScriptEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct ScriptEntry {
    program: String,
    args: Vec<String>,
    available: bool,
}

impl ScriptEntry {
    fn new(script: &ScriptConfig, available: bool) -> Self {
        Self {
            program: script.program.clone(),
            args: script.args.to_vec(),
            available,
        }
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ParserEntry {
    fn loaded(parser: &Parser) -> Self {
        let (fetcher_ok, updater_ok) = parser.programs_available();
        let scripts = &parser.config.scripts;
        Self {
            name: parser.dir_name.clone(),
            dir: parser.dir.to_string(),
            config_file: Some(parser.config_file.to_string()),
            fetcher: Some(ScriptEntry::new(&scripts.fetcher, fetcher_ok)),
            updater: Some(ScriptEntry::new(&scripts.updater, updater_ok)),
            error: None,
        }
    }

    fn broken(dir: &camino::Utf8Path, error: &parser::ParserError) -> Self {
        Self {
            name: dir.file_name().unwrap_or_default().to_string(),
            dir: dir.to_string(),
            config_file: parser::find_parser_config(dir).map(|p| p.to_string()),
            fetcher: None,
            updater: None,
            error: Some(error.to_string()),
        }
    }
}

/// List every parser under the configured `parsers_dir`.
#[instrument(name = "cmd_parsers", skip_all, fields(json_output))]
pub fn cmd_parsers(
    _args: ParsersArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing parsers command");

    let parsers_dir = config.parsers_dir(cwd)?;
    let listing = ParserListing {
        parsers_dir: parsers_dir.to_string(),
        parsers: parser::list_parsers(&parsers_dir)?
            .iter()
            .map(|(dir, result)| match result {
                Ok(parser) => ParserEntry::loaded(parser),
                Err(err) => ParserEntry::broken(dir, err),
            })
            .collect(),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{}: {}", "Parsers directory".dimmed(), listing.parsers_dir.cyan());
    println!();
    if listing.parsers.is_empty() {
        println!("  {} No parsers found", "○".yellow());
        return Ok(());
    }

    for entry in &listing.parsers {
        if let Some(ref error) = entry.error {
            println!("  {} {}", "✗".red(), entry.name.bold());
            println!("      {}", error.red());
            continue;
        }
        println!("  {} {}", "●".green(), entry.name.bold());
        for (label, script) in [("fetcher", &entry.fetcher), ("updater", &entry.updater)] {
            if let Some(script) = script {
                let mark = if script.available {
                    "✓".green().to_string()
                } else {
                    "✗".red().to_string()
                };
                println!("      {mark} {}: {}", label.dimmed(), script.command_line());
            }
        }
    }

    Ok(())
}
