//! Library interface for the `cela` CLI.
//!
//! This crate exposes the CLI's argument parser and command structure as a library,
//! primarily for documentation generation and testing. The actual entry point is
//! in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Auxiliary subcommands; a bare `cela <PARSER_NAME>` bumps
//! - [`commands`] - Command implementations
//!
//! # Documentation Generation
//!
//! The [`command()`] function returns the clap `Command` for generating man pages
//! and shell completions via `xtask`.

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output based on this choice.
    ///
    /// Call this once at startup to set the color mode.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG          Log filter (e.g., debug, cela_core=trace)
    CELA_LOG_PATH     Explicit log file path
    CELA_LOG_DIR      Log directory

SCRIPT ENVIRONMENT:
    CELA_CWD          Directory cela was invoked from (fetcher and updater)
    CELA_DATA_JSON    {\"version\", \"fetcher_json\"} payload (updater only)
";

/// Command-line interface definition for cela.
#[derive(Parser)]
#[command(name = "cela")]
#[command(
    about = "Increment or decrement semantic versions on files using custom parsers",
    long_about = None
)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
#[command(subcommand_negates_reqs = true)]
pub struct Cli {
    /// Auxiliary subcommand. Without one, cela bumps `PARSER_NAME`.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Version bump arguments.
    #[command(flatten)]
    pub bump: commands::bump::BumpArgs,

    /// Log debug output to stderr (implies -v)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(long, global = true, value_name = "DIR")]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

impl Cli {
    /// Effective verbosity: `--debug` counts as at least one `-v`.
    pub fn verbosity(&self) -> u8 {
        if self.debug {
            self.verbose.max(1)
        } else {
            self.verbose
        }
    }
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// List parsers in the configured parsers directory
    Parsers(commands::parsers::ParsersArgs),

    /// Show package and configuration information
    Info(commands::info::InfoArgs),

    /// Diagnose configuration and environment
    Doctor(commands::doctor::DoctorArgs),
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}
