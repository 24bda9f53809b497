//! Bump command: thin CLI layer over `cela_core::bump`.

use anyhow::Context;
use clap::{ArgAction, Args};
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use cela_core::bump::{self, BumpError, BumpOutcome, BumpRequest};
use cela_core::config::Config;
use cela_core::runner::SystemRunner;
use cela_core::version::Component;
use cela_core::version::delta::Directive;
use cela_core::version::transition::TransitionConfig;

/// Arguments for a version bump (`cela <PARSER_NAME> [FLAGS]`).
#[derive(Args, Debug, Default)]
pub struct BumpArgs {
    /// Name of the parser directory to run
    #[arg(value_name = "PARSER_NAME", required = true)]
    pub parser_name: Option<String>,

    /// Increment MAJOR by 1 (repeatable)
    #[arg(short = 'M', num_args = 0, default_missing_value = "true", action = ArgAction::Append)]
    pub major: Vec<bool>,

    /// Increment MINOR by 1 (repeatable)
    #[arg(short = 'm', num_args = 0, default_missing_value = "true", action = ArgAction::Append)]
    pub minor: Vec<bool>,

    /// Increment PATCH by 1 (repeatable)
    #[arg(short = 'p', num_args = 0, default_missing_value = "true", action = ArgAction::Append)]
    pub patch: Vec<bool>,

    /// Decrement MAJOR by 1 (repeatable)
    #[arg(short = 'z', num_args = 0, default_missing_value = "true", action = ArgAction::Append)]
    pub dec_major: Vec<bool>,

    /// Decrement MINOR by 1 (repeatable)
    #[arg(short = 'x', num_args = 0, default_missing_value = "true", action = ArgAction::Append)]
    pub dec_minor: Vec<bool>,

    /// Decrement PATCH by 1 (repeatable)
    #[arg(short = 'c', num_args = 0, default_missing_value = "true", action = ArgAction::Append)]
    pub dec_patch: Vec<bool>,

    /// Send VERSION to the updater as-is, ignoring all other version flags
    #[arg(short = 'C', long, value_name = "VERSION")]
    pub custom: Option<String>,

    /// Run the fetcher and show the new version without running the updater
    #[arg(short = 'D', long)]
    pub dry_run: bool,

    /// Do not reset lower components when a higher one is incremented
    #[arg(short = 'r', long)]
    pub no_reset: bool,

    /// Allow components to go negative instead of clamping to zero
    #[arg(short = 'Z', long)]
    pub no_zero: bool,
}

// Version flags are collected one entry per occurrence. `ArgAction::Count`
// stops at `u8::MAX`, and repeated flags must reach `fold` uncapped.
impl BumpArgs {
    /// One directive per flag occurrence.
    pub fn directives(&self) -> Vec<Directive> {
        let counts = [
            (&self.major, Directive::Increment(Component::Major)),
            (&self.minor, Directive::Increment(Component::Minor)),
            (&self.patch, Directive::Increment(Component::Patch)),
            (&self.dec_major, Directive::Decrement(Component::Major)),
            (&self.dec_minor, Directive::Decrement(Component::Minor)),
            (&self.dec_patch, Directive::Decrement(Component::Patch)),
        ];
        counts
            .into_iter()
            .flat_map(|(seen, directive)| std::iter::repeat_n(directive, seen.len()))
            .collect()
    }

    /// Clamp and reset switches derived from `--no-zero` and `--no-reset`.
    pub const fn transition_config(&self) -> TransitionConfig {
        TransitionConfig {
            allow_negative_clamp: !self.no_zero,
            allow_reset_by_precedence: !self.no_reset,
        }
    }

    fn request(&self, parser: String) -> BumpRequest {
        BumpRequest {
            parser,
            directives: self.directives(),
            transition: self.transition_config(),
            custom_version: self.custom.clone(),
        }
    }
}

/// Execute a version bump.
#[instrument(name = "cmd_bump", skip_all, fields(json_output))]
pub fn cmd_bump(
    args: BumpArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, ?args, "executing bump command");

    let Some(parser_name) = args.parser_name.clone() else {
        anyhow::bail!("a PARSER_NAME is required (see `cela parsers`)");
    };
    let parsers_dir = config.parsers_dir(cwd)?;
    let request = args.request(parser_name);

    // Plan: locate the parser, run the fetcher, compute the next version
    let spinner = super::spinner(!global_json, "Fetching current version...");
    let planned = bump::plan_bump(&SystemRunner, &parsers_dir, cwd, &request);
    spinner.finish_and_clear();
    let ready = planned
        .inspect_err(report_script_stderr)
        .context("bump planning failed")?;

    if args.dry_run {
        let preview = ready.preview();
        if global_json {
            println!("{}", serde_json::to_string_pretty(&preview)?);
        } else {
            print_outcome(&preview);
            println!();
            println!("{}", "Dry run: updater not run.".yellow());
        }
        return Ok(());
    }

    // Execute: hand the new version to the updater
    let spinner = super::spinner(!global_json, "Running updater...");
    let executed = ready.execute(&SystemRunner);
    spinner.finish_and_clear();
    let outcome = executed
        .inspect_err(report_script_stderr)
        .context("bump failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
        println!();
        println!(
            "  {} Updated version from {} to {}",
            "✓".green(),
            outcome.previous.dimmed(),
            outcome.next.green().bold()
        );
    }

    Ok(())
}

fn print_outcome(outcome: &BumpOutcome) {
    println!("{}: {}", "Parser".dimmed(), outcome.parser.cyan());
    println!(
        "{}: {} → {}",
        "Version".bold(),
        outcome.previous.dimmed(),
        outcome.next.green().bold()
    );
    println!("{}: {}", "Strategy".dimmed(), outcome.strategy);
    for note in &outcome.notes {
        println!("  {} {}", "↺".yellow(), note);
    }
    println!(
        "{}: {}",
        "Fetcher exit code".dimmed(),
        display_code(outcome.fetcher_exit_code)
    );
    if !outcome.dry_run {
        println!(
            "{}: {}",
            "Updater exit code".dimmed(),
            display_code(outcome.updater_exit_code)
        );
    }
}

fn display_code(code: Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Echo a failed script's stderr so the user sees what it complained about.
fn report_script_stderr(err: &BumpError) {
    if let BumpError::ScriptFailed { script, stderr, .. } = err
        && !stderr.is_empty()
    {
        eprintln!("{}", format!("{script} stderr:").red().bold());
        for line in stderr.lines() {
            eprintln!("  {}", line.dimmed());
        }
    }
}
