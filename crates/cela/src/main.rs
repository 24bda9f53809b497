//! cela CLI
#![deny(unsafe_code)]

use anyhow::Context;
use cela::{Cli, Commands, commands};
use cela_core::config::ConfigLoader;
use clap::Parser;
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = camino::Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = camino::Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let log_settings = observability::LogSettings::new(
        config
            .log_dir
            .as_ref()
            .map(|dir| dir.as_std_path().to_path_buf()),
        cli.debug,
    );
    let env_filter =
        observability::env_filter(cli.quiet, cli.verbosity(), config.log_level.as_str());
    let _guard = observability::init_logging(&log_settings, env_filter)
        .context("failed to initialize logging/tracing")?;

    debug!(
        verbose = cli.verbose,
        debug = cli.debug,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    let result = match cli.command {
        Some(Commands::Parsers(args)) => {
            commands::parsers::cmd_parsers(args, cli.json, &config, &cwd)
        }
        Some(Commands::Info(args)) => commands::info::cmd_info(args, cli.json, &config, &cwd),
        Some(Commands::Doctor(args)) => {
            commands::doctor::cmd_doctor(args, cli.json, &config, &cwd)
        }
        None => commands::bump::cmd_bump(cli.bump, cli.json, &config, &cwd),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}
