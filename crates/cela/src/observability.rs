//! Logging setup.
//!
//! Every event is written as one JSON object per line to a daily-rolled file.
//! With `--debug`, a compact text copy of each event also goes to stderr.
//!
//! Nothing here writes to stdout. Stdout carries command output, including
//! `--json` documents.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "CELA_LOG_PATH";
const ENV_LOG_DIR: &str = "CELA_LOG_DIR";
const LOG_FILE_NAME: &str = concat!(env!("CARGO_PKG_NAME"), ".jsonl");

/// Where logs go and whether they are mirrored to stderr.
#[derive(Clone, Debug, Default)]
pub struct LogSettings {
    /// `log_dir` from the loaded configuration.
    pub config_dir: Option<PathBuf>,
    /// Mirror events to stderr (`--debug`).
    pub console: bool,
}

impl LogSettings {
    /// Settings from the configured `log_dir` and the `--debug` flag.
    pub const fn new(config_dir: Option<PathBuf>, console: bool) -> Self {
        Self {
            config_dir,
            console,
        }
    }
}

/// Keeps the background log writer alive. Dropping it flushes pending lines.
pub struct LoggingGuard {
    _writer: WorkerGuard,
}

/// Install the global subscriber.
///
/// If no log file can be opened, file output falls back to stderr with a
/// warning rather than failing the command.
pub fn init_logging(settings: &LogSettings, filter: EnvFilter) -> Result<LoggingGuard> {
    let (writer, guard) = match file_writer(settings.config_dir.as_deref()) {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("Warning: {err:#}. Logging to stderr instead.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    let file_layer = fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_ansi(false)
        .with_writer(writer);

    let console_layer = settings.console.then(|| {
        fmt::layer()
            .compact()
            .without_time()
            .with_target(false)
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::debug!("logging initialized");
    Ok(LoggingGuard { _writer: guard })
}

/// Build the event filter.
///
/// `--quiet` wins, then `-v`/`--debug`, then `RUST_LOG`, then the
/// configured `log_level`.
pub fn env_filter(quiet: bool, verbosity: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

fn file_writer(config_dir: Option<&Path>) -> Result<(NonBlocking, WorkerGuard)> {
    let target = LogTarget::resolve(
        std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
        std::env::var_os(ENV_LOG_DIR).map(PathBuf::from),
        config_dir.map(Path::to_path_buf),
    )?;
    let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Resolved log location: the rolling appender adds a date suffix to
/// `file_name`.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: PathBuf,
    file_name: String,
}

impl LogTarget {
    /// `CELA_LOG_PATH` > `CELA_LOG_DIR` > config `log_dir` > the first
    /// writable default directory.
    fn resolve(
        path_override: Option<PathBuf>,
        dir_override: Option<PathBuf>,
        config_dir: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(path) = path_override {
            return Self::from_path(&path);
        }
        if let Some(dir) = dir_override.or(config_dir) {
            return Self::in_dir(dir);
        }

        let defaults = directories::ProjectDirs::from("", "", env!("CARGO_PKG_NAME"))
            .map(|dirs| dirs.data_local_dir().join("logs"))
            .into_iter()
            .chain(std::env::current_dir().ok());
        for dir in defaults {
            match Self::in_dir(dir) {
                Ok(target) => return Ok(target),
                Err(err) => tracing::trace!(error = %err, "log directory rejected"),
            }
        }
        bail!("no writable log directory found")
    }

    fn in_dir(dir: PathBuf) -> Result<Self> {
        let target = Self {
            dir,
            file_name: LOG_FILE_NAME.to_string(),
        };
        target.check_writable()?;
        Ok(target)
    }

    fn from_path(path: &Path) -> Result<Self> {
        let Some(file_name) = path.file_name() else {
            bail!("{ENV_LOG_PATH} must include a file name");
        };
        let Some(file_name) = file_name.to_str() else {
            bail!("{ENV_LOG_PATH} must be valid UTF-8");
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let target = Self {
            dir,
            file_name: file_name.to_string(),
        };
        target.check_writable()?;
        Ok(target)
    }

    fn check_writable(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create log directory {}", self.dir.display()))?;
        let path = self.dir.join(&self.file_name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
        Ok(())
    }
}
