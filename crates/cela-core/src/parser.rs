//! Parser discovery and parser configuration.
//!
//! A parser is a directory under the configured `parsers_dir`. The directory
//! name is the parser name, and it contains a `cela.yml` describing the
//! fetcher and updater scripts:
//!
//! ```yaml
//! name: npm-package
//! scripts:
//!   fetcher:
//!     program: ./fetch.sh
//!   updater:
//!     program: node
//!     args: [update.js, --write]
//! ```
//!
//! `args` may be a single string or a list.

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Toml, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::runner;

/// Parser config file names, in order of preference.
const PARSER_CONFIG_FILES: &[&str] = &["cela.yml", "cela.yaml", "cela.toml", "cela.json"];

/// Errors from locating or loading a parser.
#[derive(Error, Debug)]
pub enum ParserError {
    /// No directory in `parsers_dir` matched the requested name.
    #[error("parser \"{name}\" did not match any directory in {parsers_dir}")]
    NotFound {
        /// The requested parser name.
        name: String,
        /// Where we looked.
        parsers_dir: Utf8PathBuf,
    },

    /// The parsers directory could not be read.
    #[error("failed to read parsers directory {path}: {source}")]
    ReadDir {
        /// The parsers directory.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The parser directory has no config file.
    #[error("no cela.yml found in parser directory {0}")]
    ConfigMissing(Utf8PathBuf),

    /// The parser config file is malformed.
    #[error("invalid parser configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),
}

/// Result alias for parser operations.
pub type ParserResult<T> = Result<T, ParserError>;

/// Arguments for a script: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ScriptArgs {
    /// `args: --json`
    One(String),
    /// `args: [--json, --pretty]`
    Many(Vec<String>),
}

impl Default for ScriptArgs {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl ScriptArgs {
    /// Flatten into an argument vector.
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(arg) => vec![arg.clone()],
            Self::Many(args) => args.clone(),
        }
    }
}

/// One script entry (`fetcher` or `updater`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScriptConfig {
    /// Program to run. Relative paths resolve against the parser directory.
    pub program: String,
    /// Arguments for the program.
    #[serde(default)]
    pub args: ScriptArgs,
}

/// The `scripts` section of a parser config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Scripts {
    /// Reports the current version as JSON on stdout.
    pub fetcher: ScriptConfig,
    /// Applies the new version from `CELA_DATA_JSON`.
    pub updater: ScriptConfig,
}

/// Contents of a parser's `cela.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ParserConfig {
    /// Display name. Defaults to the directory name when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Fetcher and updater scripts.
    pub scripts: Scripts,
}

/// A located parser: its directory and loaded config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parser {
    /// Directory name under `parsers_dir`.
    pub dir_name: String,
    /// Full path to the parser directory.
    pub dir: Utf8PathBuf,
    /// Path of the config file that was loaded.
    pub config_file: Utf8PathBuf,
    /// Parsed config.
    pub config: ParserConfig,
}

impl Parser {
    /// Name for display: the configured name, else the directory name.
    pub fn display_name(&self) -> &str {
        self.config.name.as_deref().unwrap_or(&self.dir_name)
    }

    /// Load a parser from its directory.
    #[instrument(fields(%dir))]
    pub fn load(dir: &Utf8Path) -> ParserResult<Self> {
        let config_file =
            find_parser_config(dir).ok_or_else(|| ParserError::ConfigMissing(dir.to_path_buf()))?;
        let figment = match config_file.extension() {
            Some("toml") => Figment::new().merge(Toml::file_exact(config_file.as_str())),
            Some("json") => Figment::new().merge(Json::file_exact(config_file.as_str())),
            _ => Figment::new().merge(Yaml::file_exact(config_file.as_str())),
        };
        let config: ParserConfig = figment
            .extract()
            .map_err(|e| ParserError::Deserialize(Box::new(e)))?;
        debug!(?config, "loaded parser configuration");

        Ok(Self {
            dir_name: dir.file_name().unwrap_or_default().to_string(),
            dir: dir.to_path_buf(),
            config_file,
            config,
        })
    }

    /// Whether the fetcher and updater programs can be found.
    pub fn programs_available(&self) -> (bool, bool) {
        let scripts = &self.config.scripts;
        (
            runner::program_available(&scripts.fetcher.program, &self.dir),
            runner::program_available(&scripts.updater.program, &self.dir),
        )
    }
}

/// Find the parser config file in a parser directory.
pub fn find_parser_config(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    PARSER_CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Find the directory for parser `name` under `parsers_dir`.
///
/// Only immediate subdirectories are considered, and the name must match
/// exactly. Regular files with a matching name are skipped.
#[instrument(fields(%parsers_dir))]
pub fn locate_parser(parsers_dir: &Utf8Path, name: &str) -> ParserResult<Utf8PathBuf> {
    for entry in subdirectories(parsers_dir)? {
        if entry.file_name() == Some(name) {
            debug!(dir = %entry, "matched parser directory");
            return Ok(entry);
        }
        debug!(dir = %entry, "skipping, name did not match");
    }

    Err(ParserError::NotFound {
        name: name.to_string(),
        parsers_dir: parsers_dir.to_path_buf(),
    })
}

/// Locate and load parser `name`.
pub fn load_parser(parsers_dir: &Utf8Path, name: &str) -> ParserResult<Parser> {
    let dir = locate_parser(parsers_dir, name)?;
    Parser::load(&dir)
}

/// Every subdirectory of `parsers_dir` that has a parser config file, sorted
/// by name.
///
/// Directories whose config fails to load are returned as errors alongside
/// the successfully loaded parsers so callers can report them.
#[instrument(fields(%parsers_dir))]
pub fn list_parsers(
    parsers_dir: &Utf8Path,
) -> ParserResult<Vec<(Utf8PathBuf, ParserResult<Parser>)>> {
    let mut dirs: Vec<Utf8PathBuf> = subdirectories(parsers_dir)?
        .into_iter()
        .filter(|dir| find_parser_config(dir).is_some())
        .collect();
    dirs.sort();
    debug!(count = dirs.len(), "found parser directories");

    Ok(dirs
        .into_iter()
        .map(|dir| {
            let parser = Parser::load(&dir);
            (dir, parser)
        })
        .collect())
}

fn subdirectories(parsers_dir: &Utf8Path) -> ParserResult<Vec<Utf8PathBuf>> {
    let read_dir_error = |source| ParserError::ReadDir {
        path: parsers_dir.to_path_buf(),
        source,
    };

    let mut dirs = Vec::new();
    for entry in parsers_dir.as_std_path().read_dir().map_err(read_dir_error)? {
        let path = match Utf8PathBuf::try_from(entry.map_err(read_dir_error)?.path()) {
            Ok(path) => path,
            Err(err) => {
                debug!(path = %err.as_path().display(), "skipping, name is not valid UTF-8");
                continue;
            }
        };
        if path.is_dir() {
            dirs.push(path);
        } else {
            debug!(%path, "skipping, not a directory");
        }
    }
    Ok(dirs)
}
