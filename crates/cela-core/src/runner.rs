//! Running parser scripts.
//!
//! Fetchers and updaters are arbitrary executables configured per parser.
//! They run sequentially, to completion, in the parser's directory, with
//! stdout and stderr captured. There is no timeout: a script that never
//! exits blocks the run.
//!
//! The [`ScriptRunner`] trait is the seam the orchestrator depends on;
//! [`SystemRunner`] is the real implementation.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

/// Environment variable holding the directory cela was invoked from.
pub const ENV_CWD: &str = "CELA_CWD";

/// Environment variable holding the updater's JSON payload.
pub const ENV_DATA_JSON: &str = "CELA_DATA_JSON";

/// Errors from running a script.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// The program could not be started.
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program as configured.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Everything needed to start one script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    /// Program to execute, as configured.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Working directory (the parser directory).
    pub cwd: Utf8PathBuf,
    /// Extra environment variables, added to the inherited environment.
    pub env: Vec<(String, String)>,
}

impl ScriptInvocation {
    /// Look up an environment variable set on this invocation.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Captured result of a finished script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    /// Captured stdout (lossy UTF-8).
    pub stdout: String,
    /// Captured stderr (lossy UTF-8).
    pub stderr: String,
    /// Exit code, or `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Wall-clock run time.
    pub duration: Duration,
}

impl ScriptOutput {
    /// Whether the script exited with code 0.
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Something that can run a parser script to completion.
pub trait ScriptRunner {
    /// Run the script and capture its output.
    ///
    /// A non-zero exit is not an error at this level; callers inspect
    /// [`ScriptOutput::exit_code`].
    fn run(&self, invocation: &ScriptInvocation) -> RunnerResult<ScriptOutput>;
}

/// Runs scripts as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ScriptRunner for SystemRunner {
    #[instrument(skip_all, fields(program = %invocation.program, cwd = %invocation.cwd))]
    fn run(&self, invocation: &ScriptInvocation) -> RunnerResult<ScriptOutput> {
        let program = resolve_program(&invocation.program, &invocation.cwd);
        debug!(%program, args = ?invocation.args, "running script");

        let start = Instant::now();
        let output = Command::new(program.as_std_path())
            .args(&invocation.args)
            .current_dir(invocation.cwd.as_std_path())
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RunnerError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;
        let duration = start.elapsed();

        let result = ScriptOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
            duration,
        };

        debug!(
            exit_code = ?result.exit_code,
            duration_ms = duration.as_millis() as u64,
            stdout = result.stdout.trim(),
            stderr = result.stderr.trim(),
            "script finished"
        );

        Ok(result)
    }
}

/// Resolve a configured program against the parser directory.
///
/// Relative paths with a separator (`./fetch.sh`, `bin/update`) are joined
/// onto `cwd`. Bare names (`node`, `python3`) are left for `PATH` lookup.
pub fn resolve_program(program: &str, cwd: &Utf8Path) -> Utf8PathBuf {
    let path = Utf8Path::new(program);
    if path.is_relative() && path.components().count() > 1 {
        cwd.join(path)
    } else {
        path.to_path_buf()
    }
}

/// Whether a configured program can be found, either in the parser
/// directory or on `PATH`.
pub fn program_available(program: &str, cwd: &Utf8Path) -> bool {
    let resolved = resolve_program(program, cwd);
    if resolved.components().count() > 1 || resolved.is_absolute() {
        resolved.is_file()
    } else {
        which::which(program).is_ok()
    }
}
