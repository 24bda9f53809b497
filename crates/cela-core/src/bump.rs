//! Version bump planning and execution.
//!
//! All orchestration logic lives here. The CLI is purely a display layer.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_bump`]): locate the parser, run its fetcher, parse
//!    the reported version, and compute the next one (or take the custom
//!    version verbatim).
//! 2. **Execute** ([`ReadyBump::execute`]): run the parser's updater with
//!    the new version.
//!
//! A dry run stops after the plan and reports [`ReadyBump::preview`].

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::parser::{self, Parser, ParserError, ScriptConfig};
use crate::runner::{ENV_CWD, ENV_DATA_JSON, RunnerError, ScriptInvocation, ScriptRunner};
use crate::version::delta::{self, Directive, ResetPolicy, VersionDelta};
use crate::version::transition::{self, AdjustmentNote, TransitionConfig};
use crate::version::{FetchedVersion, VersionError};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Which parser script is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    /// Reports the current version.
    Fetcher,
    /// Applies the new version.
    Updater,
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetcher => write!(f, "fetcher"),
            Self::Updater => write!(f, "updater"),
        }
    }
}

/// Errors from bump operations.
#[derive(Error, Debug)]
pub enum BumpError {
    /// Locating or loading the parser failed.
    #[error(transparent)]
    Parser(#[from] ParserError),

    /// A script could not be started.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// A script exited unsuccessfully.
    #[error("{script} for parser {parser} exited with {}", describe_exit(.exit_code))]
    ScriptFailed {
        /// Which script failed.
        script: ScriptKind,
        /// Parser name.
        parser: String,
        /// Exit code, `None` if killed by a signal.
        exit_code: Option<i32>,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// The fetcher's stdout was not a JSON object.
    #[error("fetcher for parser {parser} must print a JSON object on stdout: {reason}")]
    InvalidFetcherOutput {
        /// Parser name.
        parser: String,
        /// What was wrong with the output.
        reason: String,
    },

    /// The fetcher's JSON has no string `version` key.
    #[error("fetcher for parser {parser} must include a string \"version\" key")]
    MissingVersion {
        /// Parser name.
        parser: String,
    },

    /// The fetcher's `version` is not a semantic version.
    #[error("fetcher for parser {parser} reported \"{raw}\": {source}")]
    InvalidVersion {
        /// Parser name.
        parser: String,
        /// The reported string.
        raw: String,
        /// Why it did not parse.
        #[source]
        source: VersionError,
    },
}

/// Result alias for bump operations.
pub type BumpResult<T> = Result<T, BumpError>;

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(
        || "no exit code (terminated by signal)".to_string(),
        |c| format!("exit code {c}"),
    )
}

// ──────────────────────────────────────────────
// Plan types
// ──────────────────────────────────────────────

/// What the user asked for.
#[derive(Debug, Clone, Default)]
pub struct BumpRequest {
    /// Parser directory name.
    pub parser: String,
    /// Increment/decrement directives, one per flag occurrence.
    pub directives: Vec<Directive>,
    /// Clamp and reset switches.
    pub transition: TransitionConfig,
    /// Literal version for the updater. Skips the transition entirely.
    pub custom_version: Option<String>,
}

/// How the next version was determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BumpStrategy {
    /// Computed from directives.
    Computed {
        /// Folded delta.
        delta: VersionDelta,
        /// Reset flags armed by increments.
        policy: ResetPolicy,
        /// Clamp and reset switches used.
        config: TransitionConfig,
    },
    /// Taken verbatim from `--custom`.
    Custom,
}

impl std::fmt::Display for BumpStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Computed { .. } => write!(f, "computed"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// A bump plan that is ready to execute.
#[derive(Debug, Clone)]
pub struct ReadyBump {
    /// The parser being run.
    pub parser: Parser,
    /// The version reported by the fetcher.
    pub previous: FetchedVersion,
    /// The version string the updater will receive.
    pub next: String,
    /// How `next` was determined.
    pub strategy: BumpStrategy,
    /// Clamps and resets applied by the transition.
    pub notes: Vec<AdjustmentNote>,
    /// The fetcher's JSON output, passed through to the updater.
    pub fetcher_json: Value,
    /// The fetcher's exit code (always zero for a plan that exists).
    pub fetcher_exit_code: Option<i32>,
    /// Directory cela was invoked from.
    pub invoked_from: Utf8PathBuf,
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// Plan a version bump: locate the parser, fetch, compute.
///
/// # Arguments
/// * `runner`: runs the fetcher
/// * `parsers_dir`: directory holding one subdirectory per parser
/// * `invoked_from`: exported to scripts as `CELA_CWD`
/// * `request`: parser name, directives, and overrides
#[instrument(skip(runner, request), fields(parser = %request.parser, %parsers_dir))]
pub fn plan_bump<R: ScriptRunner + ?Sized>(
    runner: &R,
    parsers_dir: &Utf8Path,
    invoked_from: &Utf8Path,
    request: &BumpRequest,
) -> BumpResult<ReadyBump> {
    // Step 1: Locate and load the parser
    let parser = parser::load_parser(parsers_dir, &request.parser)?;
    let name = parser.display_name().to_string();

    // Step 2: Run the fetcher
    let invocation = script_invocation(
        &parser,
        &parser.config.scripts.fetcher,
        invoked_from,
        Vec::new(),
    );
    let output = runner.run(&invocation)?;
    if !output.success() {
        return Err(BumpError::ScriptFailed {
            script: ScriptKind::Fetcher,
            parser: name,
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    // Step 3: Parse the fetcher's report
    let (fetcher_json, previous) = parse_fetcher_output(&name, &output.stdout)?;
    debug!(previous = %previous.version, lead = ?previous.lead, "fetched version");

    // Step 4: Determine the next version
    let (next, strategy, notes) = match request.custom_version {
        Some(ref custom) => {
            if !request.directives.is_empty() {
                warn!(
                    directives = request.directives.len(),
                    "custom version given, ignoring increment/decrement flags"
                );
            }
            (custom.clone(), BumpStrategy::Custom, Vec::new())
        }
        None => {
            let (delta, policy) = delta::fold(request.directives.iter().copied());
            let result =
                transition::transition(&previous.version, &delta, &policy, &request.transition);
            (
                previous.render(&result.version),
                BumpStrategy::Computed {
                    delta,
                    policy,
                    config: request.transition,
                },
                result.notes,
            )
        }
    };

    debug!(%next, %strategy, adjustments = notes.len(), "resolved next version");

    Ok(ReadyBump {
        parser,
        previous,
        next,
        strategy,
        notes,
        fetcher_json,
        fetcher_exit_code: output.exit_code,
        invoked_from: invoked_from.to_path_buf(),
    })
}

/// Parse fetcher stdout into its JSON object and version.
fn parse_fetcher_output(parser: &str, stdout: &str) -> BumpResult<(Value, FetchedVersion)> {
    let json: Value =
        serde_json::from_str(stdout).map_err(|e| BumpError::InvalidFetcherOutput {
            parser: parser.to_string(),
            reason: e.to_string(),
        })?;
    if !json.is_object() {
        return Err(BumpError::InvalidFetcherOutput {
            parser: parser.to_string(),
            reason: "output is valid JSON but not an object".to_string(),
        });
    }

    let raw = json
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| BumpError::MissingVersion {
            parser: parser.to_string(),
        })?;
    let fetched = FetchedVersion::parse(raw).map_err(|source| BumpError::InvalidVersion {
        parser: parser.to_string(),
        raw: raw.to_string(),
        source,
    })?;

    Ok((json, fetched))
}

fn script_invocation(
    parser: &Parser,
    script: &ScriptConfig,
    invoked_from: &Utf8Path,
    mut env: Vec<(String, String)>,
) -> ScriptInvocation {
    env.insert(0, (ENV_CWD.to_string(), invoked_from.to_string()));
    ScriptInvocation {
        program: script.program.clone(),
        args: script.args.to_vec(),
        cwd: parser.dir.clone(),
        env,
    }
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

/// Result of a bump, executed or previewed.
#[derive(Debug, Clone, Serialize)]
pub struct BumpOutcome {
    /// Parser display name.
    pub parser: String,
    /// The version reported by the fetcher, as reported.
    pub previous: String,
    /// The version sent (or to be sent) to the updater.
    pub next: String,
    /// How `next` was determined.
    pub strategy: BumpStrategy,
    /// Clamps and resets applied.
    pub notes: Vec<AdjustmentNote>,
    /// Fetcher exit code.
    pub fetcher_exit_code: Option<i32>,
    /// Updater exit code; `None` for a dry run.
    pub updater_exit_code: Option<i32>,
    /// Whether the updater was skipped.
    pub dry_run: bool,
}

impl ReadyBump {
    /// The JSON payload handed to the updater in `CELA_DATA_JSON`.
    pub fn data_json(&self) -> Value {
        json!({
            "version": self.next,
            "fetcher_json": self.fetcher_json,
        })
    }

    /// Describe the plan without running the updater.
    pub fn preview(&self) -> BumpOutcome {
        self.outcome(None, true)
    }

    /// Execute the bump: run the updater with the new version.
    #[instrument(skip_all, fields(parser = %self.parser.display_name(), next = %self.next))]
    pub fn execute<R: ScriptRunner + ?Sized>(&self, runner: &R) -> BumpResult<BumpOutcome> {
        let data = self.data_json().to_string();
        let invocation = script_invocation(
            &self.parser,
            &self.parser.config.scripts.updater,
            &self.invoked_from,
            vec![(ENV_DATA_JSON.to_string(), data)],
        );

        let output = runner.run(&invocation)?;
        if !output.success() {
            return Err(BumpError::ScriptFailed {
                script: ScriptKind::Updater,
                parser: self.parser.display_name().to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        info!(
            previous = %self.previous.raw.trim(),
            new = %self.next,
            "bump complete"
        );

        Ok(self.outcome(output.exit_code, false))
    }

    fn outcome(&self, updater_exit_code: Option<i32>, dry_run: bool) -> BumpOutcome {
        BumpOutcome {
            parser: self.parser.display_name().to_string(),
            previous: self.previous.raw.trim().to_string(),
            next: self.next.clone(),
            strategy: self.strategy.clone(),
            notes: self.notes.clone(),
            fetcher_exit_code: self.fetcher_exit_code,
            updater_exit_code,
            dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{RunnerResult, ScriptOutput};
    use crate::version::Component::{Major, Minor, Patch};
    use crate::version::transition::AdjustmentReason;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use Directive::{Decrement, Increment};

    /// Replays canned outputs and records every invocation.
    #[derive(Default)]
    struct MockRunner {
        outputs: RefCell<VecDeque<ScriptOutput>>,
        calls: RefCell<Vec<ScriptInvocation>>,
    }

    impl MockRunner {
        fn with_outputs(outputs: impl IntoIterator<Item = (i32, &'static str)>) -> Self {
            let runner = Self::default();
            for (code, stdout) in outputs {
                runner.outputs.borrow_mut().push_back(ScriptOutput {
                    stdout: stdout.to_string(),
                    stderr: if code == 0 { String::new() } else { "boom\n".to_string() },
                    exit_code: Some(code),
                    duration: Duration::ZERO,
                });
            }
            runner
        }

        fn calls(&self) -> Vec<ScriptInvocation> {
            self.calls.borrow().clone()
        }
    }

    impl ScriptRunner for MockRunner {
        fn run(&self, invocation: &ScriptInvocation) -> RunnerResult<ScriptOutput> {
            self.calls.borrow_mut().push(invocation.clone());
            Ok(self
                .outputs
                .borrow_mut()
                .pop_front()
                .expect("unexpected script invocation"))
        }
    }

    fn parsers_dir() -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let dir = root.join("npm");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("cela.yml"),
            concat!(
                "name: npm-package\n",
                "scripts:\n",
                "  fetcher:\n    program: ./fetch.sh\n    args: --json\n",
                "  updater:\n    program: ./update.sh\n",
            ),
        )
        .unwrap();
        (tmp, root)
    }

    fn request(directives: &[Directive]) -> BumpRequest {
        BumpRequest {
            parser: "npm".into(),
            directives: directives.to_vec(),
            ..BumpRequest::default()
        }
    }

    #[test]
    fn plan_computes_next_version() {
        let (_tmp, root) = parsers_dir();
        let runner =
            MockRunner::with_outputs([(0, r#"{"version": "v1.2.3", "file": "package.json"}"#)]);

        let plan = plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[Increment(Major)]))
            .unwrap();

        assert_eq!(plan.next, "v2.0.0");
        assert_eq!(plan.previous.version.triple(), (1, 2, 3));
        assert_eq!(plan.notes.len(), 2);
        assert!(plan.notes.iter().all(|n| n.reason == AdjustmentReason::PrecedenceReset));
        assert_eq!(plan.fetcher_json["file"], "package.json");
    }

    #[test]
    fn plan_runs_fetcher_in_parser_dir_with_cwd_env() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(0, r#"{"version": "0.1.0"}"#)]);

        plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[])).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "./fetch.sh");
        assert_eq!(calls[0].args, vec!["--json"]);
        assert_eq!(calls[0].cwd, root.join("npm"));
        assert_eq!(calls[0].env_var(ENV_CWD), Some("/work"));
        assert_eq!(calls[0].env_var(ENV_DATA_JSON), None);
    }

    #[test]
    fn plan_with_custom_version_skips_transition() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(0, r#"{"version": "1.2.3"}"#)]);
        let mut req = request(&[Increment(Major)]);
        req.custom_version = Some("9.9.9-custom".into());

        let plan = plan_bump(&runner, &root, Utf8Path::new("/work"), &req).unwrap();

        assert_eq!(plan.next, "9.9.9-custom");
        assert_eq!(plan.strategy, BumpStrategy::Custom);
        assert!(plan.notes.is_empty());
    }

    #[test]
    fn plan_clamp_wins_over_reset() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(0, r#"{"version": "1.5.0"}"#)]);

        let plan = plan_bump(
            &runner,
            &root,
            Utf8Path::new("/work"),
            &request(&[Increment(Minor), Decrement(Patch)]),
        )
        .unwrap();

        assert_eq!(plan.next, "1.6.0");
        assert_eq!(plan.notes.len(), 1);
        assert_eq!(plan.notes[0].reason, AdjustmentReason::NegativeClamp);
    }

    #[test]
    fn plan_respects_transition_overrides() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(0, r#"{"version": "=0.3.0"}"#)]);
        let mut req = request(&[Increment(Major), Decrement(Patch)]);
        req.transition = TransitionConfig {
            allow_negative_clamp: false,
            allow_reset_by_precedence: false,
        };

        let plan = plan_bump(&runner, &root, Utf8Path::new("/work"), &req).unwrap();

        assert_eq!(plan.next, "=1.3.-1");
        assert!(plan.notes.is_empty());
    }

    #[test]
    fn plan_fails_when_fetcher_fails() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(4, "")]);

        let err = plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[])).unwrap_err();

        match err {
            BumpError::ScriptFailed {
                script,
                exit_code,
                stderr,
                ..
            } => {
                assert_eq!(script, ScriptKind::Fetcher);
                assert_eq!(exit_code, Some(4));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn plan_rejects_non_json_output() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(0, "1.2.3\n")]);

        let err = plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[])).unwrap_err();
        assert!(matches!(err, BumpError::InvalidFetcherOutput { .. }));
    }

    #[test]
    fn plan_rejects_non_object_json() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(0, r#"["1.2.3"]"#)]);

        let err = plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[])).unwrap_err();
        assert!(matches!(err, BumpError::InvalidFetcherOutput { .. }));
    }

    #[test]
    fn plan_rejects_missing_or_non_string_version() {
        let (_tmp, root) = parsers_dir();
        for stdout in [r#"{"name": "x"}"#, r#"{"version": 3}"#] {
            let runner = MockRunner::with_outputs([(0, stdout)]);
            let err =
                plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[])).unwrap_err();
            assert!(matches!(err, BumpError::MissingVersion { .. }), "{stdout}");
        }
    }

    #[test]
    fn plan_rejects_invalid_semver() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(0, r#"{"version": "1.2"}"#)]);

        let err = plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[])).unwrap_err();
        assert!(matches!(err, BumpError::InvalidVersion { ref raw, .. } if raw == "1.2"));
    }

    #[test]
    fn plan_reports_unknown_parser_without_running_scripts() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::default();
        let mut req = request(&[]);
        req.parser = "cargo".into();

        let err = plan_bump(&runner, &root, Utf8Path::new("/work"), &req).unwrap_err();
        assert!(matches!(err, BumpError::Parser(ParserError::NotFound { .. })));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn execute_passes_data_json_to_updater() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([
            (0, r#"{"version": "v0.9.1", "path": "package.json"}"#),
            (0, "updated\n"),
        ]);

        let plan = plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[Increment(Minor)]))
            .unwrap();
        let outcome = plan.execute(&runner).unwrap();

        assert_eq!(outcome.previous, "v0.9.1");
        assert_eq!(outcome.next, "v0.10.0");
        assert_eq!(outcome.updater_exit_code, Some(0));
        assert!(!outcome.dry_run);

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        let updater = &calls[1];
        assert_eq!(updater.program, "./update.sh");
        assert_eq!(updater.env_var(ENV_CWD), Some("/work"));

        let data: Value = serde_json::from_str(updater.env_var(ENV_DATA_JSON).unwrap()).unwrap();
        assert_eq!(data["version"], "v0.10.0");
        assert_eq!(data["fetcher_json"]["version"], "v0.9.1");
        assert_eq!(data["fetcher_json"]["path"], "package.json");
    }

    #[test]
    fn execute_reports_updater_failure() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(0, r#"{"version": "1.0.0"}"#), (1, "")]);

        let plan = plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[Increment(Patch)]))
            .unwrap();
        let err = plan.execute(&runner).unwrap_err();

        assert!(matches!(
            err,
            BumpError::ScriptFailed {
                script: ScriptKind::Updater,
                exit_code: Some(1),
                ..
            }
        ));
        assert!(err.to_string().contains("exit code 1"));
    }

    #[test]
    fn preview_does_not_run_updater() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(0, r#"{"version": "0.0.1"}"#)]);

        let plan = plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[Decrement(Patch)]))
            .unwrap();
        let outcome = plan.preview();

        assert!(outcome.dry_run);
        assert_eq!(outcome.next, "0.0.0");
        assert_eq!(outcome.updater_exit_code, None);
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn outcome_serializes_for_json_output() {
        let (_tmp, root) = parsers_dir();
        let runner = MockRunner::with_outputs([(0, r#"{"version": "0.0.0"}"#)]);

        let plan = plan_bump(&runner, &root, Utf8Path::new("/work"), &request(&[Decrement(Major)]))
            .unwrap();
        let json = serde_json::to_value(plan.preview()).unwrap();

        assert_eq!(json["parser"], "npm-package");
        assert_eq!(json["next"], "0.0.0");
        assert_eq!(json["strategy"]["kind"], "computed");
        assert_eq!(json["notes"][0]["component"], "major");
        assert_eq!(json["notes"][0]["old_value"], -1);
        assert_eq!(json["notes"][0]["reason"], "NEGATIVE_CLAMP");
        assert_eq!(json["dry_run"], true);
    }
}
