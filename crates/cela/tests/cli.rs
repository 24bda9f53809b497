//! End-to-end CLI integration tests
//!
//! These tests invoke the compiled binary as a subprocess to verify
//! that the CLI behaves correctly from a user's perspective.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
///
/// Note: `cargo_bin` is marked deprecated for edge cases involving custom
/// cargo build directories, but works correctly for standard project layouts.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

/// A parsers directory with shell-script parsers, a config file pointing at
/// it, and a separate working directory to invoke cela from.
struct Fixture {
    tmp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            tmp: TempDir::new().unwrap(),
        };
        fs::create_dir_all(fixture.work()).unwrap();
        fs::create_dir_all(fixture.parsers()).unwrap();
        fs::write(
            fixture.config(),
            format!("parsers_dir: {}\n", fixture.parsers().display()),
        )
        .unwrap();

        fixture.add_parser(
            "npm",
            r#"printf '{"version": "v1.2.3", "file": "package.json"}'"#,
            r#"printf '%s' "$CELA_DATA_JSON" > "$CELA_CWD/updated.json""#,
        );
        fixture
    }

    fn work(&self) -> PathBuf {
        self.tmp.path().join("work")
    }

    fn parsers(&self) -> PathBuf {
        self.tmp.path().join("parsers")
    }

    fn config(&self) -> PathBuf {
        self.tmp.path().join("config.yml")
    }

    fn updated(&self) -> PathBuf {
        self.work().join("updated.json")
    }

    /// Add a parser whose fetcher and updater are `sh` script bodies.
    fn add_parser(&self, name: &str, fetcher: &str, updater: &str) {
        let dir = self.parsers().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("fetch.sh"), format!("{fetcher}\n")).unwrap();
        fs::write(dir.join("update.sh"), format!("{updater}\n")).unwrap();
        fs::write(
            dir.join("cela.yml"),
            concat!(
                "scripts:\n",
                "  fetcher:\n    program: sh\n    args: fetch.sh\n",
                "  updater:\n    program: sh\n    args: [update.sh]\n",
            ),
        )
        .unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = isolated(self.tmp.path());
        cmd.arg("--config")
            .arg(self.config())
            .arg("--chdir")
            .arg(self.work());
        cmd
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.cmd().args(args).arg("--json").assert().success();
        let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
        serde_json::from_str(&stdout).expect("--json should output valid JSON")
    }
}

/// Command with logs and user config kept inside `root`.
fn isolated(root: &Path) -> Command {
    let mut cmd = cmd();
    cmd.env("CELA_LOG_DIR", root.join("logs"))
        .env("XDG_CONFIG_HOME", root.join("xdg"))
        .env_remove("RUST_LOG");
    cmd
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_shows_usage() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("PARSER_NAME"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn long_help_lists_environment() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("CELA_LOG_DIR"))
        .stdout(predicate::str::contains("CELA_DATA_JSON"));
}

#[test]
fn short_help_flag_shows_usage() {
    cmd()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn version_flag_shows_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn short_version_flag_shows_version() {
    cmd()
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// =============================================================================
// Info Command
// =============================================================================

#[test]
fn info_shows_package_name_and_version() {
    let tmp = TempDir::new().unwrap();
    isolated(tmp.path())
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_NAME")))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn info_json_reports_parsers_dir() {
    let fixture = Fixture::new();
    let json = fixture.json(&["info"]);

    assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(
        json["config"]["parsers_dir"],
        fixture.parsers().to_str().unwrap()
    );
}

#[test]
fn info_help_shows_command_options() {
    cmd()
        .args(["info", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--json"));
}

// =============================================================================
// Global Flags
// =============================================================================

#[test]
fn quiet_and_verbose_flags_accepted() {
    let tmp = TempDir::new().unwrap();
    for flags in [&["--quiet"][..], &["-q"], &["--verbose"], &["-v"], &["-vv"]] {
        isolated(tmp.path())
            .args(flags)
            .arg("info")
            .assert()
            .success();
    }
}

#[test]
fn color_choices_accepted() {
    let tmp = TempDir::new().unwrap();
    for choice in ["auto", "always", "never"] {
        isolated(tmp.path())
            .args(["--color", choice, "info"])
            .assert()
            .success();
    }
}

#[cfg(unix)]
#[test]
fn debug_flag_logs_to_stderr() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["npm", "-p", "-D", "-d"])
        .assert()
        .success()
        .stderr(predicate::str::contains("script finished"));
}

#[test]
fn log_file_holds_json_lines() {
    let tmp = TempDir::new().unwrap();
    isolated(tmp.path()).args(["-v", "info"]).assert().success();

    let mut lines = Vec::new();
    for entry in fs::read_dir(tmp.path().join("logs")).unwrap() {
        let contents = fs::read_to_string(entry.unwrap().path()).unwrap();
        lines.extend(contents.lines().map(str::to_string));
    }
    assert!(!lines.is_empty(), "expected log lines");
    for line in &lines {
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(event["level"].is_string(), "{line}");
        assert!(event["timestamp"].is_string(), "{line}");
    }
    assert!(lines.iter().any(|l| l.contains("logging initialized")));
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn no_arguments_requires_parser_name() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("PARSER_NAME"))
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn flags_without_parser_name_fail() {
    cmd()
        .arg("-M")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PARSER_NAME"));
}

#[test]
fn invalid_flag_shows_error() {
    cmd()
        .arg("--not-a-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn bump_without_parsers_dir_fails() {
    let tmp = TempDir::new().unwrap();
    isolated(tmp.path())
        .args(["--chdir", tmp.path().to_str().unwrap(), "npm", "-p"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsers_dir"));
}

#[test]
fn unknown_parser_fails() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["cargo", "-p"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("did not match any directory"));
}

// =============================================================================
// Chdir Flag
// =============================================================================

#[test]
fn chdir_flag_changes_directory() {
    let tmp = TempDir::new().unwrap();
    isolated(tmp.path())
        .args(["--chdir", "/tmp", "info"])
        .assert()
        .success();
}

#[test]
fn chdir_nonexistent_fails() {
    cmd()
        .args(["--chdir", "/nonexistent/path/that/does/not/exist", "info"])
        .assert()
        .failure();
}

// =============================================================================
// Bumping
// =============================================================================

#[cfg(unix)]
#[test]
fn major_bump_runs_updater_with_payload() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["npm", "-M"])
        .assert()
        .success()
        .stdout(predicate::str::contains("v1.2.3"))
        .stdout(predicate::str::contains("v2.0.0"))
        .stdout(predicate::str::contains("precedence reset"));

    let payload: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(fixture.updated()).unwrap()).unwrap();
    assert_eq!(payload["version"], "v2.0.0");
    assert_eq!(payload["fetcher_json"]["file"], "package.json");
}

#[cfg(unix)]
#[test]
fn json_outcome_reports_exit_codes_and_notes() {
    let fixture = Fixture::new();
    let json = fixture.json(&["npm", "-m", "-p"]);

    assert_eq!(json["parser"], "npm");
    assert_eq!(json["previous"], "v1.2.3");
    assert_eq!(json["next"], "v1.3.0");
    assert_eq!(json["fetcher_exit_code"], 0);
    assert_eq!(json["updater_exit_code"], 0);
    assert_eq!(json["dry_run"], false);
    assert_eq!(json["strategy"]["kind"], "computed");
    assert_eq!(json["notes"][0]["component"], "patch");
    assert_eq!(json["notes"][0]["old_value"], 4);
    assert_eq!(json["notes"][0]["reason"], "PRECEDENCE_RESET");
}

#[cfg(unix)]
#[test]
fn dry_run_skips_updater() {
    let fixture = Fixture::new();
    let json = fixture.json(&["npm", "-p", "-D"]);

    assert_eq!(json["next"], "v1.2.4");
    assert_eq!(json["dry_run"], true);
    assert!(json["updater_exit_code"].is_null());
    assert!(!fixture.updated().exists());
}

#[cfg(unix)]
#[test]
fn dry_run_text_output() {
    let fixture = Fixture::new();
    fixture
        .cmd()
        .args(["npm", "-p", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("v1.2.4"))
        .stdout(predicate::str::contains("Dry run"));
    assert!(!fixture.updated().exists());
}

#[cfg(unix)]
#[test]
fn custom_version_is_sent_verbatim() {
    let fixture = Fixture::new();
    let json = fixture.json(&["npm", "-C", "9.9.9-rc.1"]);

    assert_eq!(json["next"], "9.9.9-rc.1");
    assert_eq!(json["strategy"]["kind"], "custom");
    let payload = fs::read_to_string(fixture.updated()).unwrap();
    assert!(payload.contains("9.9.9-rc.1"));
}

#[cfg(unix)]
#[test]
fn decrement_below_zero_is_clamped() {
    let fixture = Fixture::new();
    let json = fixture.json(&["npm", "-cccc", "-D"]);

    assert_eq!(json["next"], "v1.2.0");
    assert_eq!(json["notes"][0]["reason"], "NEGATIVE_CLAMP");
    assert_eq!(json["notes"][0]["old_value"], -1);
}

#[cfg(unix)]
#[test]
fn no_zero_allows_negative_components() {
    let fixture = Fixture::new();
    let json = fixture.json(&["npm", "-cccc", "-Z", "-D"]);

    assert_eq!(json["next"], "v1.2.-1");
    assert_eq!(json["notes"].as_array().unwrap().len(), 0);
}

#[cfg(unix)]
#[test]
fn no_reset_keeps_lower_components() {
    let fixture = Fixture::new();
    let json = fixture.json(&["npm", "-M", "-r", "-D"]);

    assert_eq!(json["next"], "v2.2.3");
}

#[cfg(unix)]
#[test]
fn hundreds_of_repeated_flags_are_all_counted() {
    let fixture = Fixture::new();
    let patches = format!("-{}", "p".repeat(300));
    let json = fixture.json(&["npm", patches.as_str(), "-D"]);

    assert_eq!(json["next"], "v1.2.303");
}

#[cfg(unix)]
#[test]
fn failing_fetcher_is_fatal() {
    let fixture = Fixture::new();
    fixture.add_parser("broken", "echo 'no manifest here' >&2; exit 3", "exit 0");
    fixture
        .cmd()
        .args(["broken", "-p"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exit code 3"))
        .stderr(predicate::str::contains("no manifest here"));
}

#[cfg(unix)]
#[test]
fn fetcher_must_print_json_object() {
    let fixture = Fixture::new();
    fixture.add_parser("garbled", "echo 1.2.3", "exit 0");
    fixture
        .cmd()
        .args(["garbled", "-p"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON object"));
}

#[cfg(unix)]
#[test]
fn failing_updater_exits_nonzero() {
    let fixture = Fixture::new();
    fixture.add_parser(
        "readonly",
        r#"printf '{"version": "0.1.0"}'"#,
        "echo 'permission denied' >&2; exit 1",
    );
    fixture
        .cmd()
        .args(["readonly", "-m"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("updater"))
        .stderr(predicate::str::contains("permission denied"));
}

// =============================================================================
// Parsers Command
// =============================================================================

#[cfg(unix)]
#[test]
fn parsers_lists_configured_parsers() {
    let fixture = Fixture::new();
    fixture.add_parser("cargo", "exit 0", "exit 0");

    let json = fixture.json(&["parsers"]);
    let names: Vec<_> = json["parsers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["cargo", "npm"]);
    assert_eq!(json["parsers"][1]["fetcher"]["program"], "sh");
    assert_eq!(json["parsers"][1]["fetcher"]["available"], true);
}
