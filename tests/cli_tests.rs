// Drives the calcgrade binary end to end: exit codes, text and JSON reports,
// batch output files and diagnostics.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn submission(name: &str) -> PathBuf {
    fixtures().join("submissions").join(name)
}

fn calcgrade() -> Command {
    let mut cmd = Command::cargo_bin("calcgrade").unwrap();
    cmd.env_remove("CALCGRADE_LOG");
    cmd
}

#[test]
fn check_passing_submission_exits_zero() {
    calcgrade()
        .arg("check")
        .arg(submission("excellent.calc"))
        .assert()
        .success()
        .stdout(contains("PASS: 19 passed, 0 failed"));
}

#[test]
fn check_failing_submission_exits_one() {
    calcgrade()
        .arg("check")
        .arg(submission("nil_divide.calc"))
        .assert()
        .code(1)
        .stdout(contains("divide_by_zero").and(contains("got nil")));
}

#[test]
fn check_json_report() {
    let output = calcgrade()
        .args(["check", "--json"])
        .arg(submission("missing_power.calc"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["submission"], "missing_power.calc");
    assert_eq!(report["overall"], "fail");
    assert_eq!(report["passed"], 12);
    assert_eq!(report["failed"], 7);
    let power = report["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "power_positive")
        .unwrap();
    assert_eq!(power["status"], "errored");
    assert_eq!(power["kind"], "missing-symbol");
}

#[test]
fn check_json_is_repeatable() {
    let run = || {
        calcgrade()
            .args(["check", "--json"])
            .arg(submission("nil_divide.calc"))
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn check_renders_load_failures_as_diagnostics() {
    calcgrade()
        .arg("check")
        .arg(submission("syntax_error.calc"))
        .assert()
        .code(1)
        .stdout(contains("[load-failure]"))
        .stderr(contains("calcgrade::load::syntax"));
}

#[test]
fn check_times_out_runaway_cases() {
    calcgrade()
        .args(["check", "--timeout-ms", "200"])
        .arg(submission("infinite_loop.calc"))
        .assert()
        .code(1)
        .stdout(contains("TIMEOUT").and(contains("4 timed out")));
}

#[test]
fn check_with_custom_suite() {
    calcgrade()
        .arg("check")
        .arg(submission("excellent.calc"))
        .arg("--suite")
        .arg(fixtures().join("suites/small.yaml"))
        .assert()
        .success()
        .stdout(contains("3 passed"));
}

#[test]
fn missing_submission_is_a_usage_error() {
    calcgrade()
        .args(["check", "does/not/exist.calc"])
        .assert()
        .code(2)
        .stderr(contains("cannot read submission"));
}

#[test]
fn invalid_suite_is_a_usage_error() {
    calcgrade()
        .arg("suite")
        .arg("--suite")
        .arg(fixtures().join("suites/duplicate.yaml"))
        .assert()
        .code(2)
        .stderr(contains("calcgrade::suite::duplicate"));
}

#[test]
fn invalid_config_is_a_usage_error() {
    calcgrade()
        .arg("suite")
        .arg("--config")
        .arg(fixtures().join("config/invalid.yaml"))
        .assert()
        .code(2)
        .stderr(contains("timeout_ms"));
}

#[test]
fn suite_lists_builtin_cases() {
    calcgrade()
        .arg("suite")
        .assert()
        .success()
        .stdout(contains("power_irrational_result").and(contains("19 cases")));
}

#[test]
fn grade_writes_one_report_per_submission() {
    let out = tempfile::tempdir().unwrap();
    calcgrade()
        .arg("grade")
        .arg("--submissions")
        .arg(fixtures().join("submissions"))
        .arg("--output")
        .arg(out.path())
        .arg("--config")
        .arg(fixtures().join("config/fast.yaml"))
        .assert()
        .code(1)
        .stdout(contains("5 submissions: 1 passed, 5 graded, 0 skipped"));

    for stem in [
        "excellent",
        "infinite_loop",
        "missing_power",
        "nil_divide",
        "syntax_error",
    ] {
        let path = out.path().join(format!("{}_grade_report.json", stem));
        let text = fs::read_to_string(&path).unwrap();
        let report: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(report["submission"], format!("{}.calc", stem));
    }
}

#[test]
fn grade_passes_when_every_submission_passes() {
    let subs = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::copy(submission("excellent.calc"), subs.path().join("a.calc")).unwrap();
    fs::copy(submission("excellent.calc"), subs.path().join("b.calc")).unwrap();

    calcgrade()
        .arg("grade")
        .arg("--submissions")
        .arg(subs.path())
        .arg("--output")
        .arg(out.path().join("reports"))
        .args(["--workers", "2"])
        .assert()
        .success();
    assert!(out.path().join("reports/a_grade_report.json").exists());
    assert!(out.path().join("reports/b_grade_report.json").exists());
}
