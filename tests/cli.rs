use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn garnet() -> Command {
    Command::cargo_bin("garnet").expect("binary exists")
}

#[test]
fn eval_prints_the_result_when_asked() {
    garnet()
        .args(["eval", "--print", "[1, 2].map { |x| x * 3 }"])
        .assert()
        .success()
        .stdout("[3, 6]\n");
}

#[test]
fn eval_without_print_only_shows_script_output() {
    garnet()
        .args(["eval", "puts \"hi\"\n1 + 2"])
        .assert()
        .success()
        .stdout("hi\n");
}

#[test]
fn run_executes_a_script_file() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("greet.gt");
    fs::write(
        &script,
        "def greet(name)\n  \"Hello, #{name}!\"\nend\nputs greet(\"Garnet\")\n",
    )
    .expect("write script");

    garnet()
        .arg("run")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello, Garnet!"));
}

#[test]
fn runtime_errors_exit_with_failure_and_location() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("broken.gt");
    fs::write(&script, "x = 1\ny = x / 0\n").expect("write script");

    garnet()
        .arg("run")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ZeroDivisionError: divided by 0"));
}

#[test]
fn syntax_errors_report_line_and_column() {
    garnet()
        .args(["eval", "a = 1\nb = (2 +"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("-e:2:").and(predicate::str::contains("SyntaxError")));
}

#[test]
fn missing_scripts_are_reported() {
    let dir = tempdir().expect("create temp dir");
    garnet()
        .arg("run")
        .arg(dir.path().join("nope.gt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.gt"));
}

#[test]
fn allow_flags_switch_to_whitelist_mode() {
    garnet()
        .args(["--allow-type", "System.Guid", "eval", "System::DateTime.now"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TypeAccessError"));

    garnet()
        .args(["--allow-namespace", "System", "eval", "--print", "System::DateTime.new(2024, 1, 15).month"])
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn unrestricted_by_default() {
    garnet()
        .args(["eval", "--print", "System::Math.sqrt(9)"])
        .assert()
        .success()
        .stdout("3.0\n");
}

#[test]
fn max_call_depth_limits_recursion() {
    garnet()
        .args(["--max-call-depth", "50", "eval", "def f(n)\n  f(n + 1)\nend\nf(0)"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SystemStackError"));
}
