// Ledger maintenance and config bootstrap.
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::{Value, json};

mod util;
use util::{calculator_project, prun};

const REPORT: &str = r#"{
  "tests": [
    {"nodeid": "test_cases.py::test_divide", "outcome": "failed"},
    {"nodeid": "test_cases.py::test_add", "outcome": "passed"},
    {"nodeid": "test_cases.py::test_param[1-2]", "outcome": "failed"}
  ]
}"#;

#[test]
fn update_then_show()
{
    let tmp = calculator_project();
    tmp.child("ci/report.json").write_str(REPORT).expect("write report");

    prun(&tmp)
        .args(["ledger", "show"])
        .assert()
        .success()
        .stdout("Failure log: (empty)\n");

    for _ in 0..2
    {
        prun(&tmp)
            .args(["ledger", "update", "--report", "ci/report.json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Recorded 2 failure(s)"));
    }

    let assert = prun(&tmp)
        .args(["ledger", "show", "--format", "json"])
        .assert()
        .success();
    let v: Value = serde_json::from_slice(&assert.get_output().stdout).expect("json");
    assert_eq!(v, json!({"test_divide": 2, "test_param": 2}));
}

#[test]
fn update_without_report_leaves_ledger_alone()
{
    let tmp = calculator_project();

    prun(&tmp)
        .args(["ledger", "update"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recorded 0 failure(s)"));

    tmp.child("failure_log.json").assert(predicate::path::missing());
}

#[test]
fn corrupt_ledger_is_reported()
{
    let tmp = calculator_project();
    tmp.child("failure_log.json").write_str("not json").expect("write");

    prun(&tmp)
        .args(["ledger", "show"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failure_log.json"));
}

#[test]
fn ledger_path_from_environment()
{
    let tmp = calculator_project();
    tmp.child("report.json").write_str(REPORT).expect("write report");

    prun(&tmp)
        .env("PRIORUN_LEDGER_PATH", "state/failures.json")
        .args(["ledger", "update"])
        .assert()
        .success();

    tmp.child("state/failures.json")
        .assert(predicate::str::contains("\"test_divide\": 1"));
}

#[test]
fn init_writes_config_once()
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    prun(&tmp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));

    tmp.child("priorun.toml")
        .assert(predicate::str::contains("ledger_path = \"failure_log.json\""));

    prun(&tmp)
        .arg("init")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--force"));

    prun(&tmp).args(["init", "--force"]).assert().success();
}
