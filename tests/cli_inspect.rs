// Read-only subcommands: graph, changed, score.
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::Value;

mod util;
use util::{BROKEN_TEST, calculator_project, prun};

#[test]
fn graph_json_lists_tests_in_source_order()
{
    let tmp = calculator_project();

    let assert = prun(&tmp)
        .args(["graph", "--format", "json"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let v: Value = serde_json::from_str(&stdout).expect("json");
    let map = v.as_object().expect("object");

    // serde_json without preserve_order sorts keys, so check content only
    assert_eq!(map.len(), 4);
    assert_eq!(v["test_add"], serde_json::json!(["add"]));
    assert_eq!(v["test_divide_by_zero"], serde_json::json!(["divide"]));

    // text view keeps discovery order
    let assert = prun(&tmp).arg("graph").assert().success();
    let text = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let add = text.find("test_add ->").expect("test_add listed");
    let zero = text.find("test_divide_by_zero ->").expect("test_divide_by_zero listed");
    assert!(add < zero);
    assert!(text.starts_with("Test function map: 4 tests"));
}

#[test]
fn graph_skips_non_test_files_when_walking()
{
    let tmp = calculator_project();
    tmp.child("helpers/util.py")
        .write_str("def test_not_collected():\n    pass\n")
        .expect("write");

    prun(&tmp)
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("test_not_collected").not());
}

#[test]
fn changed_reports_divide()
{
    let tmp = calculator_project();

    prun(&tmp)
        .args(["changed", "--diff-file", "divide.diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Changed functions: divide\n"))
        .stdout(predicate::str::contains("Changed files: (none)"));
}

#[test]
fn changed_file_strategy_from_config()
{
    let tmp = calculator_project();
    tmp.child("priorun.toml")
        .write_str("[diff]\nstrategy = \"file\"\n")
        .expect("write config");

    let assert = prun(&tmp)
        .args(["changed", "--diff-file", "divide.diff", "--format", "json"])
        .assert()
        .success();

    let v: Value = serde_json::from_slice(&assert.get_output().stdout).expect("json");
    assert_eq!(v["files"], serde_json::json!(["source_code.py"]));
    assert_eq!(v["functions"], serde_json::json!([]));
}

#[test]
fn score_ranks_divide_callers_first()
{
    let tmp = calculator_project();
    tmp.child("failure_log.json")
        .write_str("{\n  \"test_divide_by_zero\": 1\n}")
        .expect("write ledger");

    let assert = prun(&tmp)
        .args(["score", "--diff-file", "divide.diff", "--format", "json"])
        .assert()
        .success();

    let v: Value = serde_json::from_slice(&assert.get_output().stdout).expect("json");
    assert_eq!(
        v["selection"],
        serde_json::json!(["test_divide_by_zero", "test_divide"])
    );
    assert_eq!(v["scores"][0]["test"], "test_divide_by_zero");
    assert_eq!(v["scores"][0]["score"], 7);
    assert_eq!(v["scores"][1]["score"], 5);
    assert_eq!(v["scores"][0]["reasons"][0]["kind"], "changed_callee");
}

#[test]
fn syntax_error_names_file_and_line()
{
    let tmp = calculator_project();
    tmp.child("broken_test.py")
        .write_str(BROKEN_TEST)
        .expect("write broken");

    prun(&tmp)
        .args(["graph", "broken_test.py"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("syntax error in broken_test.py:1:"));
}

#[test]
fn unsupported_test_file_is_rejected()
{
    let tmp = calculator_project();
    tmp.child("test_notes.txt")
        .write_str("def test_x(): pass\n")
        .expect("write");

    prun(&tmp)
        .args(["graph", "test_notes.txt"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unsupported test file"));
}
