// `prun run` end to end, with the executor replaced by shell scripts or
// short-circuited by --dry-run.
use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;

mod util;
use util::{calculator_project, prun};

#[test]
fn dry_run_prints_filter_expression()
{
    let tmp = calculator_project();

    prun(&tmp)
        .args(["--dry-run", "run", "--mode", "prioritized", "--diff-file", "divide.diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Running prioritized tests..."))
        .stdout(predicate::str::contains("Changed functions: divide"))
        .stdout(predicate::str::contains(
            "Executing: pytest -k \"test_divide or test_divide_by_zero\"",
        ));
}

#[test]
fn no_tests_means_nothing_runs()
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("test_empty.py")
        .write_str("def helper():\n    return 1\n")
        .expect("write");
    tmp.child("divide.diff")
        .write_str(util::DIVIDE_DIFF)
        .expect("write diff");

    prun(&tmp)
        .args(["run", "--mode", "prioritized", "--diff-file", "divide.diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Priority order: (nothing to prioritize)"))
        .stdout(predicate::str::contains("No prioritized tests to run."));
}

#[test]
fn missing_git_baseline_degrades_to_no_changes()
{
    // not a git repository: `git diff` fails, the run carries on
    let tmp = calculator_project();

    prun(&tmp)
        .args(["run", "--mode", "prioritized"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Changed functions: (none)"))
        .stdout(predicate::str::contains("No prioritized tests to run."));
}

#[test]
fn prod_env_selects_full_mode()
{
    let tmp = calculator_project();

    prun(&tmp)
        .env("ENV", "prod")
        .args(["--dry-run", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Running all tests (full mode)..."))
        .stdout(predicate::str::contains("--json-report-file=report.json"));
}

#[test]
fn dotenv_file_selects_full_mode()
{
    let tmp = calculator_project();
    tmp.child(".env")
        .write_str("ENV=prod\n")
        .expect("write .env");

    prun(&tmp)
        .args(["--dry-run", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Running all tests (full mode)..."));

    // the process environment wins over .env
    prun(&tmp)
        .env("ENV", "dev")
        .args(["--dry-run", "run", "--diff-file", "divide.diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Running prioritized tests..."));
}

#[cfg(unix)]
#[test]
fn full_run_feeds_next_prioritized_run()
{
    let tmp = calculator_project();

    // Stand-in executor: writes a report with one failure and fails
    tmp.child("priorun.toml")
        .write_str(
            r#"[executor]
program = "sh"
args = ["-c", "printf '{\"tests\": [{\"nodeid\": \"test_cases.py::test_subtract\", \"outcome\": \"failed\"}]}' > report.json; exit 1", "sh"]
"#,
        )
        .expect("write config");

    prun(&tmp)
        .args(["run", "--mode", "full"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Recorded 1 failure(s)"));

    tmp.child("failure_log.json")
        .assert(predicate::str::contains("\"test_subtract\": 1"));

    // empty diff, but the ledger alone now selects test_subtract
    tmp.child("empty.diff").write_str("").expect("write");
    prun(&tmp)
        .args(["--dry-run", "run", "--mode", "prioritized", "--diff-file", "empty.diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Executing: sh -c"))
        .stdout(predicate::str::ends_with("-k test_subtract\n"));
}

#[cfg(unix)]
#[test]
fn prioritized_exit_code_mirrors_executor()
{
    let tmp = calculator_project();
    tmp.child("priorun.toml")
        .write_str("[executor]\nprogram = \"sh\"\nargs = [\"-c\", \"exit 3\", \"sh\"]\n")
        .expect("write config");

    prun(&tmp)
        .args(["--quiet", "run", "--mode", "prioritized", "--diff-file", "divide.diff"])
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty());
}

#[test]
fn advisor_without_key_falls_back()
{
    let tmp = calculator_project();

    prun(&tmp)
        .args([
            "--dry-run",
            "run",
            "--advisor",
            "--mode",
            "prioritized",
            "--diff-file",
            "divide.diff",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("-k \"test_divide or test_divide_by_zero\""));
}
