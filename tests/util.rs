//! Shared test utilities for integration tests
//!
//! Builds throwaway projects around the calculator fixture and spawns
//! the compiled `prun` binary inside them.

#![allow(dead_code)]

use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;

pub const TEST_CASES: &str = include_str!("fixtures/test_cases.py");
pub const SOURCE_CODE: &str = include_str!("fixtures/source_code.py");
pub const DIVIDE_DIFF: &str = include_str!("fixtures/divide.diff");
pub const BROKEN_TEST: &str = include_str!("fixtures/broken_test.py");

/// Temp project with `test_cases.py`, `source_code.py` and `divide.diff`.
pub fn calculator_project() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("test_cases.py")
        .write_str(TEST_CASES)
        .expect("write test_cases.py");
    tmp.child("source_code.py")
        .write_str(SOURCE_CODE)
        .expect("write source_code.py");
    tmp.child("divide.diff")
        .write_str(DIVIDE_DIFF)
        .expect("write divide.diff");

    tmp
}

/// `prun` rooted in `dir`, colors off, mode and config env cleared.
pub fn prun(dir: &assert_fs::TempDir) -> Command
{
    let mut cmd = Command::cargo_bin("prun").expect("bin");
    cmd.current_dir(dir.path())
        .env_remove("ENV")
        .env_remove("PRIORUN_LOG")
        .env_remove("OPENAI_API_KEY")
        .arg("--no-color");
    cmd
}
