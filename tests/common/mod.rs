#![allow(dead_code)]

use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use std::path::Path;

pub fn run_treekv(repo: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("treekv").expect("treekv binary not built");
    cmd.arg("--path").arg(repo);
    cmd.args(args);
    cmd
}

/// A freshly-initialized repository in its own temp dir. An `#[rstest]` test
/// takes this as a parameter named `init_repo` instead of calling it
/// directly, so cargo-nextest-style per-test setup stays uniform with the
/// rest of the integration suite.
#[fixture]
pub fn init_repo() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    run_treekv(dir.path(), &["init"]).assert().success();
    dir
}
