use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;
use common::{init_repo, run_treekv};

#[rstest]
fn rm_removes_a_previously_set_path(init_repo: TempDir) {
    let dir = init_repo;

    run_treekv(dir.path(), &["set", "x/y.txt", "true"])
        .assert()
        .success();
    run_treekv(dir.path(), &["rm", "x/y.txt"]).assert().success();

    run_treekv(dir.path(), &["get", "x/y.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no entry at x/y.txt"));
}

#[rstest]
fn rm_on_an_absent_path_is_a_no_op(init_repo: TempDir) {
    let dir = init_repo;

    run_treekv(dir.path(), &["rm", "never/set.txt"]).assert().success();

    run_treekv(dir.path(), &["get", "never/set.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no entry at never/set.txt"));
}
