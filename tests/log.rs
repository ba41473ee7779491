use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;
use common::{init_repo, run_treekv};

#[rstest]
fn log_lists_commits_newest_first(init_repo: TempDir) {
    let dir = init_repo;

    for n in 1..=3 {
        run_treekv(dir.path(), &["set", "k.txt", &n.to_string(), "--message", &format!("set {n}")])
            .assert()
            .success();
    }

    let output = run_treekv(dir.path(), &["log"]).assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("set 3"));
    assert!(lines[1].contains("set 2"));
    assert!(lines[2].contains("set 1"));
}

#[rstest]
fn log_limit_truncates_history(init_repo: TempDir) {
    let dir = init_repo;

    for n in 1..=3 {
        run_treekv(dir.path(), &["set", "k.txt", &n.to_string(), "--message", &format!("set {n}")])
            .assert()
            .success();
    }

    run_treekv(dir.path(), &["log", "--limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("set 3").and(predicate::str::contains("set 2")))
        .stdout(predicate::str::contains("set 1").not());
}
