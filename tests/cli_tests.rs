use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

/// Run git in `dir` with a throwaway identity. Returns false if git is unavailable.
fn git(dir: &Path, args: &[&str]) -> bool {
    std::process::Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=Reviewer",
            "-c",
            "user.email=reviewer@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn numbered_lines(range: std::ops::RangeInclusive<u32>) -> String {
    range.map(|n| format!("line {n}\n")).collect()
}

fn bin() -> Command {
    Command::cargo_bin("review-anchor").unwrap()
}

#[test]
fn help_lists_subcommands() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn migrate_requires_a_direction() {
    bin()
        .args(["migrate", "sideways", "HEAD"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn push_reanchors_and_outdates_comments() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path();
    if !git(repo, &["init", "-q"]) {
        eprintln!("git not available, skipping");
        return;
    }

    fs::write(repo.join("f.txt"), numbered_lines(1..=60)).unwrap();
    assert!(git(repo, &["add", "f.txt"]));
    assert!(git(repo, &["commit", "-q", "-m", "initial"]));

    let repo_arg = repo.to_str().unwrap();
    for line in ["30", "50"] {
        bin()
            .args(["--repo", repo_arg, "add", "f.txt", "--line", line, "--body", "why?"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Added comment"));
    }

    // Drop the first ten lines and rewrite line 50.
    let mut content = numbered_lines(11..=49);
    content.push_str("line fifty, rewritten\n");
    content.push_str(&numbered_lines(51..=60));
    fs::write(repo.join("f.txt"), content).unwrap();
    assert!(git(repo, &["commit", "-q", "-am", "second"]));

    bin()
        .args(["--repo", repo_arg, "migrate", "new", "HEAD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved:    1"))
        .stdout(predicate::str::contains("Outdated: 1"));

    bin()
        .args(["--repo", repo_arg, "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("old 30+1"))
        .stdout(predicate::str::contains("new 20+1"))
        .stdout(predicate::str::contains("outdated"))
        .stdout(predicate::str::contains("new 50+1"));

    // a second push leaves the outdated comment alone
    bin()
        .args(["--repo", repo_arg, "migrate", "new", "HEAD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped:  1"));
}

#[test]
fn delete_unknown_comment_fails() {
    let dir = tempfile::tempdir().unwrap();
    let repo = dir.path();
    if !git(repo, &["init", "-q"]) {
        return;
    }

    bin()
        .args(["--repo", repo.to_str().unwrap(), "delete", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No comment with id 42"));
}
