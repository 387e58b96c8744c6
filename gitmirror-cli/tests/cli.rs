use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

const ENV_VARS: [&str; 6] = [
    "SRC_REPO",
    "SERVER_URL",
    "REPOSITORY_NAME",
    "DST_REPO",
    "SSH_PRIVATE_KEY",
    "SSH_KNOWN_HOSTS",
];

/// `git-mirror` with none of its environment variables inherited.
fn mirror_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("git-mirror"));
    for key in ENV_VARS {
        cmd.env_remove(key);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=Example",
            "-c",
            "user.email=ex@ample.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn init_bare(path: &Path) {
    std::fs::create_dir_all(path).unwrap();
    git(path, &["init", "-q", "--bare"]);
    git(path, &["symbolic-ref", "HEAD", "refs/heads/master"]);
}

/// Source and destination bare repositories plus the commit every ref points at.
fn repos(root: &Path) -> (PathBuf, PathBuf, String) {
    let work = root.join("work");
    std::fs::create_dir_all(&work).unwrap();
    git(&work, &["init", "-q"]);
    git(&work, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    git(&work, &["commit", "-q", "--allow-empty", "-m", "test commit"]);
    let head = git(&work, &["rev-parse", "HEAD"]);
    for name in ["refs/heads/a", "refs/heads/b", "refs/pull/1", "refs/pull/2", "refs/meta/foo"] {
        git(&work, &["update-ref", name, &head]);
    }

    let src = root.join("src.git");
    init_bare(&src);
    git(&work, &["push", "-q", "--force", src.to_str().unwrap(), "refs/*:refs/*"]);

    git(&work, &["update-ref", "refs/heads/c", &head]);
    let dst = root.join("dst.git");
    init_bare(&dst);
    git(
        &work,
        &[
            "push",
            "-q",
            dst.to_str().unwrap(),
            "refs/heads/a:refs/heads/a",
            "refs/heads/b:refs/heads/b",
            "refs/heads/c:refs/heads/c",
        ],
    );
    (src, dst, head)
}

fn ref_names(repo: &Path) -> BTreeSet<String> {
    git(repo, &["for-each-ref", "--format=%(refname)"])
        .lines()
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Help and version
// ---------------------------------------------------------------------------

#[test]
fn version_prints_and_exits_zero() {
    mirror_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_documents_flags_and_environment() {
    let output = mirror_cmd().arg("--help").output().expect("run git-mirror");
    assert!(output.status.success());
    let help = String::from_utf8(output.stdout).unwrap();
    for needle in [
        "--source-repository",
        "--destination-repository",
        "--ssh-known-hosts-path",
        "--debug",
    ]
    .into_iter()
    .chain(ENV_VARS)
    {
        assert!(help.contains(needle), "help is missing {needle}");
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn missing_source_exits_non_zero() {
    mirror_cmd()
        .env("DST_REPO", "/tmp/nowhere.git")
        .assert()
        .failure()
        .code(1)
        .stderr(contains("no source repository provided"));
}

#[test]
fn missing_destination_exits_non_zero() {
    mirror_cmd()
        .args(["--source-repository", "/tmp/src.git"])
        .assert()
        .failure()
        .stderr(contains("no destination repository provided"));
}

#[test]
fn unreachable_source_reports_mirror_failure() {
    let root = TempDir::new().unwrap();
    let (_, dst, _) = repos(root.path());
    mirror_cmd()
        .env("SRC_REPO", root.path().join("missing.git"))
        .env("DST_REPO", &dst)
        .assert()
        .failure()
        .stderr(contains("mirror operation failed"))
        .stdout(predicate::str::is_empty());
}

// ---------------------------------------------------------------------------
// Mirroring
// ---------------------------------------------------------------------------

#[test]
fn mirrors_source_into_destination() {
    let root = TempDir::new().unwrap();
    let (src, dst, head) = repos(root.path());

    mirror_cmd()
        .env("SRC_REPO", &src)
        .env("DST_REPO", &dst)
        .assert()
        .success()
        .stdout(contains("mirrored"))
        .stdout(contains("refs/heads/c"));

    let expected: BTreeSet<String> = [
        "refs/heads/master",
        "refs/heads/a",
        "refs/heads/b",
        "refs/meta/foo",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    assert_eq!(ref_names(&dst), expected);
    assert_eq!(git(&dst, &["rev-parse", "HEAD"]), head);
}

#[test]
fn source_is_built_from_server_url_and_repository_name() {
    let root = TempDir::new().unwrap();
    let (_, dst, _) = repos(root.path());

    mirror_cmd()
        .env("SERVER_URL", root.path())
        .env("REPOSITORY_NAME", "src.git")
        .arg("--destination-repository")
        .arg(&dst)
        .assert()
        .success();

    assert!(!ref_names(&dst).contains("refs/heads/c"));
    assert!(ref_names(&dst).contains("refs/meta/foo"));
}

#[test]
fn json_report_lists_pruned_refs() {
    let root = TempDir::new().unwrap();
    let (src, dst, _) = repos(root.path());

    let output = mirror_cmd()
        .args(["--json", "--source-repository"])
        .arg(&src)
        .arg("--destination-repository")
        .arg(&dst)
        .output()
        .expect("run git-mirror");
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["pushed"], 4);
    assert_eq!(report["pruned"], serde_json::json!(["refs/heads/c"]));
    assert_eq!(report["filtered"].as_array().map(Vec::len), Some(2));
}

#[test]
fn debug_flag_logs_masked_configuration() {
    let root = TempDir::new().unwrap();
    let (src, dst, _) = repos(root.path());

    mirror_cmd()
        .env("SRC_REPO", &src)
        .env("DST_REPO", &dst)
        .env("SSH_KNOWN_HOSTS", "example.com ssh-ed25519 AAAA")
        .arg("--debug")
        .assert()
        .success()
        .stderr(contains("configuration:"))
        .stderr(contains("example.com ssh-ed25519").not());
}
