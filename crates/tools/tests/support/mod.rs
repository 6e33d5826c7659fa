//! Local git fixtures.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=test-user", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// A bare `origin.git` on `master` plus a seed working copy pushing to it.
pub struct Remote {
    pub dir: tempfile::TempDir,
}

impl Remote {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "--quiet", "--bare", "origin.git"]);
        git(
            &dir.path().join("origin.git"),
            &["symbolic-ref", "HEAD", "refs/heads/master"],
        );
        git(dir.path(), &["init", "--quiet", "seed"]);
        let remote = Self { dir };
        git(&remote.seed(), &["symbolic-ref", "HEAD", "refs/heads/master"]);
        git(
            &remote.seed(),
            &["remote", "add", "origin", remote.url().as_str()],
        );
        remote
    }

    pub fn url(&self) -> String {
        self.dir.path().join("origin.git").display().to_string()
    }

    pub fn bare(&self) -> PathBuf {
        self.dir.path().join("origin.git")
    }

    pub fn seed(&self) -> PathBuf {
        self.dir.path().join("seed")
    }

    /// Writes `files`, commits them and pushes `master`. Returns the commit.
    pub fn commit(&self, files: &[(&str, &str)], message: &str) -> String {
        for (rel, contents) in files {
            write(&self.seed(), rel, contents);
        }
        git(&self.seed(), &["add", "--all"]);
        git(&self.seed(), &["commit", "--quiet", "--allow-empty", "-m", message]);
        git(&self.seed(), &["push", "--quiet", "origin", "master"]);
        git(&self.seed(), &["rev-parse", "HEAD"])
    }
}
