//! Test helpers for behavioral specifications.
//!
//! Black-box DSL for invoking the `wings` binary, built on `assert_cmd` the
//! way the rest of this lineage's CLI suites do.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::assert::Assert;
use assert_cmd::Command;
use predicates::str::contains;

/// Resolves the built `wings` binary. `assert_cmd`'s `cargo_bin` only finds
/// binaries built from the *same* package as the test; `wings` lives in the
/// sibling `wings-cli` package, so this walks `target/debug` directly.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// Create a CLI builder for `wings` commands.
pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
}

impl CliBuilder {
    fn new() -> Self {
        Self { args: Vec::new(), dir: None }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    fn command(self) -> Command {
        let mut cmd = Command::new(binary_path("wings"));
        cmd.args(&self.args);
        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    pub fn passes(self) -> RunAssert {
        RunAssert { assert: self.command().assert().success() }
    }

    pub fn fails(self) -> RunAssert {
        RunAssert { assert: self.command().assert().failure() }
    }
}

pub struct RunAssert {
    assert: Assert,
}

impl RunAssert {
    pub fn stdout_has(self, expected: &str) -> Self {
        Self { assert: self.assert.stdout(contains(expected)) }
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        Self { assert: self.assert.stderr(contains(expected)) }
    }
}

/// A temporary `wings.toml` plus its data directory, for CLI tests that need
/// a config file on disk without a live Docker daemon or Panel behind it.
pub struct TestConfig {
    dir: tempfile::TempDir,
}

impl TestConfig {
    pub fn minimal() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).expect("create data dir");

        let toml = format!(
            r#"
uuid = "00000000-0000-0000-0000-000000000001"
token_id = "abcdefghij"
token = "supersecrettoken"
remote = "https://panel.example.test"

[system]
data = "{}"
"#,
            data_dir.display()
        );
        std::fs::write(dir.path().join("wings.toml"), toml).expect("write config");

        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("wings.toml")
    }
}
