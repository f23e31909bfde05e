#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Temporary data directory with a config that keeps notifications in the log
pub struct TestData {
    dir: TempDir,
}

impl TestData {
    pub fn new() -> Self {
        let data = Self::empty();
        data.write_config(
            r#"
[notify]
sink = "log"
"#,
        );
        data
    }

    /// Data directory without any config file
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_config(&self, contents: &str) {
        fs::write(self.file("selfcontrol.toml"), contents.trim()).expect("write config");
    }

    /// `selfcontrol` bound to this data directory
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("selfcontrol").expect("binary");
        cmd.env_remove("RUST_LOG")
            .env("SELFCONTROL_DIR", self.dir.path());
        cmd
    }

    /// Run a command with `--json` and parse the envelope
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .output()
            .expect("run selfcontrol");
        serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
            panic!(
                "invalid json from {args:?}: {err}\nstdout: {}\nstderr: {}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )
        })
    }

    pub fn read_collection(&self, name: &str) -> Value {
        let content = fs::read_to_string(self.file(&format!("{name}.json"))).expect("read collection");
        serde_json::from_str(&content).expect("parse collection")
    }
}
