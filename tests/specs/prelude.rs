//! Test helpers for behavioral specifications.
//!
//! Provides a small DSL for writing a job config into a tempdir, running
//! the jobrun binary against it, and inspecting the resulting logs.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Returns the path to the jobrun binary.
/// Falls back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale (e.g. compiled by a removed worktree
/// into a shared target directory).
fn jobrun_binary() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug/jobrun");
    if standard.exists() {
        return standard;
    }

    // Fallback: resolve relative to the test binary itself.
    // The test binary lives at target/debug/deps/specs-<hash>, so its
    // grandparent is target/debug/ where jobrun is built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join("jobrun");
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// A throwaway job directory holding one config file and its logs.
pub struct JobDir {
    dir: tempfile::TempDir,
}

impl JobDir {
    /// Write `config` as `job.json` in a fresh tempdir.
    pub fn with_config(config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("job.json"), config).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run jobrun against this directory's `job.json` with extra args.
    pub fn run(&self, extra_args: &[&str]) -> Output {
        self.run_named("job.json", extra_args)
    }

    /// Run jobrun against an arbitrary config name in this directory.
    pub fn run_named(&self, config: &str, extra_args: &[&str]) -> Output {
        let mut cmd = Command::new(jobrun_binary());
        cmd.arg("-p")
            .arg(self.dir.path())
            .arg("-c")
            .arg(config)
            .args(extra_args);
        cmd.output().expect("failed to run jobrun binary")
    }

    /// Spawn jobrun without waiting, for signal-delivery specs.
    pub fn spawn(&self, extra_args: &[&str]) -> std::process::Child {
        let mut cmd = Command::new(jobrun_binary());
        cmd.arg("-p")
            .arg(self.dir.path())
            .arg("-c")
            .arg("job.json")
            .args(extra_args);
        cmd.spawn().expect("failed to spawn jobrun binary")
    }

    /// Contents of the job transcript, empty if it was never written.
    pub fn transcript(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("logs/job.log")).unwrap_or_default()
    }

    /// Contents of a step's stdout capture file.
    pub fn step_stdout(&self, key: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(format!("logs/{}.out", key)))
            .unwrap_or_default()
    }

    /// Lines of the shared order file written by `appender_task`.
    pub fn recorded_order(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("order.txt"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Shell task that appends `key` to the shared order file.
    pub fn appender_task(&self, key: &str) -> String {
        format!("echo {} >> {}", key, self.dir.path().join("order.txt").display())
    }
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn exit_code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

/// Variables block every config needs: mail recipients are required, and
/// pointing the relay at a closed local port keeps notifier attempts fast.
pub const BASE_VARIABLES: &str = r#""variables": {
        "mail_to": "ops@example.invalid",
        "mail_to_fail": "oncall@example.invalid",
        "smtp_relay": "127.0.0.1"
    }"#;
