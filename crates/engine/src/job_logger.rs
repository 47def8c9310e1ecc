// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only logging for one job run.
//!
//! Two surfaces: the job transcript (`<log_dir>/job.log`, timestamped
//! scheduling decisions and state transitions) and per-step capture files
//! named by step key (`<key>.out` / `<key>.err`).
//!
//! Each append opens, writes, and closes the file. This is safe for the low
//! write frequency of scheduling events; step stdout/stderr go straight from
//! the subprocess to its capture file and never pass through here. Write
//! failures are logged via tracing but do not propagate, since logging must
//! not break the run.

use jobrun_core::{format_utc_now, ConfigError};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct JobLogger {
    log_dir: PathBuf,
}

impl JobLogger {
    /// Create the log directory and the logger. Failure here is fatal for
    /// the job: there is nowhere to record anything.
    pub fn create(log_dir: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&log_dir).map_err(|e| ConfigError::LogDirUncreatable {
            path: log_dir.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { log_dir })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.log_dir.join("job.log")
    }

    /// Capture file for a step's stdout (and internal-step notes).
    pub fn step_stdout_path(&self, key: &str) -> PathBuf {
        self.log_dir.join(format!("{}.out", key))
    }

    /// Capture file for a step's stderr.
    pub fn step_stderr_path(&self, key: &str) -> PathBuf {
        self.log_dir.join(format!("{}.err", key))
    }

    /// Append a transcript line for the given step.
    ///
    /// Format: `2026-01-30T08:14:09Z [step] message`
    pub fn step(&self, key: &str, message: &str) {
        if let Err(e) = self.write_line(key, message) {
            tracing::warn!(step = key, error = %e, "failed to write job transcript");
        }
    }

    /// Append a job-scoped transcript line (no owning step).
    pub fn job(&self, message: &str) {
        self.step("-", message);
    }

    /// Append a timestamped note to a step's stdout capture file. Used for
    /// internal steps and the simulate marker, which have no subprocess
    /// output of their own.
    pub fn step_note(&self, key: &str, note: &str) {
        let path = self.step_stdout_path(key);
        if let Err(e) = append_line(&path, &format!("{} {}", format_utc_now(), note)) {
            tracing::warn!(step = key, error = %e, "failed to write step note");
        }
    }

    fn write_line(&self, key: &str, message: &str) -> std::io::Result<()> {
        let line = format!("{} [{}] {}", format_utc_now(), key, message);
        append_line(&self.transcript_path(), &line)
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

#[cfg(test)]
#[path = "job_logger_tests.rs"]
mod tests;
