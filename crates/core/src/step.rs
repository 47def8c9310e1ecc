// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step model and state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Runtime status of a step.
///
/// A step is created `Pending` (or `Skipped` when disabled), becomes `Ready`
/// once every predecessor has terminated successfully, `Running` when a
/// worker picks it up, and then transitions exactly once to one of the
/// terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Waiting on predecessors
    Pending,
    /// All predecessors terminal-good, not yet dispatched
    Ready,
    /// A worker owns the step
    Running,
    /// Terminal: completed with an allowed result code
    Succeeded,
    /// Terminal: completed with a disallowed result code or execution error
    Failed,
    /// Terminal: disabled at graph build; satisfies dependents like a success
    Skipped,
    /// Terminal: never ran (failed ancestor) or interrupted while running
    Canceled,
}

impl StepStatus {
    /// Whether the step has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded | StepStatus::Failed | StepStatus::Skipped | StepStatus::Canceled
        )
    }

    /// Whether this status satisfies a downstream dependency.
    pub fn satisfies_dependents(self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Ready => write!(f, "ready"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Succeeded => write!(f, "succeeded"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
            StepStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// What a step does when dispatched.
///
/// Each variant carries exactly the fields its executor needs; all string
/// fields are fully variable-resolved before the scheduler ever sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Run a command line through the host shell.
    OsCommand { cmdline: String },
    /// Send one email through the job's SMTP relay.
    SendMail {
        to: String,
        from: String,
        subject: String,
        body: String,
    },
    /// Sleep for a number of seconds; cancellable.
    Sleep { seconds: u64 },
}

impl StepAction {
    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::OsCommand { .. } => "os",
            StepAction::SendMail { .. } => "send_mail",
            StepAction::Sleep { .. } => "sleep",
        }
    }
}

/// Declared predecessors of a step: an explicit key list, or the `"ALL"`
/// sentinel meaning "every other step in the job".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dependencies {
    Keys(Vec<String>),
    All,
}

impl Dependencies {
    /// Declared dependency keys; empty for the ALL sentinel (its edges are
    /// virtual and computed by the scheduler).
    pub fn keys(&self) -> &[String] {
        match self {
            Dependencies::Keys(keys) => keys,
            Dependencies::All => &[],
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Dependencies::All)
    }
}

impl Default for Dependencies {
    fn default() -> Self {
        Dependencies::Keys(Vec::new())
    }
}

/// A fully resolved step, ready for scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Unique key within the job
    pub key: String,
    /// Human-readable name for logs and summaries
    pub name: String,
    pub action: StepAction,
    pub dependencies: Dependencies,
    pub enabled: bool,
    /// Per-step simulate; joins the job-wide flag
    pub simulate: bool,
    /// Exit codes treated as success for `os` steps
    pub resultcode_allowed: Vec<i32>,
}

impl Step {
    pub fn is_all(&self) -> bool {
        self.dependencies.is_all()
    }

    /// Whether `code` counts as success for this step.
    pub fn allows_result_code(&self, code: i32) -> bool {
        self.resultcode_allowed.contains(&code)
    }
}

/// Outcome of one step execution, reported by a worker to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Failure or cancellation detail, if any
    pub message: Option<String>,
}

/// Terminal outcome of a whole job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// Every non-skipped step succeeded
    Success,
    /// At least one step failed or was canceled by a failed ancestor
    Failure,
    /// An external interrupt initiated cancellation
    Canceled,
}

impl JobOutcome {
    /// Process exit code for shell pipelines.
    pub fn exit_code(self) -> i32 {
        match self {
            JobOutcome::Success => 0,
            JobOutcome::Failure => 1,
            JobOutcome::Canceled => 2,
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Success => write!(f, "SUCCESS"),
            JobOutcome::Failure => write!(f, "FAILURE"),
            JobOutcome::Canceled => write!(f, "CANCELED"),
        }
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
