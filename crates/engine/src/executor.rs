// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-step execution.
//!
//! Runs one step to completion and returns its [`StepResult`]. Never
//! panics and never returns early with an error: every failure mode is
//! folded into the result so the scheduler can record it and move on.

use crate::job_logger::JobLogger;
use crate::notifier::split_addresses;
use crate::spawn::{self, CommandExit};
use chrono::{DateTime, Utc};
use jobrun_core::{Step, StepAction, StepResult, StepStatus};
use jobrun_mailer::{Email, Mailer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Everything a worker needs to run one step.
pub struct StepContext<'a> {
    pub logger: &'a JobLogger,
    pub mailer: &'a dyn Mailer,
    /// Job-wide simulate; joins the per-step flag
    pub simulate: bool,
    pub cancel: CancellationToken,
}

/// Run one step to completion.
pub async fn run_step(step: &Step, ctx: &StepContext<'_>) -> StepResult {
    let started_at = Utc::now();

    if ctx.simulate || step.simulate {
        ctx.logger.step_note(&step.key, "simulated (no side effects)");
        return finish(
            StepStatus::Succeeded,
            Some(0),
            Some(ctx.logger.step_stdout_path(&step.key)),
            None,
            started_at,
            None,
        );
    }

    match &step.action {
        StepAction::OsCommand { cmdline } => run_os(step, cmdline, ctx, started_at).await,
        StepAction::SendMail {
            to,
            from,
            subject,
            body,
        } => run_send_mail(step, to, from, subject, body, ctx, started_at).await,
        StepAction::Sleep { seconds } => run_sleep(step, *seconds, ctx, started_at).await,
    }
}

async fn run_os(
    step: &Step,
    cmdline: &str,
    ctx: &StepContext<'_>,
    started_at: DateTime<Utc>,
) -> StepResult {
    let stdout_path = ctx.logger.step_stdout_path(&step.key);
    let stderr_path = ctx.logger.step_stderr_path(&step.key);

    match spawn::run_command(cmdline, &stdout_path, &stderr_path, &ctx.cancel).await {
        Ok(CommandExit::Exited(code)) => {
            let (status, message) = if step.allows_result_code(code) {
                (StepStatus::Succeeded, None)
            } else {
                (
                    StepStatus::Failed,
                    Some(format!(
                        "exit code {} not in allowed set {:?}",
                        code, step.resultcode_allowed
                    )),
                )
            };
            finish(
                status,
                Some(code),
                Some(stdout_path),
                Some(stderr_path),
                started_at,
                message,
            )
        }
        Ok(CommandExit::Terminated) => finish(
            StepStatus::Canceled,
            None,
            Some(stdout_path),
            Some(stderr_path),
            started_at,
            Some("terminated by cancellation".to_string()),
        ),
        Err(e) => finish(
            StepStatus::Failed,
            None,
            Some(stdout_path),
            Some(stderr_path),
            started_at,
            Some(e.to_string()),
        ),
    }
}

/// Delivery is not interrupted once in flight: a cancel arriving during the
/// SMTP exchange lets the message complete.
async fn run_send_mail(
    step: &Step,
    to: &str,
    from: &str,
    subject: &str,
    body: &str,
    ctx: &StepContext<'_>,
    started_at: DateTime<Utc>,
) -> StepResult {
    let email = Email {
        to: split_addresses(to),
        from: from.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
    };
    match ctx.mailer.send(&email).await {
        Ok(()) => {
            ctx.logger
                .step_note(&step.key, &format!("mail sent to {}", to));
            finish(
                StepStatus::Succeeded,
                None,
                Some(ctx.logger.step_stdout_path(&step.key)),
                None,
                started_at,
                None,
            )
        }
        Err(e) => finish(
            StepStatus::Failed,
            None,
            None,
            None,
            started_at,
            Some(format!("mail delivery failed: {}", e)),
        ),
    }
}

async fn run_sleep(
    step: &Step,
    seconds: u64,
    ctx: &StepContext<'_>,
    started_at: DateTime<Utc>,
) -> StepResult {
    tokio::select! {
        _ = tokio::time::sleep(std::time::Duration::from_secs(seconds)) => {
            ctx.logger.step_note(&step.key, &format!("slept {}s", seconds));
            finish(StepStatus::Succeeded, None, Some(ctx.logger.step_stdout_path(&step.key)), None, started_at, None)
        }
        _ = ctx.cancel.cancelled() => {
            finish(
                StepStatus::Canceled,
                None,
                None,
                None,
                started_at,
                Some("sleep interrupted by cancellation".to_string()),
            )
        }
    }
}

fn finish(
    status: StepStatus,
    exit_code: Option<i32>,
    stdout_path: Option<PathBuf>,
    stderr_path: Option<PathBuf>,
    started_at: DateTime<Utc>,
    message: Option<String>,
) -> StepResult {
    StepResult {
        status,
        exit_code,
        stdout_path,
        stderr_path,
        started_at,
        ended_at: Utc::now(),
        message,
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
