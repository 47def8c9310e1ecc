// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The DAG scheduler.
//!
//! A single controller task owns all step state and advances it on a tick
//! loop. Workers execute one step each and report through a completion
//! channel; they never touch the state map. Cancellation is a single
//! job-wide token. Workers receive child tokens, so an external interrupt
//! reaches every running step without the controller chasing them down.

use crate::executor::{self, StepContext};
use crate::job_logger::JobLogger;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use jobrun_core::{format_elapsed, JobOutcome, Step, StepGraph, StepResult, StepStatus};
use jobrun_mailer::Mailer;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Tuning for one job run.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Tick interval (`--delay`)
    pub delay: Duration,
    /// Running-summary interval (`--running_delay`; the CLI enforces the
    /// 60-second floor)
    pub running_delay: Duration,
    /// Concurrency cap, ≥ 1
    pub concurrency: usize,
    /// Job-wide simulate
    pub simulate: bool,
}

/// Final report for one step, in key order.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub key: String,
    pub name: String,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub message: Option<String>,
}

/// Everything the notifier and the CLI need after a run.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub outcome: JobOutcome,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub steps: Vec<StepReport>,
}

/// Per-step state owned by the controller.
struct Slot {
    step: Step,
    status: StepStatus,
    started: Option<Instant>,
    elapsed: Option<Duration>,
    result: Option<StepResult>,
}

/// Worker → controller completion message.
struct Completion {
    key: String,
    result: StepResult,
}

/// Run a validated job to completion.
///
/// Steps must have passed [`StepGraph::build`]; the graph and the step map
/// describe the same keys.
pub async fn run_job(
    steps: IndexMap<String, Step>,
    graph: StepGraph,
    cfg: SchedulerConfig,
    logger: Arc<JobLogger>,
    mailer: Arc<dyn Mailer>,
    cancel: CancellationToken,
) -> JobSummary {
    let started_at = Utc::now();

    // BTreeMap: iteration order is ascending by key, which is exactly the
    // dispatch tie-break.
    let mut slots: BTreeMap<String, Slot> = steps
        .into_iter()
        .map(|(key, step)| {
            let status = if step.enabled {
                StepStatus::Pending
            } else {
                StepStatus::Skipped
            };
            (
                key,
                Slot {
                    step,
                    status,
                    started: None,
                    elapsed: None,
                    result: None,
                },
            )
        })
        .collect();

    logger.job(&format!(
        "job starting: {} steps, concurrency {}{}",
        slots.len(),
        cfg.concurrency,
        if cfg.simulate { ", simulate" } else { "" }
    ));
    for slot in slots.values() {
        if slot.status == StepStatus::Skipped {
            logger.step(&slot.step.key, "skipped (disabled)");
        }
    }

    let (tx, mut rx) = mpsc::channel::<Completion>(32);
    let mut interval = tokio::time::interval(cfg.delay);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cancelling = false;
    let mut last_summary = Instant::now();

    loop {
        if cancelling {
            cancel_unstarted(&mut slots, &logger);
        } else {
            promote(&mut slots, &graph, &logger);
        }

        if !cancelling {
            dispatch(&mut slots, &cfg, &logger, &mailer, &tx, &cancel);
        }

        if slots.values().all(|s| s.status.is_terminal()) {
            break;
        }

        if last_summary.elapsed() >= cfg.running_delay {
            log_running_summary(&slots, &logger);
            last_summary = Instant::now();
        }

        tokio::select! {
            Some(done) = rx.recv() => {
                record(&mut slots, done, &logger);
                while let Ok(done) = rx.try_recv() {
                    record(&mut slots, done, &logger);
                }
            }
            _ = interval.tick() => {}
            _ = cancel.cancelled(), if !cancelling => {
                cancelling = true;
                logger.job("cancellation requested; no new steps will start");
            }
        }
    }

    let outcome = if cancelling {
        JobOutcome::Canceled
    } else if slots
        .values()
        .all(|s| s.status.satisfies_dependents())
    {
        JobOutcome::Success
    } else {
        JobOutcome::Failure
    };
    logger.job(&format!("job finished: {}", outcome));

    let steps = slots
        .into_values()
        .map(|slot| StepReport {
            key: slot.step.key.clone(),
            name: slot.step.name.clone(),
            status: slot.status,
            exit_code: slot.result.as_ref().and_then(|r| r.exit_code),
            elapsed: slot.elapsed.unwrap_or_default(),
            message: slot.result.and_then(|r| r.message),
        })
        .collect();

    JobSummary {
        outcome,
        started_at,
        ended_at: Utc::now(),
        steps,
    }
}

/// Promote pending steps whose predecessors are settled, and propagate
/// cancellation to descendants of failed steps. Loops to a fixpoint so a
/// whole chain of descendants settles within one tick.
fn promote(slots: &mut BTreeMap<String, Slot>, graph: &StepGraph, logger: &JobLogger) {
    loop {
        let mut decisions: Vec<(String, StepStatus, Option<String>)> = Vec::new();

        for (key, slot) in slots.iter() {
            if slot.status != StepStatus::Pending || slot.step.is_all() {
                continue;
            }
            let mut blocked = false;
            let mut failed_pred = None;
            for pred in graph.predecessors(key) {
                match slots.get(pred).map(|s| s.status) {
                    Some(StepStatus::Failed) | Some(StepStatus::Canceled) => {
                        failed_pred = Some(pred.clone());
                        break;
                    }
                    Some(status) if status.satisfies_dependents() => {}
                    _ => blocked = true,
                }
            }
            if let Some(pred) = failed_pred {
                decisions.push((key.clone(), StepStatus::Canceled, Some(pred)));
            } else if !blocked {
                decisions.push((key.clone(), StepStatus::Ready, None));
            }
        }

        if decisions.is_empty() {
            break;
        }
        for (key, status, failed_pred) in decisions {
            if let Some(slot) = slots.get_mut(&key) {
                slot.status = status;
                match failed_pred {
                    Some(pred) => logger.step(
                        &key,
                        &format!("canceled (dependency '{}' did not succeed)", pred),
                    ),
                    None => logger.step(&key, "ready"),
                }
            }
        }
    }

    promote_all_step(slots, graph, logger);
}

/// The ALL step becomes ready only once every other step has terminated
/// successfully; the first terminal failure anywhere cancels it instead.
fn promote_all_step(slots: &mut BTreeMap<String, Slot>, graph: &StepGraph, logger: &JobLogger) {
    let Some(all_key) = graph.all_step() else {
        return;
    };
    if slots.get(all_key).map(|s| s.status) != Some(StepStatus::Pending) {
        return;
    }

    let mut any_bad = false;
    let mut all_settled = true;
    for (key, slot) in slots.iter() {
        if key == all_key {
            continue;
        }
        match slot.status {
            StepStatus::Failed | StepStatus::Canceled => any_bad = true,
            status if !status.is_terminal() => all_settled = false,
            _ => {}
        }
    }

    let all_key = all_key.to_string();
    if any_bad {
        if let Some(slot) = slots.get_mut(&all_key) {
            slot.status = StepStatus::Canceled;
            logger.step(&all_key, "canceled (a step did not succeed)");
        }
    } else if all_settled {
        if let Some(slot) = slots.get_mut(&all_key) {
            slot.status = StepStatus::Ready;
            logger.step(&all_key, "ready (all other steps succeeded)");
        }
    }
}

/// Hand ready steps to workers, lowest key first, up to the cap.
fn dispatch(
    slots: &mut BTreeMap<String, Slot>,
    cfg: &SchedulerConfig,
    logger: &Arc<JobLogger>,
    mailer: &Arc<dyn Mailer>,
    tx: &mpsc::Sender<Completion>,
    cancel: &CancellationToken,
) {
    loop {
        let running = slots
            .values()
            .filter(|s| s.status == StepStatus::Running)
            .count();
        if running >= cfg.concurrency {
            break;
        }
        let Some(key) = slots
            .iter()
            .find(|(_, s)| s.status == StepStatus::Ready)
            .map(|(k, _)| k.clone())
        else {
            break;
        };
        let Some(slot) = slots.get_mut(&key) else {
            break;
        };
        slot.status = StepStatus::Running;
        slot.started = Some(Instant::now());
        logger.step(&key, &format!("dispatching ({})", slot.step.action.kind()));

        let step = slot.step.clone();
        let logger = Arc::clone(logger);
        let mailer = Arc::clone(mailer);
        let tx = tx.clone();
        let token = cancel.child_token();
        let simulate = cfg.simulate;
        tokio::spawn(async move {
            let ctx = StepContext {
                logger: &logger,
                mailer: mailer.as_ref(),
                simulate,
                cancel: token,
            };
            let result = executor::run_step(&step, &ctx).await;
            let _ = tx
                .send(Completion {
                    key: step.key.clone(),
                    result,
                })
                .await;
        });
    }
}

/// Record a worker's result. The running-state guard makes the terminal
/// transition exactly-once even if a stray completion arrives late.
fn record(slots: &mut BTreeMap<String, Slot>, done: Completion, logger: &JobLogger) {
    let Some(slot) = slots.get_mut(&done.key) else {
        return;
    };
    if slot.status != StepStatus::Running {
        return;
    }
    let elapsed = slot.started.map(|s| s.elapsed()).unwrap_or_default();
    slot.status = done.result.status;
    slot.elapsed = Some(elapsed);

    let mut line = format!(
        "{} after {}",
        done.result.status,
        format_elapsed(elapsed.as_secs())
    );
    if let Some(code) = done.result.exit_code {
        line.push_str(&format!(", exit code {}", code));
    }
    if let Some(message) = &done.result.message {
        line.push_str(&format!(": {}", message));
    }
    logger.step(&done.key, &line);
    slot.result = Some(done.result);
}

/// After a cancel, anything not yet started goes straight to canceled;
/// running steps keep their workers, which observe the token themselves.
fn cancel_unstarted(slots: &mut BTreeMap<String, Slot>, logger: &JobLogger) {
    for slot in slots.values_mut() {
        if matches!(slot.status, StepStatus::Pending | StepStatus::Ready) {
            slot.status = StepStatus::Canceled;
            logger.step(&slot.step.key, "canceled (job interrupted)");
        }
    }
}

fn log_running_summary(slots: &BTreeMap<String, Slot>, logger: &JobLogger) {
    let running: Vec<String> = slots
        .values()
        .filter(|s| s.status == StepStatus::Running)
        .map(|s| {
            let elapsed = s.started.map(|t| t.elapsed().as_secs()).unwrap_or(0);
            format!("{} ({})", s.step.key, format_elapsed(elapsed))
        })
        .collect();
    if !running.is_empty() {
        let line = format!("running: {}", running.join(", "));
        tracing::info!("{}", line);
        logger.job(&line);
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
