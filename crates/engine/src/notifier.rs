// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job summary emails.
//!
//! Start notices are opt-in (the `mail_start` variable), success summaries
//! go to `mail_to` unless suppressed, and failure/cancel summaries always
//! go to the union of `mail_to` and `mail_to_fail`. A notifier error never
//! changes the job outcome; it is logged and dropped.

use crate::scheduler::JobSummary;
use jobrun_core::{format_elapsed, JobOutcome, VarEnv};
use jobrun_mailer::{Email, Mailer};
use std::path::PathBuf;
use std::sync::Arc;

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    mail_from: String,
    mail_to: Vec<String>,
    mail_to_fail: Vec<String>,
    job_name: String,
    config_path: String,
    log_dir: PathBuf,
    send_start: bool,
    suppress_success: bool,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        env: &VarEnv,
        job_name: impl Into<String>,
        config_path: impl Into<String>,
        log_dir: PathBuf,
        suppress_success: bool,
    ) -> Self {
        let send_start = env
            .get("mail_start")
            .map(is_truthy)
            .unwrap_or(false);
        Self {
            mailer,
            mail_from: env.mail_from().to_string(),
            mail_to: split_addresses(env.mail_to()),
            mail_to_fail: split_addresses(env.mail_to_fail()),
            job_name: job_name.into(),
            config_path: config_path.into(),
            log_dir,
            send_start,
            suppress_success,
        }
    }

    /// Send the start notice, when enabled.
    pub async fn notify_start(&self) {
        if !self.send_start {
            return;
        }
        let email = Email {
            to: self.mail_to.clone(),
            from: self.mail_from.clone(),
            subject: format!("job {} started", self.job_name),
            body: format!(
                "job: {}\nconfig: {}\nlogs: {}\n",
                self.job_name,
                self.config_path,
                self.log_dir.display()
            ),
        };
        self.deliver(email).await;
    }

    /// Send the outcome summary per the dispatch rules.
    pub async fn notify_outcome(&self, summary: &JobSummary) {
        if summary.outcome == JobOutcome::Success && self.suppress_success {
            tracing::debug!("success email suppressed");
            return;
        }
        let email = Email {
            to: self.recipients_for(summary.outcome),
            from: self.mail_from.clone(),
            subject: format!("job {} finished: {}", self.job_name, summary.outcome),
            body: self.compose_summary(summary),
        };
        self.deliver(email).await;
    }

    /// Success goes to `mail_to`; anything else goes to the union of
    /// `mail_to` and `mail_to_fail`, deduplicated, order preserved.
    fn recipients_for(&self, outcome: JobOutcome) -> Vec<String> {
        let mut recipients = self.mail_to.clone();
        if outcome != JobOutcome::Success {
            for addr in &self.mail_to_fail {
                if !recipients.contains(addr) {
                    recipients.push(addr.clone());
                }
            }
        }
        recipients
    }

    /// Plain-text summary: job identity, timestamps, a step table, and the
    /// log directory pointer.
    fn compose_summary(&self, summary: &JobSummary) -> String {
        let key_w = summary
            .steps
            .iter()
            .map(|s| s.key.len())
            .chain(std::iter::once("key".len()))
            .max()
            .unwrap_or(3);
        let name_w = summary
            .steps
            .iter()
            .map(|s| s.name.len())
            .chain(std::iter::once("name".len()))
            .max()
            .unwrap_or(4);

        let mut body = format!(
            "job: {}\nconfig: {}\noutcome: {}\nstarted: {}\nended: {}\n\n",
            self.job_name,
            self.config_path,
            summary.outcome,
            summary.started_at.format("%Y-%m-%dT%H:%M:%SZ"),
            summary.ended_at.format("%Y-%m-%dT%H:%M:%SZ"),
        );
        body.push_str(&format!(
            "{:key_w$}  {:name_w$}  {:9}  {:>7}  {:>4}\n",
            "key", "name", "status", "elapsed", "exit"
        ));
        for step in &summary.steps {
            let exit = step
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            body.push_str(&format!(
                "{:key_w$}  {:name_w$}  {:9}  {:>7}  {:>4}\n",
                step.key,
                step.name,
                step.status.to_string(),
                format_elapsed(step.elapsed.as_secs()),
                exit
            ));
            if let Some(message) = &step.message {
                body.push_str(&format!("{:key_w$}  {}\n", "", message));
            }
        }
        body.push_str(&format!("\nlogs: {}\n", self.log_dir.display()));
        body
    }

    async fn deliver(&self, email: Email) {
        if email.to.is_empty() {
            return;
        }
        if let Err(e) = self.mailer.send(&email).await {
            tracing::warn!(subject = %email.subject, error = %e, "summary email send failed");
        }
    }
}

/// Split a comma-separated address list, trimming whitespace.
pub fn split_addresses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
