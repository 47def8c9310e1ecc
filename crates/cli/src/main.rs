// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jobrun - run a DAG of steps on one host

use anyhow::Result;
use clap::{ArgAction, Parser};
use jobrun_core::{env::host_cpus, JobOutcome, StepGraph, VarEnv};
use jobrun_engine::{JobLogger, Notifier, SchedulerConfig};
use jobrun_mailer::{Mailer, SmtpMailer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Exit code for configuration errors, before any step runs.
const CONFIG_ERROR_EXIT: u8 = 2;

/// Floor for the running-summary interval.
const MIN_RUNNING_DELAY_SECS: u64 = 60;

#[derive(Parser, Debug)]
#[command(
    name = "jobrun",
    version,
    about = "Run a DAG of steps with concurrency limits, logging, and email summaries"
)]
struct Args {
    /// Directory containing the job configuration
    #[arg(short = 'p', long, default_value = "./")]
    path: PathBuf,

    /// Log directory (default: <path>/logs)
    #[arg(short = 'l', long = "log_path")]
    log_path: Option<PathBuf>,

    /// Job configuration file name
    #[arg(short = 'c', long)]
    config: String,

    /// Seconds between scheduler ticks
    #[arg(short = 'd', long, default_value_t = 1)]
    delay: u64,

    /// Comma-separated step keys to force-disable
    #[arg(short = 'D', long, value_delimiter = ',')]
    disabled: Vec<String>,

    /// Override the failure email recipient
    #[arg(short = 'e', long)]
    email: Option<String>,

    /// JSON object of variables; highest precedence
    #[arg(short = 'E', long = "Extras")]
    extras: Option<String>,

    /// Path to a JSON file of variables
    #[arg(long = "extras_file")]
    extras_file: Option<PathBuf>,

    /// Seconds between running-step summaries (min 60)
    #[arg(short = 'r', long = "running_delay", default_value_t = 900)]
    running_delay: u64,

    /// Record success for every step without executing anything
    #[arg(short = 's', long)]
    simulate: bool,

    /// Verbose logging (disable with --verbose=false)
    #[arg(
        short = 'v',
        long,
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    verbose: bool,

    /// Do not send the success summary email
    #[arg(long = "no_success_email")]
    no_success_email: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(outcome) => ExitCode::from(u8::try_from(outcome.exit_code()).unwrap_or(1)),
        Err(e) => {
            eprintln!("jobrun: {:#}", e);
            ExitCode::from(CONFIG_ERROR_EXIT)
        }
    }
}

async fn run(args: Args) -> Result<JobOutcome> {
    let config_path = args.path.join(&args.config);
    let jobfile = jobrun_jobfile::load(&config_path)?;

    let extras_file_vars = match &args.extras_file {
        Some(path) => jobrun_jobfile::load_vars_file(path)?,
        None => HashMap::new(),
    };
    let mut cli_vars = match &args.extras {
        Some(snippet) => jobrun_jobfile::parse_vars_snippet(snippet)?,
        None => HashMap::new(),
    };
    // -e is a plain override of the failure recipient, applied at the
    // highest-precedence layer.
    if let Some(email) = &args.email {
        cli_vars.insert("mail_to_fail".to_string(), email.clone());
    }

    let env = VarEnv::load(&config_path, &jobfile.variables, &extras_file_vars, &cli_vars)?;
    let steps = jobrun_jobfile::resolve_steps(&jobfile, &env, &args.disabled)?;
    let graph = StepGraph::build(&steps)?;

    let log_dir = args
        .log_path
        .clone()
        .unwrap_or_else(|| args.path.join("logs"));
    let logger = Arc::new(JobLogger::create(log_dir.clone())?);

    let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(env.smtp_relay()));
    let job_name = config_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.config.clone());
    let notifier = Notifier::new(
        Arc::clone(&mailer),
        &env,
        job_name,
        config_path.display().to_string(),
        log_dir,
        args.no_success_email,
    );

    let cfg = SchedulerConfig {
        delay: Duration::from_secs(args.delay.max(1)),
        running_delay: Duration::from_secs(args.running_delay.max(MIN_RUNNING_DELAY_SECS)),
        concurrency: env.effective_concurrency(host_cpus()),
        simulate: args.simulate,
    };

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    notifier.notify_start().await;
    let summary = jobrun_engine::run_job(steps, graph, cfg, logger, mailer, cancel).await;
    notifier.notify_outcome(&summary).await;

    tracing::info!(outcome = %summary.outcome, "job complete");
    Ok(summary.outcome)
}

/// First SIGINT or SIGTERM cancels the job; running steps are terminated
/// by their workers and the scheduler drains to a canceled outcome.
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    tracing::error!(error = %e, "cannot install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                    cancel.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received"),
                _ = term.recv() => tracing::info!("termination signal received"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("interrupt received");
        }
        cancel.cancel();
    });
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("JOBRUN_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
