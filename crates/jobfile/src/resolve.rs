// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-time variable resolution over step records.
//!
//! Every string field of every step, including `detail` parameters, passes
//! through [`VarEnv::substitute`] exactly once here, before the scheduler
//! sees the job. A reference that cannot be resolved aborts the run with
//! the field named in the error.

use crate::parser::{DependenciesField, JobFile, StepRecord, StepType};
use indexmap::IndexMap;
use jobrun_core::{ConfigError, Dependencies, Step, StepAction, VarEnv};

/// Resolve all step records against the frozen environment.
///
/// `disabled` keys (from `--disabled`) are force-disabled; keys that match
/// no step are warned about and ignored.
pub fn resolve_steps(
    jobfile: &JobFile,
    env: &VarEnv,
    disabled: &[String],
) -> Result<IndexMap<String, Step>, ConfigError> {
    for key in disabled {
        if !jobfile.steps.contains_key(key) {
            tracing::warn!(step = %key, "--disabled names an unknown step, ignoring");
        }
    }

    let mut steps = IndexMap::with_capacity(jobfile.steps.len());
    for (key, record) in &jobfile.steps {
        let force_disabled = disabled.iter().any(|d| d == key);
        let step = resolve_step(key, record, env, force_disabled)?;
        steps.insert(key.clone(), step);
    }
    Ok(steps)
}

fn resolve_step(
    key: &str,
    record: &StepRecord,
    env: &VarEnv,
    force_disabled: bool,
) -> Result<Step, ConfigError> {
    let name = record.name.clone().unwrap_or_else(|| key.to_string());
    let name = env.substitute(&name, &field_location(key, "name"))?;

    let task = env.substitute(&record.task, &field_location(key, "task"))?;

    let action = match record.step_type {
        StepType::Os => StepAction::OsCommand { cmdline: task },
        StepType::Internal => resolve_internal(key, record, env, &task)?,
    };

    let dependencies = match &record.dependencies {
        DependenciesField::Keys(keys) => Dependencies::Keys(keys.clone()),
        DependenciesField::Sentinel(s) if s == "ALL" => Dependencies::All,
        DependenciesField::Sentinel(other) => {
            return Err(ConfigError::InvalidStep {
                step: key.to_string(),
                message: format!(
                    "dependencies must be a list of step keys or the literal \"ALL\", got \"{}\"",
                    other
                ),
            })
        }
    };

    let resultcode_allowed = match &record.resultcode_allowed {
        None => vec![0],
        Some(values) => values
            .iter()
            .map(|v| coerce_int(v, key, "resultcode_allowed"))
            .collect::<Result<Vec<i32>, ConfigError>>()?,
    };

    Ok(Step {
        key: key.to_string(),
        name,
        action,
        dependencies,
        enabled: record.enabled && !force_disabled,
        simulate: record.simulate,
        resultcode_allowed,
    })
}

fn resolve_internal(
    key: &str,
    record: &StepRecord,
    env: &VarEnv,
    task: &str,
) -> Result<StepAction, ConfigError> {
    match task {
        "send_mail" => Ok(StepAction::SendMail {
            to: detail_string(key, record, env, "mail_to")?,
            from: detail_string(key, record, env, "mail_from")?,
            subject: detail_string(key, record, env, "mail_subject")?,
            body: detail_string(key, record, env, "mail_body")?,
        }),
        "sleep" => {
            let value = record.detail.get("seconds").ok_or_else(|| {
                ConfigError::InvalidStep {
                    step: key.to_string(),
                    message: "internal sleep requires detail.seconds".to_string(),
                }
            })?;
            let seconds = coerce_int(value, key, "detail.seconds")?;
            let seconds = u64::try_from(seconds).map_err(|_| ConfigError::InvalidStep {
                step: key.to_string(),
                message: format!("detail.seconds must be non-negative, got {}", seconds),
            })?;
            Ok(StepAction::Sleep { seconds })
        }
        other => Err(ConfigError::InvalidStep {
            step: key.to_string(),
            message: format!(
                "unknown internal task '{}'; expected send_mail or sleep",
                other
            ),
        }),
    }
}

fn detail_string(
    key: &str,
    record: &StepRecord,
    env: &VarEnv,
    field: &str,
) -> Result<String, ConfigError> {
    let value = record
        .detail
        .get(field)
        .ok_or_else(|| ConfigError::InvalidStep {
            step: key.to_string(),
            message: format!("internal send_mail requires detail.{}", field),
        })?;
    let raw = value.as_str().ok_or_else(|| ConfigError::InvalidStep {
        step: key.to_string(),
        message: format!("detail.{} must be a string", field),
    })?;
    env.substitute(raw, &field_location(key, &format!("detail.{}", field)))
}

/// Coerce a JSON number or numeric string to an integer.
fn coerce_int(value: &serde_json::Value, key: &str, field: &str) -> Result<i32, ConfigError> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        serde_json::Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ConfigError::InvalidStep {
        step: key.to_string(),
        message: format!("{} entries must be integers, got {}", field, value),
    })
}

fn field_location(key: &str, field: &str) -> String {
    format!("step '{}' {}", key, field)
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
