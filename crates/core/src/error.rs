// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration error taxonomy.
//!
//! Every error here is fatal before scheduling begins: the job aborts with a
//! message on stderr and a non-zero exit, and no email is sent.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, resolving, or validating a job configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    #[error("invalid JSON in {}: {message}", .path.display())]
    InvalidJson { path: PathBuf, message: String },
    #[error("required variable not set: {0}")]
    MissingRequiredVariable(String),
    #[error("invalid value for variable '{name}': {value}")]
    InvalidVariable { name: String, value: String },
    #[error("unknown variable ${name} in {location}")]
    UnknownVariable { name: String, location: String },
    #[error("duplicate step key: {0}")]
    DuplicateKey(String),
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    DanglingDependency { step: String, dependency: String },
    #[error("more than one step declares dependencies = \"ALL\": {0}")]
    MultipleAllSteps(String),
    #[error("dependency cycle involving: {0}")]
    CycleDetected(String),
    #[error("invalid step '{step}': {message}")]
    InvalidStep { step: String, message: String },
    #[error("cannot create log directory {}: {message}", .path.display())]
    LogDirUncreatable { path: PathBuf, message: String },
}
