// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job file parsing.
//!
//! The job file is a JSON object with two keys: `variables` (string map)
//! and `steps` (step key → step record). Step entries are collected as
//! pairs before building the map so textually duplicated keys surface as
//! [`ConfigError::DuplicateKey`] instead of silently collapsing.

use indexmap::IndexMap;
use jobrun_core::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Parsed job configuration, prior to variable resolution.
#[derive(Debug)]
pub struct JobFile {
    pub variables: HashMap<String, String>,
    pub steps: IndexMap<String, StepRecord>,
}

/// One step as written in the job file.
#[derive(Debug, Clone, Deserialize)]
pub struct StepRecord {
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub task: String,
    /// Display name for logs; defaults to the step key
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dependencies: DependenciesField,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub simulate: bool,
    /// Exit codes counted as success; entries may be numbers or numeric
    /// strings, coerced at resolve time. Defaults to `[0]`.
    #[serde(default)]
    pub resultcode_allowed: Option<Vec<serde_json::Value>>,
    /// Parameters for internal tasks
    #[serde(default)]
    pub detail: HashMap<String, serde_json::Value>,
    /// Free-form annotation, ignored by the runner
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Os,
    Internal,
}

/// The `dependencies` field: an array of step keys, or a bare string that
/// must spell the `"ALL"` sentinel (checked at resolve time).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependenciesField {
    Sentinel(String),
    Keys(Vec<String>),
}

impl Default for DependenciesField {
    fn default() -> Self {
        DependenciesField::Keys(Vec::new())
    }
}

fn default_enabled() -> bool {
    true
}

/// Step entries in file order, duplicates preserved for the parse check.
#[derive(Debug, Default)]
struct StepEntries(Vec<(String, StepRecord)>);

impl<'de> Deserialize<'de> for StepEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> serde::de::Visitor<'de> for EntriesVisitor {
            type Value = StepEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of step records keyed by step key")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, record)) = access.next_entry::<String, StepRecord>()? {
                    entries.push((key, record));
                }
                Ok(StepEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[derive(Debug, Deserialize)]
struct RawJobFile {
    #[serde(default)]
    variables: HashMap<String, String>,
    #[serde(default)]
    steps: StepEntries,
}

/// Load and parse a job file from disk.
pub fn load(path: &Path) -> Result<JobFile, ConfigError> {
    let text = read_file(path)?;
    parse(&text, path)
}

/// Parse job file text. `path` is used in error messages only.
pub fn parse(text: &str, path: &Path) -> Result<JobFile, ConfigError> {
    let raw: RawJobFile =
        serde_json::from_str(text).map_err(|e| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut steps = IndexMap::with_capacity(raw.steps.0.len());
    for (key, record) in raw.steps.0 {
        if steps.insert(key.clone(), record).is_some() {
            return Err(ConfigError::DuplicateKey(key));
        }
    }

    Ok(JobFile {
        variables: raw.variables,
        steps,
    })
}

/// Load a flat string→string variable map from a JSON file (`--extras_file`).
pub fn load_vars_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let text = read_file(path)?;
    serde_json::from_str(&text).map_err(|e| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Parse the `-E` command-line variable snippet.
pub fn parse_vars_snippet(text: &str) -> Result<HashMap<String, String>, ConfigError> {
    serde_json::from_str(text).map_err(|e| ConfigError::InvalidJson {
        path: PathBuf::from("<command-line extras>"),
        message: e.to_string(),
    })
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::ConfigNotFound(path.to_path_buf()),
        _ => ConfigError::InvalidJson {
            path: path.to_path_buf(),
            message: format!("read error: {}", e),
        },
    })
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
