// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Variable environment and `$name` substitution.
//!
//! Four layers merged in order of increasing precedence: built-in defaults,
//! the configuration's `variables` object, the extras file, and the `-E`
//! command-line snippet. The environment is resolved once at job initiation
//! and immutable afterwards.

use crate::error::ConfigError;
use chrono::Local;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// Variables that must be present after merging all layers.
const REQUIRED_VARS: &[&str] = &["mail_to", "mail_to_fail"];

/// Matches `$$` or `$name` where name is a maximal run of identifier
/// characters. The escape alternative is listed first so `$$x` reads as a
/// literal dollar followed by the text `x`, not a reference to `$x`.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\$|[A-Za-z0-9_]+)").expect("constant regex pattern is valid"));

/// The frozen variable environment of one job run.
#[derive(Debug, Clone)]
pub struct VarEnv {
    vars: HashMap<String, String>,
    /// Concurrency supplied by a non-builtin layer, if any
    explicit_concurrency: Option<usize>,
}

impl VarEnv {
    /// Merge the four layers and validate the result.
    ///
    /// Built-ins are computed from one wall-clock snapshot so the date
    /// variables agree with each other. `mail_from` defaults against the
    /// post-merge `hostname` and `mail_from_domain` values, so overriding
    /// either in any layer changes the derived sender.
    pub fn load(
        config_file: &Path,
        config_vars: &HashMap<String, String>,
        extras_file_vars: &HashMap<String, String>,
        cli_vars: &HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut vars = builtins(config_file);

        let layers = [config_vars, extras_file_vars, cli_vars];
        for layer in layers {
            for (k, v) in layer {
                vars.insert(k.clone(), v.clone());
            }
        }

        if !vars.contains_key("mail_from") {
            let host = vars.get("hostname").cloned().unwrap_or_default();
            let domain = vars.get("mail_from_domain").cloned().unwrap_or_default();
            vars.insert("mail_from".to_string(), format!("{}@{}", host, domain));
        }

        for required in REQUIRED_VARS {
            if !vars.contains_key(*required) {
                return Err(ConfigError::MissingRequiredVariable(required.to_string()));
            }
        }

        let explicit_concurrency = layers
            .iter()
            .any(|layer| layer.contains_key("concurrency"))
            .then(|| parse_concurrency(&vars))
            .transpose()?;

        Ok(Self {
            vars,
            explicit_concurrency,
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// The concurrency cap: an explicitly configured value wins (floored at
    /// one), otherwise the host CPU count.
    pub fn effective_concurrency(&self, cpus: usize) -> usize {
        match self.explicit_concurrency {
            Some(explicit) => explicit.max(1),
            None => cpus.max(1),
        }
    }

    pub fn mail_to(&self) -> &str {
        self.get("mail_to").unwrap_or_default()
    }

    pub fn mail_to_fail(&self) -> &str {
        self.get("mail_to_fail").unwrap_or_default()
    }

    pub fn mail_from(&self) -> &str {
        self.get("mail_from").unwrap_or_default()
    }

    pub fn smtp_relay(&self) -> &str {
        self.get("smtp_relay").unwrap_or("localhost")
    }

    /// Replace every `$name` with its value and every `$$` with a literal
    /// `$`. A `$` followed by neither an identifier character nor `$` is
    /// kept as-is. Single-pass: substituted values are not re-scanned.
    ///
    /// `location` names the field being resolved, for the error message.
    pub fn substitute(&self, input: &str, location: &str) -> Result<String, ConfigError> {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for m in VAR_PATTERN.find_iter(input) {
            out.push_str(&input[last..m.start()]);
            let token = &input[m.start() + 1..m.end()];
            if token == "$" {
                out.push('$');
            } else {
                match self.vars.get(token) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(ConfigError::UnknownVariable {
                            name: token.to_string(),
                            location: location.to_string(),
                        })
                    }
                }
            }
            last = m.end();
        }
        out.push_str(&input[last..]);
        Ok(out)
    }
}

fn parse_concurrency(vars: &HashMap<String, String>) -> Result<usize, ConfigError> {
    let raw = vars.get("concurrency").cloned().unwrap_or_default();
    raw.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidVariable {
            name: "concurrency".to_string(),
            value: raw,
        })
}

/// Host CPU count, floored at one.
pub fn host_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn builtins(config_file: &Path) -> HashMap<String, String> {
    let now = Local::now();
    let fqdn = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string());
    let short = fqdn.split('.').next().unwrap_or(&fqdn).to_string();

    let mut vars = HashMap::new();
    vars.insert("concurrency".to_string(), host_cpus().to_string());
    vars.insert(
        "config_file".to_string(),
        config_file.display().to_string(),
    );
    vars.insert("date".to_string(), now.format("%Y_%m_%d").to_string());
    vars.insert(
        "date_time".to_string(),
        now.format("%Y%m%d_%H%M%S").to_string(),
    );
    vars.insert(
        "date_time_2".to_string(),
        now.format("%Y%m%d-%H%M%S").to_string(),
    );
    vars.insert(
        "date_time_3".to_string(),
        now.format("%Y%m%d%H%M%S").to_string(),
    );
    vars.insert(
        "date_time_4".to_string(),
        now.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    vars.insert(
        "date_time_friendly".to_string(),
        now.format("%a %b %e %H:%M:%S %Y").to_string(),
    );
    vars.insert("hostname".to_string(), short);
    vars.insert("hostname_fqdn".to_string(), fqdn.clone());
    vars.insert("mail_from_domain".to_string(), fqdn);
    vars.insert("smtp_relay".to_string(), "localhost".to_string());
    vars
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
