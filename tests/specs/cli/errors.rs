//! Configuration errors abort before any step runs, with a non-zero exit.

use crate::prelude::*;

#[test]
fn missing_config_file_fails_with_message() {
    let job = JobDir::with_config("{}");
    let output = job.run_named("missing.json", &[]);
    assert_eq!(exit_code(&output), 2);
    assert!(stderr_of(&output).contains("not found"));
}

#[test]
fn invalid_json_fails_before_running_steps() {
    let job = JobDir::with_config("{ this is not json");
    let output = job.run(&[]);
    assert_eq!(exit_code(&output), 2);
    assert!(stderr_of(&output).contains("invalid JSON"));
    // No log directory means nothing was scheduled.
    assert_eq!(job.transcript(), "");
}

#[test]
fn unknown_variable_aborts_the_job() {
    let job = JobDir::with_config(&format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "a": {{"type": "os", "task": "echo $no_such_var"}}
            }}
        }}"#
    ));
    let output = job.run(&[]);
    assert_eq!(exit_code(&output), 2);
    assert!(stderr_of(&output).contains("unknown variable $no_such_var"));
    assert_eq!(job.transcript(), "");
}

#[test]
fn missing_required_mail_variables_abort() {
    let job = JobDir::with_config(
        r#"{"steps": {"a": {"type": "os", "task": "true"}}}"#,
    );
    let output = job.run(&[]);
    assert_eq!(exit_code(&output), 2);
    assert!(stderr_of(&output).contains("required variable not set: mail_to"));
}

#[test]
fn extras_snippet_can_supply_required_variables() {
    let job = JobDir::with_config(
        r#"{"steps": {"a": {"type": "os", "task": "true"}}}"#,
    );
    let output = job.run(&[
        "--no_success_email",
        "-E",
        r#"{"mail_to": "ops@example.invalid", "mail_to_fail": "oncall@example.invalid"}"#,
    ]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));
}
