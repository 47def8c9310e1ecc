//! End-to-end execution behavior: ordering, propagation, substitution.

use crate::prelude::*;

#[test]
fn linear_chain_runs_in_order_and_exits_zero() {
    let job = JobDir::with_config("{}");
    let config = format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "a": {{"type": "os", "task": "{a}"}},
                "b": {{"type": "os", "task": "{b}", "dependencies": ["a"]}},
                "c": {{"type": "os", "task": "{c}", "dependencies": ["b"]}}
            }}
        }}"#,
        a = job.appender_task("a"),
        b = job.appender_task("b"),
        c = job.appender_task("c"),
    );
    std::fs::write(job.path().join("job.json"), config).unwrap();

    let output = job.run(&["--no_success_email"]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));
    assert_eq!(job.recorded_order(), ["a", "b", "c"]);

    let transcript = job.transcript();
    assert!(transcript.contains("[-] job finished: SUCCESS"));
}

#[test]
fn failure_cancels_descendants_and_exits_nonzero() {
    let job = JobDir::with_config(&format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "x": {{"type": "os", "task": "false"}},
                "y": {{"type": "os", "task": "true", "dependencies": ["x"]}},
                "z": {{"type": "os", "task": "true"}}
            }}
        }}"#
    ));
    let output = job.run(&[]);
    assert_eq!(exit_code(&output), 1);

    let transcript = job.transcript();
    assert!(transcript.contains("[x] failed"));
    assert!(transcript.contains("[y] canceled (dependency 'x' did not succeed)"));
    assert!(transcript.contains("[z] succeeded"));
    assert!(transcript.contains("[-] job finished: FAILURE"));
}

#[test]
fn variables_substitute_into_tasks_with_escape() {
    let job = JobDir::with_config(&format!(
        r#"{{
            "variables": {{
                "mail_to": "ops@example.invalid",
                "mail_to_fail": "oncall@example.invalid",
                "smtp_relay": "127.0.0.1",
                "db": "prod"
            }},
            "steps": {{
                "report": {{"type": "os", "task": "echo $db costs '$$5'"}}
            }}
        }}"#
    ));
    let output = job.run(&["--no_success_email"]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));
    // The runner resolves $db and the $$ escape; the single quotes keep the
    // shell from treating the resulting $5 as a positional parameter.
    assert_eq!(job.step_stdout("report"), "prod costs $5\n");
}

#[test]
fn disabled_steps_are_skipped_but_satisfy_dependents() {
    let job = JobDir::with_config("{}");
    let config = format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "a": {{"type": "os", "task": "{a}", "enabled": false}},
                "b": {{"type": "os", "task": "{b}", "dependencies": ["a"]}}
            }}
        }}"#,
        a = job.appender_task("a"),
        b = job.appender_task("b"),
    );
    std::fs::write(job.path().join("job.json"), config).unwrap();

    let output = job.run(&["--no_success_email"]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));
    // Only b ran; the disabled step never invoked its task.
    assert_eq!(job.recorded_order(), ["b"]);
    assert!(job.transcript().contains("[a] skipped (disabled)"));
}

#[test]
fn force_disable_flag_behaves_like_config_disable() {
    let job = JobDir::with_config("{}");
    let config = format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "a": {{"type": "os", "task": "{a}"}},
                "b": {{"type": "os", "task": "{b}"}}
            }}
        }}"#,
        a = job.appender_task("a"),
        b = job.appender_task("b"),
    );
    std::fs::write(job.path().join("job.json"), config).unwrap();

    let output = job.run(&["--no_success_email", "-D", "a"]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));
    assert_eq!(job.recorded_order(), ["b"]);
}

#[test]
fn all_sentinel_runs_last() {
    let job = JobDir::with_config("{}");
    let config = format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "s1": {{"type": "os", "task": "{s1}"}},
                "s2": {{"type": "os", "task": "{s2}"}},
                "s3": {{"type": "os", "task": "{s3}"}},
                "finale": {{"type": "os", "task": "{finale}", "dependencies": "ALL"}}
            }}
        }}"#,
        s1 = job.appender_task("s1"),
        s2 = job.appender_task("s2"),
        s3 = job.appender_task("s3"),
        finale = job.appender_task("finale"),
    );
    std::fs::write(job.path().join("job.json"), config).unwrap();

    let output = job.run(&["--no_success_email"]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));
    let order = job.recorded_order();
    assert_eq!(order.len(), 4);
    assert_eq!(order[3], "finale");
}

#[test]
fn allowed_result_codes_make_nonzero_exits_a_success() {
    let job = JobDir::with_config(&format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "grepless": {{"type": "os", "task": "exit 1", "resultcode_allowed": [0, 1]}}
            }}
        }}"#
    ));
    let output = job.run(&["--no_success_email"]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));
}

#[test]
fn stderr_of_steps_is_captured_separately() {
    let job = JobDir::with_config(&format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "noisy": {{"type": "os", "task": "echo out; echo err >&2"}}
            }}
        }}"#
    ));
    let output = job.run(&["--no_success_email"]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));
    assert_eq!(job.step_stdout("noisy"), "out\n");
    let err = std::fs::read_to_string(job.path().join("logs/noisy.err")).unwrap();
    assert_eq!(err, "err\n");
}
