//! Simulate mode: no side effects, immediate success, marker in the logs.

use crate::prelude::*;

#[test]
fn simulate_succeeds_where_the_real_run_would_fail() {
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
    let output = job.run(&["--simulate", "--no_success_email"]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));

    let transcript = job.transcript();
    for key in ["x", "y", "z"] {
        assert!(transcript.contains(&format!("[{key}] succeeded")));
        assert!(job.step_stdout(key).contains("simulated"));
    }
}

#[test]
fn simulate_spawns_no_subprocesses() {
    let job = JobDir::with_config("{}");
    let marker = job.path().join("ran.txt");
    let config = format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "touchy": {{"type": "os", "task": "touch {}"}}
            }}
        }}"#,
        marker.display()
    );
    std::fs::write(job.path().join("job.json"), config).unwrap();

    let output = job.run(&["-s", "--no_success_email"]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));
    assert!(!marker.exists(), "simulated step ran its command");
}

#[test]
fn per_step_simulate_only_suppresses_that_step() {
    let job = JobDir::with_config("{}");
    let config = format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "real": {{"type": "os", "task": "{real}"}},
                "dry": {{"type": "os", "task": "{dry}", "simulate": true}}
            }}
        }}"#,
        real = job.appender_task("real"),
        dry = job.appender_task("dry"),
    );
    std::fs::write(job.path().join("job.json"), config).unwrap();

    let output = job.run(&["--no_success_email"]);
    assert_eq!(exit_code(&output), 0, "stderr: {}", stderr_of(&output));
    assert_eq!(job.recorded_order(), ["real"]);
    assert!(job.step_stdout("dry").contains("simulated"));
}
