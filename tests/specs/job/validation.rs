//! Graph validation failures abort before anything runs.

use crate::prelude::*;

#[test]
fn dependency_cycle_is_detected() {
    let job = JobDir::with_config(&format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "a": {{"type": "os", "task": "true", "dependencies": ["b"]}},
                "b": {{"type": "os", "task": "true", "dependencies": ["a"]}}
            }}
        }}"#
    ));
    let output = job.run(&[]);
    assert_eq!(exit_code(&output), 2);
    assert!(stderr_of(&output).contains("dependency cycle involving: a, b"));
    // Nothing was scheduled.
    assert_eq!(job.transcript(), "");
}

#[test]
fn dangling_dependency_is_detected() {
    let job = JobDir::with_config(&format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "a": {{"type": "os", "task": "true", "dependencies": ["ghost"]}}
            }}
        }}"#
    ));
    let output = job.run(&[]);
    assert_eq!(exit_code(&output), 2);
    assert!(stderr_of(&output).contains("unknown step 'ghost'"));
}

#[test]
fn duplicate_step_keys_are_detected() {
    let job = JobDir::with_config(&format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "a": {{"type": "os", "task": "true"}},
                "a": {{"type": "os", "task": "false"}}
            }}
        }}"#
    ));
    let output = job.run(&[]);
    assert_eq!(exit_code(&output), 2);
    assert!(stderr_of(&output).contains("duplicate step key: a"));
}

#[test]
fn second_all_step_is_rejected() {
    let job = JobDir::with_config(&format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "a": {{"type": "os", "task": "true"}},
                "z1": {{"type": "os", "task": "true", "dependencies": "ALL"}},
                "z2": {{"type": "os", "task": "true", "dependencies": "ALL"}}
            }}
        }}"#
    ));
    let output = job.run(&[]);
    assert_eq!(exit_code(&output), 2);
    assert!(stderr_of(&output).contains("more than one step"));
}
