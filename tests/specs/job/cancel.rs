//! Graceful cancellation: SIGINT stops admission and terminates running
//! steps within the grace window.

use crate::prelude::*;
use std::time::{Duration, Instant};

#[test]
fn sigint_cancels_running_and_queued_steps() {
    let job = JobDir::with_config(&format!(
        r#"{{
            {BASE_VARIABLES},
            "steps": {{
                "running1": {{"type": "os", "task": "sleep 30"}},
                "running2": {{"type": "os", "task": "sleep 30"}},
                "queued": {{"type": "os", "task": "true", "dependencies": ["running1"]}}
            }}
        }}"#
    ));

    let mut child = job.spawn(&[]);
    // Give the scheduler time to dispatch the sleeps.
    std::thread::sleep(Duration::from_millis(1500));
    let _ = std::process::Command::new("kill")
        .arg("-INT")
        .arg(child.id().to_string())
        .status();

    let deadline = Instant::now() + Duration::from_secs(20);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        assert!(
            Instant::now() < deadline,
            "jobrun did not exit after SIGINT"
        );
        std::thread::sleep(Duration::from_millis(100));
    };

    assert_ne!(status.code(), Some(0));
    let transcript = job.transcript();
    assert!(transcript.contains("cancellation requested"));
    assert!(transcript.contains("[queued] canceled"));
    assert!(transcript.contains("[-] job finished: CANCELED"));
}
