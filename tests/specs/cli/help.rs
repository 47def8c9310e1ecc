//! The CLI surface stays stable: flag names are part of the contract.

use crate::prelude::*;

#[test]
fn help_lists_the_documented_flags() {
    let job = JobDir::with_config("{}");
    let output = job.run(&["--help"]);
    let help = String::from_utf8_lossy(&output.stdout).into_owned();

    for flag in [
        "--path",
        "--log_path",
        "--config",
        "--delay",
        "--disabled",
        "--email",
        "--Extras",
        "--extras_file",
        "--running_delay",
        "--simulate",
        "--verbose",
        "--no_success_email",
    ] {
        assert!(help.contains(flag), "help is missing {flag}:\n{help}");
    }
}

#[test]
fn version_prints_and_exits_zero() {
    let job = JobDir::with_config("{}");
    let output = job.run(&["--version"]);
    assert_eq!(exit_code(&output), 0);
    assert!(String::from_utf8_lossy(&output.stdout).contains("jobrun"));
}
