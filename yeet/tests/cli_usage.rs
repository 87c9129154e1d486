//! CLI tests: spawn the yeet binary and check exit codes and stdout.

use std::fs;
use std::process::Command;

use yeet::exit_codes;

fn yeet() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_yeet"));
    cmd.env_remove("AWS_REGION")
        .env_remove("AWS_DEFAULT_REGION")
        .env_remove("BUILDKITE")
        .env_remove("YEET_SETTINGS");
    cmd
}

#[test]
fn no_arguments_is_usage_error() {
    let status = yeet().status().expect("run yeet");
    assert_eq!(status.code(), Some(exit_codes::USAGE));
}

#[test]
fn help_is_usage_exit() {
    let status = yeet().arg("--help").status().expect("run yeet");
    assert_eq!(status.code(), Some(exit_codes::USAGE));
}

#[test]
fn version_exits_ok() {
    let output = yeet().arg("--version").output().expect("run yeet");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("yeet "));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let status = yeet().arg("destroy").status().expect("run yeet");
    assert_eq!(status.code(), Some(exit_codes::USAGE));
}

#[test]
fn missing_region_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("app.yml"), "name: billing\n").expect("write");
    let output = yeet()
        .current_dir(temp.path())
        .args(["output", "inputs", "app.yml"])
        .output()
        .expect("run yeet");
    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no region set"));
}

#[test]
fn output_inputs_prints_resolved_yaml() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("app.yml"),
        "name: billing\naws: {}\nbucket: 'logs-<( aws.region )>'\n",
    )
    .expect("write");
    let output = yeet()
        .current_dir(temp.path())
        .env("AWS_REGION", "eu-west-1")
        .args(["output", "inputs", "app.yml"])
        .output()
        .expect("run yeet");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("name: billing\n"));
    assert!(stdout.contains("region: eu-west-1\n"));
    assert!(stdout.contains("bucket: logs-eu-west-1\n"));
}

#[test]
fn region_flag_overrides_environment() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("app.yml"), "name: billing\naws: {}\n").expect("write");
    let output = yeet()
        .current_dir(temp.path())
        .env("AWS_REGION", "eu-west-1")
        .args(["-r", "us-east-2", "output", "inputs", "app.yml"])
        .output()
        .expect("run yeet");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&output.stdout).contains("region: us-east-2\n"));
}

#[test]
fn output_template_renders_document() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("app.yml"),
        "name: billing\ncontainers:\n  web:\n    image: nginx:1.27\n",
    )
    .expect("write");
    let output = yeet()
        .current_dir(temp.path())
        .env("AWS_REGION", "eu-west-1")
        .args(["output", "template", "app.yml"])
        .output()
        .expect("run yeet");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("AWS::ECS::Service"));
    assert!(stdout.contains("Image: \"nginx:1.27\""));
}

#[test]
fn invalid_settings_file_fails() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("app.yml"), "name: billing\n").expect("write");
    fs::write(temp.path().join(".yeet.toml"), "command_timeout_secs = 0\n").expect("write");
    let output = yeet()
        .current_dir(temp.path())
        .env("AWS_REGION", "eu-west-1")
        .args(["output", "inputs", "app.yml"])
        .output()
        .expect("run yeet");
    assert_eq!(output.status.code(), Some(exit_codes::FAILURE));
}
