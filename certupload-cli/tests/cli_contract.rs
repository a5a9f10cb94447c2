//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("upload_cert");
    cmd.env_remove("CERTUPLOAD_BAUD")
        .env_remove("RUST_LOG");
    cmd
}

const MISSING_PORT: &str = "/dev/certupload-no-such-port";

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("upload_cert"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("upload_cert"))
        .stderr(predicate::str::is_empty());
}

// ============================================================================
// Usage errors - exit code 1, usage on stdout
// ============================================================================

#[test]
fn no_arguments_prints_usage_and_exits_one() {
    let mut cmd = cli_cmd();
    cmd.assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Usage: upload_cert <serial_port> <cert_file>"));
}

#[test]
fn one_argument_prints_usage_and_exits_one() {
    let mut cmd = cli_cmd();
    cmd.arg(MISSING_PORT)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Example:"));
}

#[test]
fn three_arguments_prints_usage_and_exits_one() {
    let mut cmd = cli_cmd();
    cmd.args([MISSING_PORT, "ca.crt", "extra"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Usage:"))
        .stderr(predicate::str::contains("extra"));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    let mut cmd = cli_cmd();
    cmd.args(["--invalid-flag-xyz", MISSING_PORT, "ca.crt"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Usage:"));
}

// ============================================================================
// Fatal errors - exit code 1, message on stderr, stdout clean
// ============================================================================

#[test]
fn missing_certificate_file_fails_before_opening_port() {
    let dir = tempdir().expect("tempdir should be created");
    let nonexistent = dir
        .path()
        .join("not_exists.crt");

    let mut cmd = cli_cmd();
    cmd.arg(MISSING_PORT)
        .arg(nonexistent.as_os_str())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Failed to load certificate"))
        .stderr(predicate::str::contains("not_exists.crt"));
}

#[test]
fn unopenable_port_is_fatal() {
    let dir = tempdir().expect("tempdir should be created");
    let cert = dir
        .path()
        .join("mqtt_ca.crt");
    fs::write(
        &cert,
        "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n",
    )
    .expect("write certificate");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg(MISSING_PORT)
        .arg(&cert)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains(MISSING_PORT));
}

#[test]
fn json_flag_keeps_stdout_clean_on_fatal_error() {
    let dir = tempdir().expect("tempdir should be created");
    let cert = dir
        .path()
        .join("mqtt_ca.crt");
    fs::write(&cert, "line\n").expect("write certificate");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--json")
        .arg(MISSING_PORT)
        .arg(&cert)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn invalid_local_config_warns_and_continues() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(
        dir.path()
            .join("certupload.toml"),
        "invalid toml [[[",
    )
    .expect("write invalid config");
    let cert = dir
        .path()
        .join("mqtt_ca.crt");
    fs::write(&cert, "line\n").expect("write certificate");

    let output = cli_cmd()
        .current_dir(dir.path())
        .arg(MISSING_PORT)
        .arg(&cert)
        .output()
        .expect("command should execute");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TOML"), "should warn about invalid TOML");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn zero_attempt_config_is_rejected() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir
        .path()
        .join("custom.toml");
    fs::write(&config, "[upload]\nbegin_attempts = 0\n").expect("write config");
    let cert = dir
        .path()
        .join("mqtt_ca.crt");
    fs::write(&cert, "line\n").expect("write certificate");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg(MISSING_PORT)
        .arg(&cert)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("begin_attempts"));
}

#[test]
fn zero_timeout_config_is_rejected() {
    let dir = tempdir().expect("tempdir should be created");
    let config = dir
        .path()
        .join("custom.toml");
    fs::write(&config, "[serial]\ntimeout_ms = 0\n").expect("write config");
    let cert = dir
        .path()
        .join("mqtt_ca.crt");
    fs::write(&cert, "line\n").expect("write certificate");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg(MISSING_PORT)
        .arg(&cert)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("timeout must be greater than zero"));
}
