//! CLI tests for the `scpi run` subcommand.

use std::fs;
use std::process::Command;

use assert_cmd::cargo;

const SCRIPT: &str = "TEST:TEXT 'a;b';TEXT?\nTEST2:NUM3?\n*IDN?\n";

fn scpi_cmd() -> Command {
    Command::new(cargo::cargo_bin!("scpi"))
}

fn write_temp(name: &str, content: &str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write temp file");
    (dir, path.to_string_lossy().to_string())
}

fn run_json(args: &[&str]) -> serde_json::Value {
    let output = scpi_cmd()
        .args(["run", "--output", "json"])
        .args(args)
        .output()
        .expect("run command");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("valid json")
}

#[test]
fn run_stdin_streams_responses() {
    let output = assert_cmd::Command::new(cargo::cargo_bin!("scpi"))
        .args(["run", "--output", "pretty"])
        .write_stdin("*IDN?\nTEST:TEXT 'hi';TEXT?\n")
        .output()
        .expect("run command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "MANUFACTURE,INSTR2013,,01-02\n\"hi\"\n");
}

#[test]
fn run_pretty_reports_errors_on_stderr() {
    let (_dir, path) = write_temp("errors.scpi", "BOGUS\n*OPC?\n");
    let output = scpi_cmd()
        .args(["run", &path, "--output", "pretty"])
        .output()
        .expect("run command");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "1\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("-113,\"Undefined header\""), "stderr: {stderr}");
}

#[test]
fn run_echoes_typed_test_commands() {
    let (_dir, path) = write_temp(
        "typed.scpi",
        "TEST:INT32 7\nTEST:INT32?\nTEST:DOUB 2.5;DOUB?\nTEST:NOOP\nTEST:QUER?\n",
    );
    let json = run_json(&[&path]);
    assert_eq!(json["output"], "7\n2.5\n42,3.14,\"hello\"\n");
    assert_eq!(json["errors"], serde_json::json!([]));
}

#[test]
fn run_json_reports_output_and_errors() {
    let (_dir, path) = write_temp("errors.scpi", "BOGUS\n*OPC?\n");
    let json = run_json(&[&path]);

    assert_eq!(json["output"], "1\n");
    assert_eq!(json["errors"][0]["code"], -113);
    assert_eq!(json["errors"][0]["message"], "Undefined header");
    assert_eq!(json["pending"].as_array().map(Vec::len), Some(1));
    let stb = json["statusByte"].as_u64().expect("status byte");
    assert_eq!(stb & 0x04, 0x04, "error queue not empty");
}

#[test]
fn run_chunked_matches_whole_input() {
    let (_dir, path) = write_temp("script.scpi", SCRIPT);
    let whole = run_json(&[&path]);
    let chunked = run_json(&[&path, "--chunk", "1"]);

    assert_eq!(whole["output"], "\"a;b\"\n2,3\nMANUFACTURE,INSTR2013,,01-02\n");
    assert_eq!(whole["output"], chunked["output"]);
    assert_eq!(chunked["errors"].as_array().map(Vec::len), Some(0));
}

#[test]
fn run_without_trailing_newline_completes_at_eof() {
    let (_dir, path) = write_temp("script.scpi", "*OPC?");
    let json = run_json(&[&path]);
    assert_eq!(json["output"], "1\n");
}

#[test]
fn run_honours_config_file() {
    let (_dir, script) = write_temp("script.scpi", "*OPC?\n");
    let (_cfg_dir, config) = write_temp("config.json", r#"{ "line_ending": "crlf" }"#);
    let json = run_json(&[&script, "--config", &config]);
    assert_eq!(json["output"], "1\r\n");
}

#[test]
fn run_small_input_buffer_overrun_resets_session() {
    let (_dir, script) = write_temp(
        "script.scpi",
        "TEST:TEXT 'a message well past sixteen bytes'\n*OPC?\n",
    );
    let (_cfg_dir, config) = write_temp("config.json", r#"{ "input_capacity": 16 }"#);
    let output = scpi_cmd()
        .args(["run", &script, "--config", &config, "--output", "json"])
        .output()
        .expect("run command");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("session reset"), "stderr: {stderr}");
    let json: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("valid json");
    assert_eq!(json["errors"][0]["code"], -363);
}

#[test]
fn run_invalid_config_emits_json_error_envelope() {
    let (_dir, script) = write_temp("script.scpi", "*OPC?\n");
    let (_cfg_dir, config) = write_temp("config.json", r#"{ "input_capacity": 0 }"#);
    let output = scpi_cmd()
        .args(["run", &script, "--config", &config, "--output", "json"])
        .output()
        .expect("run command");

    assert!(!output.status.success());
    let json: serde_json::Value =
        serde_json::from_str(&String::from_utf8_lossy(&output.stdout)).expect("valid json");
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "command_failed");
    assert!(
        json["message"].as_str().is_some_and(|m| m.contains("input_capacity")),
        "unexpected message: {}",
        json["message"]
    );
}

#[test]
fn run_missing_file_fails() {
    let output = scpi_cmd()
        .args(["run", "nope-does-not-exist.scpi", "--output", "pretty"])
        .output()
        .expect("run command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read"), "stderr: {stderr}");
}

#[test]
fn run_zero_chunk_is_rejected() {
    let (_dir, path) = write_temp("script.scpi", SCRIPT);
    let output = scpi_cmd()
        .args(["run", &path, "--chunk", "0", "--output", "json"])
        .output()
        .expect("run command");
    assert!(!output.status.success());
}
