//! Integration tests for the zemu-run binary.

use env_logger as _;
use log as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use zemu_core as _;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("zemu-run")
}

/// Echoes serial input until a `.` has been echoed, then halts.
///
/// ```text
/// wait: IN A,(2) ; OR A ; JR Z,wait
///       IN A,(0) ; OUT (1),A ; CP '.' ; JR NZ,wait
///       HALT
/// ```
const ECHO_FIRMWARE: [u8; 14] = [
    0xDB, 0x02, 0xB7, 0x28, 0xFB, 0xDB, 0x00, 0xD3, 0x01, 0xFE, b'.', 0x20, 0xF3, 0x76,
];

/// `LD A,'!' ; OUT (1),A ; JR $`
const SPIN_FIRMWARE: [u8; 6] = [0x3E, b'!', 0xD3, 0x01, 0x18, 0xFE];

fn write_machine(dir: &Path, firmware: &[u8]) -> PathBuf {
    fs::write(dir.join("firmware.bin"), firmware).unwrap();
    let description = r#"
[[device]]
type = "rom"
name = "rom"
base = 0x0000
size = 0x1000
image = "firmware.bin"

[[device]]
type = "ram"
name = "ram"
base = 0x8000
size = 0x8000

[[device]]
type = "serial"
name = "console"
in_port = 0x00
out_port = 0x01
ready_port = 0x02
"#;
    let path = dir.join("machine.toml");
    fs::write(&path, description).unwrap();
    path
}

#[test]
fn echoes_input_and_halts() {
    let temp_dir = tempfile::tempdir().unwrap();
    let machine = write_machine(temp_dir.path(), &ECHO_FIRMWARE);

    let output = Command::new(binary_path())
        .args([machine.to_str().unwrap(), "--input", "hi."])
        .output()
        .expect("failed to run zemu-run");

    assert!(output.status.success());
    assert_eq!(output.stdout, b"hi.");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("halted"), "stderr: {stderr}");
}

#[test]
fn cycle_budget_stops_a_spinning_program() {
    let temp_dir = tempfile::tempdir().unwrap();
    let machine = write_machine(temp_dir.path(), &SPIN_FIRMWARE);

    let output = Command::new(binary_path())
        .args([machine.to_str().unwrap(), "--max-cycles", "1000"])
        .output()
        .expect("failed to run zemu-run");

    assert!(output.status.success());
    assert_eq!(output.stdout, b"!");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("budget exhausted"), "stderr: {stderr}");
    assert!(stderr.contains("0x0004"), "stderr: {stderr}");
}

#[test]
fn breakpoint_reports_stop_address() {
    let temp_dir = tempfile::tempdir().unwrap();
    let machine = write_machine(temp_dir.path(), &SPIN_FIRMWARE);

    let output = Command::new(binary_path())
        .args([machine.to_str().unwrap(), "-b", "0x0002"])
        .output()
        .expect("failed to run zemu-run");

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("break after 7 cycles at pc 0x0002"), "stderr: {stderr}");
}

#[test]
fn invalid_description_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("broken.toml");
    fs::write(&path, "[[device]]\ntype = \"rom\"\nname = \"rom\"\n").unwrap();

    let output = Command::new(binary_path())
        .arg(&path)
        .output()
        .expect("failed to run zemu-run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error"));
}

#[test]
fn missing_arguments_print_usage() {
    let output = Command::new(binary_path())
        .output()
        .expect("failed to run zemu-run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage: zemu-run"));
}
