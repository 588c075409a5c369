use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use qlp_core::{ControlCommand, Rgb, encode_control};
use serde_json::Value;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("qlp"))
}

fn inspect(hex: &str) -> Value {
    let assert = cmd()
        .arg("frame")
        .arg("inspect")
        .arg(hex)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    serde_json::from_str(&stdout).expect("valid json")
}

#[test]
fn help_lists_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            contains("device")
                .and(contains("discover"))
                .and(contains("send"))
                .and(contains("frame")),
        );
    cmd()
        .arg("send")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("fill").and(contains("reboot")));
}

#[test]
fn long_version_includes_commit() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("qlp").and(contains("commit")));
}

#[test]
fn long_version_names_commit_and_date() {
    let assert = cmd().arg("--version").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let details = stdout
        .trim()
        .split_once(" (commit ")
        .and_then(|(_, rest)| rest.strip_suffix(')'))
        .expect("commit details in parentheses");
    let (commit, date) = details.split_once(", ").expect("commit and date");
    assert!(!commit.is_empty());
    assert!(!date.is_empty());
}

#[test]
fn frame_encode_prints_hex() {
    cmd()
        .arg("frame")
        .arg("encode")
        .arg("discovery")
        .arg("414248")
        .assert()
        .success()
        .stdout("514c50010141424873\n");
}

#[test]
fn frame_encode_without_payload() {
    cmd()
        .arg("frame")
        .arg("encode")
        .arg("broadcast")
        .assert()
        .success()
        .stdout("514c5001023b\n");
}

#[test]
fn inspect_valid_discovery_frame() {
    let report = inspect("51 4c 50 01 01 41 42 48 73");
    assert_eq!(report["valid"], true);
    assert_eq!(report["length"], 9);
    assert_eq!(report["packet_type"], "DISCOVERY");
    assert_eq!(report["payload_hex"], "414248");
    assert!(report.get("rejection").is_none());
}

#[test]
fn inspect_short_frame_reports_length_error() {
    let report = inspect("514c50");
    assert_eq!(report["valid"], false);
    assert_eq!(report["rejection"]["reply_type"], "NONE");
    assert_eq!(report["rejection"]["code"], "LENGTH_ERROR");
    assert_eq!(report["rejection"]["code_value"], 4);
}

#[test]
fn inspect_decodes_control_command() {
    let frame = encode_control(
        0x2A,
        &ControlCommand::Fill {
            color: Rgb::new(0xFF, 0x80, 0x00),
        },
    );
    let report = inspect(&hex::encode(frame));
    assert_eq!(report["valid"], true);
    assert_eq!(report["packet_type"], "CONTROL");
    assert_eq!(report["control"]["device_id"], "0000002A");
    assert_eq!(report["control"]["command_id"], 0x54);
    assert_eq!(report["control"]["command"]["command"], "fill");
    assert_eq!(report["control"]["command"]["color"]["g"], 0x80);
}

#[test]
fn inspect_flags_wrong_command_length() {
    let frame = qlp_core::encode_raw_control(0x2A, 0x54, &[1, 2]);
    let report = inspect(&hex::encode(frame));
    assert_eq!(report["valid"], true);
    assert!(report["control"]["command"].is_null());
    assert!(report["control"]["error"].is_string());
}

#[test]
fn inspect_recognises_device_answer() {
    let report = inspect("514c50010300aa");
    assert_eq!(report["valid"], false);
    assert_eq!(report["rejection"]["code"], "CRC_ERROR");
    assert_eq!(report["rejection"]["reply_type"], "CONTROL");
    assert_eq!(report["common_answer"]["packet_type"], "CONTROL");
    assert_eq!(report["common_answer"]["code"], "OK");
}

#[test]
fn invalid_hex_shows_error_and_hint() {
    cmd()
        .arg("frame")
        .arg("inspect")
        .arg("zz")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn missing_config_file_shows_error_and_hint() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("missing.toml");

    cmd()
        .arg("device")
        .arg("run")
        .arg("--config")
        .arg(missing)
        .assert()
        .failure()
        .code(2)
        .stderr(contains("config file not found").and(contains("hint:")));
}

#[test]
fn malformed_config_file_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[device]\nunknown_key = 1\n").expect("write config");

    cmd()
        .arg("device")
        .arg("run")
        .arg("--config")
        .arg(path)
        .assert()
        .failure()
        .code(2)
        .stderr(contains("error:").and(contains("config.toml")));
}

#[test]
fn invalid_name_in_config_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[device]\nname = \"\"\n").expect("write config");

    cmd()
        .arg("device")
        .arg("run")
        .arg("--config")
        .arg(path)
        .assert()
        .failure()
        .code(2)
        .stderr(contains("device.name"));
}

#[test]
fn bad_device_id_flag_is_rejected() {
    cmd()
        .arg("device")
        .arg("run")
        .arg("--device-id")
        .arg("not-hex")
        .assert()
        .failure()
        .stderr(contains("invalid device id"));
}

#[test]
fn bad_color_is_rejected() {
    cmd()
        .arg("send")
        .arg("--device")
        .arg("2A")
        .arg("fill")
        .arg("red")
        .assert()
        .failure()
        .stderr(contains("RRGGBB"));
}

#[cfg(unix)]
#[test]
fn device_run_exits_cleanly_on_sigterm() {
    use std::net::UdpSocket;
    use std::process::{Command as StdCommand, Stdio};
    use std::time::{Duration, Instant};

    let port = UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| socket.local_addr())
        .expect("free port")
        .port();
    let mut child = StdCommand::new(assert_cmd::cargo::cargo_bin!("qlp"))
        .args(["device", "run", "--device-id", "2A", "--port"])
        .arg(port.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn device");

    // The handler is installed before the socket is bound.
    let deadline = Instant::now() + Duration::from_secs(10);
    while UdpSocket::bind(("0.0.0.0", port)).is_ok() {
        assert!(Instant::now() < deadline, "device never bound its port");
        std::thread::sleep(Duration::from_millis(20));
    }

    let killed = StdCommand::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .expect("run kill");
    assert!(killed.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().expect("wait device") {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("device ignored SIGTERM");
        }
        std::thread::sleep(Duration::from_millis(20));
    };
    assert_eq!(status.code(), Some(0));
}
