#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use tcpbus_endpoint::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
server:
  listen: "0.0.0.0:12354"
connection:
  max_frame_byte: 4096 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.server.listen, "0.0.0.0:12354");
    assert_eq!(cfg.client.host, "127.0.0.1");
    assert_eq!(cfg.client.port, 12354);
    assert_eq!(cfg.connection.max_frame_bytes, 1024 * 1024);
    assert!(cfg.connection.read_idle_timeout().is_none());
    assert!(cfg.connection.write_timeout().is_none());
    assert!(cfg.connection.emit_disconnect);
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
server:
  listen: "127.0.0.1:9000"
client:
  host: "bus.internal"
  port: 9000
connection:
  max_frame_bytes: 65536
  read_idle_timeout_ms: 30000
  write_timeout_ms: 500
  emit_disconnect: false
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.client.host, "bus.internal");
    assert_eq!(cfg.connection.max_frame_bytes, 65536);
    assert_eq!(cfg.connection.read_idle_timeout().unwrap().as_millis(), 30000);
    assert_eq!(cfg.connection.write_timeout().unwrap().as_millis(), 500);
    assert!(!cfg.connection.emit_disconnect);
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn listen_must_be_socket_addr() {
    let bad = "version: 1\nserver:\n  listen: \"localhost\"\n";
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn limits_are_range_checked() {
    for bad in [
        "version: 1\nconnection:\n  max_frame_bytes: 10\n",
        "version: 1\nconnection:\n  read_idle_timeout_ms: 5\n",
        "version: 1\nconnection:\n  write_timeout_ms: 99999999\n",
        "version: 1\nclient:\n  port: 0\n",
        "version: 1\nclient:\n  host: \"  \"\n",
    ] {
        let err = config::load_from_str(bad).expect_err(bad);
        assert_eq!(err.code().as_str(), "CONFIG", "{bad}");
    }
}

#[test]
fn missing_file_is_config_error() {
    let err = config::load_from_file("/nonexistent/tcpbus.yaml").expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}
