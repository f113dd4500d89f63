//! Unit tests for inbound command decoding.

use kernel_runner::protocol::request::INVALID_JSON;
use kernel_runner::protocol::{parse_request, Request};
use kernel_runner::AppError;

fn rejection(line: &str) -> String {
    match parse_request(line) {
        Err(AppError::Protocol(reply)) => reply,
        other => panic!("expected a protocol rejection for {line:?}, got {other:?}"),
    }
}

#[test]
fn execute_command_is_decoded() {
    let request = parse_request(r#"{"type":"execute","code":"print(1)"}"#).expect("valid");
    assert_eq!(
        request,
        Some(Request::Execute {
            code: "print(1)".into()
        })
    );
}

/// A missing `code` field runs an empty payload.
#[test]
fn execute_without_code_defaults_to_empty() {
    let request = parse_request(r#"{"type":"execute"}"#).expect("valid");
    assert_eq!(request, Some(Request::Execute { code: String::new() }));
}

#[test]
fn shutdown_command_is_decoded() {
    let request = parse_request(r#"{"type":"shutdown"}"#).expect("valid");
    assert_eq!(request, Some(Request::Shutdown));
}

#[test]
fn blank_lines_are_ignored() {
    assert_eq!(parse_request("").expect("valid"), None);
    assert_eq!(parse_request("   \t").expect("valid"), None);
}

#[test]
fn non_json_line_is_rejected_with_fixed_reply() {
    assert_eq!(rejection("not-json"), INVALID_JSON);
    assert_eq!(INVALID_JSON, "Invalid JSON command received.");
}

#[test]
fn unknown_type_names_the_type() {
    assert_eq!(
        rejection(r#"{"type":"restart"}"#),
        "Unknown command type: restart"
    );
}

#[test]
fn missing_type_is_reported_as_none() {
    assert_eq!(rejection(r#"{"code":"x"}"#), "Unknown command type: None");
}

/// Valid JSON that is not an object is still an unknown command, not a crash.
#[test]
fn non_object_json_is_unknown_command() {
    assert_eq!(rejection("[1,2]"), "Unknown command type: None");
    assert_eq!(rejection("42"), "Unknown command type: None");
}

#[test]
fn non_string_type_is_rendered_as_json() {
    assert_eq!(rejection(r#"{"type":7}"#), "Unknown command type: 7");
}

#[test]
fn non_string_code_is_rejected() {
    assert_eq!(
        rejection(r#"{"type":"execute","code":5}"#),
        "Invalid execute command: code must be a string"
    );
}
