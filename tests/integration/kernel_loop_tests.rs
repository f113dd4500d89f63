//! Integration tests for the protocol loop, driven over in-memory streams.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::json;
use tokio::io::{AsyncRead, ReadBuf};

use kernel_runner::kernel::{ExitReason, Kernel, KernelState};
use kernel_runner::protocol::FrameWriter;
use kernel_runner::script::LuaEvaluator;
use kernel_runner::KernelConfig;

use super::test_helpers::{execute_line, recording_writer, serve_script, ClosedSink};

/// Inbound stream whose every read fails.
struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "read failed")))
    }
}

/// With no input the kernel announces readiness and stops silently.
#[tokio::test]
async fn end_of_input_stops_after_ready() {
    let (reason, messages) = serve_script(KernelConfig::default(), None, "").await;

    assert_eq!(reason, ExitReason::EndOfInput);
    assert_eq!(messages, vec![json!({"type":"status","status":"ready"})]);
}

/// `not-json` is answered with an error and the kernel keeps serving.
#[tokio::test]
async fn invalid_json_is_reported_and_loop_continues() {
    let input = format!("not-json\n{}", execute_line("print(1)"));

    let (reason, messages) = serve_script(KernelConfig::default(), None, &input).await;

    assert_eq!(reason, ExitReason::EndOfInput);
    assert_eq!(
        messages,
        vec![
            json!({"type":"status","status":"ready"}),
            json!({"type":"error","message":"Invalid JSON command received."}),
            json!({"type":"stdout","content":"1\n"}),
            json!({"type":"result","output":{}}),
        ]
    );
}

#[tokio::test]
async fn unknown_command_type_is_reported() {
    let input = "{\"type\":\"ping\"}\n{\"code\":\"x\"}\n";

    let (_, messages) = serve_script(KernelConfig::default(), None, input).await;

    assert_eq!(
        &messages[1..],
        &[
            json!({"type":"error","message":"Unknown command type: ping"}),
            json!({"type":"error","message":"Unknown command type: None"}),
        ]
    );
}

/// Nothing is written after the shutdown acknowledgement, even if more
/// commands are queued.
#[tokio::test]
async fn shutdown_ack_is_the_last_message() {
    let input = format!("{{\"type\":\"shutdown\"}}\n{}", execute_line("print(1)"));

    let (reason, messages) = serve_script(KernelConfig::default(), None, &input).await;

    assert_eq!(reason, ExitReason::Shutdown);
    assert_eq!(
        messages,
        vec![
            json!({"type":"status","status":"ready"}),
            json!({"type":"shutdown_ack"}),
        ]
    );
}

/// Output printed before a fault arrives first; no result follows.
#[tokio::test]
async fn print_then_error_yields_output_then_error() {
    let input = execute_line("print(\"a\")\nerror(\"bad input\")");

    let (_, messages) = serve_script(KernelConfig::default(), None, &input).await;

    assert_eq!(messages.len(), 3, "ready, stdout, error: {messages:?}");
    assert_eq!(messages[1], json!({"type":"stdout","content":"a\n"}));
    assert_eq!(messages[2]["type"], "error");
    assert!(messages[2]["message"]
        .as_str()
        .is_some_and(|m| m.ends_with(":2: bad input")));
    assert!(messages[2]["traceback"]
        .as_str()
        .is_some_and(|t| t.contains("bad input")));
}

#[tokio::test]
async fn one_artifact_yields_image_then_result() {
    let input = execute_line("plot({1, 4, 9})");

    let (_, messages) = serve_script(KernelConfig::default(), None, &input).await;

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1]["type"], "image");
    assert_eq!(messages[1]["format"], "png");
    assert_eq!(messages[2], json!({"type":"result","output":{}}));
}

/// A binding created by one request is visible to the next.
#[tokio::test]
async fn bindings_persist_across_requests() {
    let input = format!(
        "{}\n\n{}",
        execute_line("counter = 41"),
        execute_line("print(counter + 1)")
    );

    let (_, messages) = serve_script(KernelConfig::default(), None, &input).await;

    assert_eq!(
        &messages[1..],
        &[
            json!({"type":"result","output":{}}),
            json!({"type":"stdout","content":"42\n"}),
            json!({"type":"result","output":{}}),
        ]
    );
}

/// An over-long command is rejected without desynchronizing the stream.
#[tokio::test]
async fn oversized_line_is_rejected_and_skipped() {
    let config = KernelConfig {
        max_line_bytes: 64,
        ..KernelConfig::default()
    };
    let long = execute_line(&format!("print(\"{}\")", "x".repeat(100)));
    let input = format!("{long}{}", execute_line("print(2)"));

    let (reason, messages) = serve_script(config, None, &input).await;

    assert_eq!(reason, ExitReason::EndOfInput);
    assert_eq!(
        &messages[1..],
        &[
            json!({"type":"error","message":"Command line too long: exceeded 64 bytes"}),
            json!({"type":"stdout","content":"2\n"}),
            json!({"type":"result","output":{}}),
        ]
    );
}

/// A line that is not UTF-8 is rejected like any malformed command.
#[tokio::test]
async fn invalid_utf8_line_is_reported_and_loop_continues() {
    let (writer, sink) = recording_writer();
    let mut kernel = Kernel::new(LuaEvaluator::new(), writer, KernelConfig::default());
    let mut input = b"\xff\xfe\n".to_vec();
    input.extend_from_slice(execute_line("print(1)").as_bytes());

    let reason = kernel.serve(input.as_slice()).await;

    assert_eq!(reason, ExitReason::EndOfInput);
    assert_eq!(
        sink.messages(),
        vec![
            json!({"type":"status","status":"ready"}),
            json!({"type":"error","message":"Invalid JSON command received."}),
            json!({"type":"stdout","content":"1\n"}),
            json!({"type":"result","output":{}}),
        ]
    );
}

/// Deeply nested payloads fault through the normal error path and the
/// kernel keeps serving.
#[tokio::test]
async fn deeply_nested_payload_faults_without_stopping() {
    let nested = format!("x = {}1{}", "{".repeat(20_000), "}".repeat(20_000));
    let unary = format!("y = {}1", "- ".repeat(300_000));
    let input = format!(
        "{}{}{}",
        execute_line(&nested),
        execute_line(&unary),
        execute_line("print(2)")
    );

    let (reason, messages) = serve_script(KernelConfig::default(), None, &input).await;

    assert_eq!(reason, ExitReason::EndOfInput);
    assert_eq!(messages.len(), 5, "ready, two errors, stdout, result: {messages:?}");
    assert_eq!(messages[1]["type"], "error");
    assert_eq!(messages[2]["type"], "error");
    assert_eq!(messages[3], json!({"type":"stdout","content":"2\n"}));
    assert_eq!(messages[4], json!({"type":"result","output":{}}));
}

/// A failing inbound stream is a loop fault: reported, then the loop stops.
#[tokio::test]
async fn inbound_read_failure_is_a_loop_fault() {
    let (writer, sink) = recording_writer();
    let mut kernel = Kernel::new(LuaEvaluator::new(), writer, KernelConfig::default());

    let reason = kernel.serve(BrokenReader).await;

    assert_eq!(reason, ExitReason::LoopFault);
    assert!(!reason.is_clean());
    assert_eq!(kernel.state(), KernelState::Stopped);
    assert_eq!(
        sink.messages()[1],
        json!({"type":"error","message":"Kernel loop error: io: read failed"})
    );
}

/// A closed outbound channel stops the kernel instead of looping.
#[tokio::test]
async fn closed_outbound_channel_stops_kernel() {
    let mut kernel = Kernel::new(
        LuaEvaluator::new(),
        FrameWriter::new(ClosedSink),
        KernelConfig::default(),
    );
    let input = execute_line("print(1)");

    let reason = kernel.serve(input.as_bytes()).await;

    assert_eq!(reason, ExitReason::OutboundClosed);
    assert_eq!(kernel.state(), KernelState::Stopped);
}

/// Lines can be handled one at a time without the async loop.
#[test]
fn handle_line_tracks_state() {
    let (writer, sink) = recording_writer();
    let mut kernel = Kernel::new(LuaEvaluator::new(), writer, KernelConfig::default());
    assert_eq!(kernel.state(), KernelState::Starting);

    assert!(!kernel.start(None));
    assert_eq!(kernel.state(), KernelState::Ready);

    assert_eq!(kernel.handle_line(&execute_line("x = 1")), None);
    assert_eq!(kernel.handle_line("   "), None);
    assert_eq!(kernel.engine().runs(), 1);
    assert_eq!(
        kernel.handle_line("{\"type\":\"shutdown\"}"),
        Some(ExitReason::Shutdown)
    );
    assert_eq!(
        sink.messages(),
        vec![
            json!({"type":"result","output":{}}),
            json!({"type":"shutdown_ack"}),
        ]
    );
}
