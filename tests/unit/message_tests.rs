//! Unit tests for outbound message serialization.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::json;

use kernel_runner::protocol::{Channel, ImageFormat, Message};

fn wire(message: &Message) -> serde_json::Value {
    serde_json::to_value(message).expect("message must serialize")
}

#[test]
fn wire_shapes_match_protocol() {
    assert_eq!(wire(&Message::ready()), json!({"type":"status","status":"ready"}));
    assert_eq!(
        wire(&Message::output(Channel::Stdout, "a\n")),
        json!({"type":"stdout","content":"a\n"})
    );
    assert_eq!(
        wire(&Message::output(Channel::Stderr, "warn")),
        json!({"type":"stderr","content":"warn"})
    );
    assert_eq!(wire(&Message::result()), json!({"type":"result","output":{}}));
    assert_eq!(
        wire(&Message::error("boom", Some("trace".into()))),
        json!({"type":"error","message":"boom","traceback":"trace"})
    );
    assert_eq!(wire(&Message::shutdown_ack()), json!({"type":"shutdown_ack"}));
}

/// Image payloads carry standard base64 of the raw bytes.
#[test]
fn image_content_is_standard_base64() {
    let bytes = [0x89, b'P', b'N', b'G', 0xff, 0x00];
    let message = Message::image_png(&bytes);

    let Message::Image { format, content } = &message else {
        panic!("expected an image message");
    };
    assert_eq!(*format, ImageFormat::Png);
    assert_eq!(STANDARD.decode(content).expect("valid base64"), bytes);
    assert_eq!(wire(&message)["format"], "png");
}

/// Decoding a serialized message reproduces it exactly.
#[test]
fn every_variant_survives_serialization() {
    let messages = [
        Message::ready(),
        Message::output(Channel::Stdout, "line\n"),
        Message::output(Channel::Stderr, "partial"),
        Message::image_png(b"png-bytes"),
        Message::result(),
        Message::error("Invalid JSON command received.", None),
        Message::error("division by zero", Some("Traceback ...".into())),
        Message::shutdown_ack(),
    ];

    for message in messages {
        let line = serde_json::to_string(&message).expect("serialize");
        let decoded: Message = serde_json::from_str(&line).expect("deserialize");
        assert_eq!(decoded, message, "round trip must be lossless for {line}");
    }
}

#[test]
fn only_result_and_error_are_terminal() {
    assert!(Message::result().is_terminal());
    assert!(Message::error("x", None).is_terminal());
    assert!(!Message::ready().is_terminal());
    assert!(!Message::image_png(b"x").is_terminal());
    assert!(!Message::shutdown_ack().is_terminal());
}
