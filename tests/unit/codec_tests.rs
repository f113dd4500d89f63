//! Unit tests for the inbound line codec and outbound frame encoding.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use kernel_runner::protocol::{Inbound, KernelCodec, Message};

/// A complete line is yielded without its terminator.
#[test]
fn complete_line_is_decoded() {
    let mut codec = KernelCodec::new(1024);
    let mut buf = BytesMut::from("{\"type\":\"shutdown\"}\n");

    let item = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(
        item,
        Some(Inbound::Line("{\"type\":\"shutdown\"}".to_owned())),
        "codec must strip the trailing newline"
    );
}

/// A CRLF terminator is tolerated.
#[test]
fn carriage_return_is_stripped() {
    let mut codec = KernelCodec::new(1024);
    let mut buf = BytesMut::from("{}\r\n");

    let item = codec.decode(&mut buf).expect("decode must succeed");

    assert_eq!(item, Some(Inbound::Line("{}".to_owned())));
}

/// Bytes without a newline stay buffered until the newline arrives.
#[test]
fn partial_line_waits_for_newline() {
    let mut codec = KernelCodec::new(1024);
    let mut buf = BytesMut::from("{\"type\":");

    let first = codec.decode(&mut buf).expect("decode must succeed");
    assert!(first.is_none(), "no line must be yielded before the newline");

    buf.extend_from_slice(b"\"shutdown\"}\n");
    let second = codec.decode(&mut buf).expect("decode must succeed");
    assert_eq!(
        second,
        Some(Inbound::Line("{\"type\":\"shutdown\"}".to_owned()))
    );
}

/// An over-long line is reported once and the codec resumes at the next line.
#[test]
fn oversized_line_is_reported_then_skipped() {
    let mut codec = KernelCodec::new(8);
    let mut buf = BytesMut::from("0123456789abc\n{}\n");

    let first = codec.decode(&mut buf).expect("oversize is not a stream error");
    assert_eq!(first, Some(Inbound::Oversized));

    let second = codec.decode(&mut buf).expect("decode must succeed");
    assert_eq!(
        second,
        Some(Inbound::Line("{}".to_owned())),
        "the line after the oversized one must decode normally"
    );
    assert_eq!(codec.max_line_bytes(), 8);
}

/// A final unterminated line is still delivered at end of input.
#[test]
fn unterminated_last_line_is_delivered_at_eof() {
    let mut codec = KernelCodec::new(1024);
    let mut buf = BytesMut::from("{\"type\":\"shutdown\"}");

    let item = codec.decode_eof(&mut buf).expect("decode_eof must succeed");

    assert_eq!(
        item,
        Some(Inbound::Line("{\"type\":\"shutdown\"}".to_owned()))
    );
}

/// Encoding produces exactly one compact JSON line.
#[test]
fn message_encodes_as_single_line() {
    let mut codec = KernelCodec::new(1024);
    let mut buf = BytesMut::new();

    codec
        .encode(&Message::output(kernel_runner::protocol::Channel::Stdout, "a\nb\n"), &mut buf)
        .expect("encode must succeed");

    let text = String::from_utf8(buf.to_vec()).expect("utf-8");
    assert_eq!(text, "{\"type\":\"stdout\",\"content\":\"a\\nb\\n\"}\n");
    assert_eq!(text.matches('\n').count(), 1, "embedded newlines are escaped");
}

/// A line that is not UTF-8 is consumed and reported, not treated as a
/// stream error.
#[test]
fn invalid_utf8_line_is_undecodable_then_skipped() {
    let mut codec = KernelCodec::new(1024);
    let mut buf = BytesMut::from(&b"\xff\xfe\n{}\n"[..]);

    let first = codec.decode(&mut buf).expect("bad bytes are not a stream error");
    assert_eq!(first, Some(Inbound::Undecodable));

    let second = codec.decode(&mut buf).expect("decode must succeed");
    assert_eq!(second, Some(Inbound::Line("{}".to_owned())));
}
