//! NDJSON codec for the kernel's stdio channels.
//!
//! Frames inbound bytes on `\n` with
//! [`tokio_util::codec::AnyDelimiterCodec`] and a configurable maximum line
//! length, so an unterminated or oversized command cannot exhaust memory.
//! UTF-8 is checked per line: a line that is not valid UTF-8 is surfaced as
//! [`Inbound::Undecodable`] and the stream carries on with the next line.
//!
//! # Usage
//!
//! Use [`KernelCodec`] with [`tokio_util::codec::FramedRead`] for the
//! inbound channel. The outbound direction encodes [`Message`] values into
//! a byte buffer that the [`FrameWriter`](super::FrameWriter) writes in a
//! single call.

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};

use super::message::Message;
use crate::{AppError, Result};

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A complete line, without its terminator.
    Line(String),
    /// A line exceeded the configured limit and is being discarded up to
    /// its terminating newline.
    Oversized,
    /// A complete line that is not valid UTF-8; it has been discarded.
    Undecodable,
}

/// NDJSON codec for the kernel's inbound and outbound streams.
///
/// Oversized and non-UTF-8 inbound lines are surfaced as [`Inbound`]
/// variants rather than as decode errors: the framing resynchronizes at the
/// next newline, and keeping the error out of the stream keeps
/// [`FramedRead`](tokio_util::codec::FramedRead) from ending on it.
#[derive(Debug)]
pub struct KernelCodec {
    lines: AnyDelimiterCodec,
    max_line_bytes: usize,
}

impl KernelCodec {
    /// Create a codec that rejects inbound lines longer than `max_line_bytes`.
    #[must_use]
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            lines: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_line_bytes),
            max_line_bytes,
        }
    }

    /// Configured inbound line limit.
    #[must_use]
    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }
}

impl Decoder for KernelCodec {
    type Item = Inbound;
    type Error = AppError;

    /// Decode the next newline-terminated line from `src`.
    ///
    /// Returns `Ok(None)` while `src` holds no complete line.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        map_decoded(self.lines.decode(src))
    }

    /// Decode the final, possibly unterminated, line at EOF.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        map_decoded(self.lines.decode_eof(src))
    }
}

impl Encoder<&Message> for KernelCodec {
    type Error = AppError;

    /// Encode `item` as compact JSON followed by `\n`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if serialization fails.
    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<()> {
        let json = serde_json::to_vec(item)?;
        // The line limit applies to decoding only.
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn map_decoded(
    decoded: std::result::Result<Option<Bytes>, AnyDelimiterCodecError>,
) -> Result<Option<Inbound>> {
    match decoded {
        Ok(Some(line)) => Ok(Some(to_inbound(&line))),
        Ok(None) => Ok(None),
        Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => Ok(Some(Inbound::Oversized)),
        Err(AnyDelimiterCodecError::Io(err)) => Err(err.into()),
    }
}

fn to_inbound(line: &[u8]) -> Inbound {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    std::str::from_utf8(line).map_or(Inbound::Undecodable, |text| Inbound::Line(text.to_owned()))
}
