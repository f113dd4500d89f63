//! Framed stdio protocol between the kernel and its controller.
//!
//! Both directions carry newline-delimited JSON (NDJSON): exactly one
//! JSON object per `\n`-terminated line.
//!
//! - `codec`: newline framing with an inbound line-length limit and a
//!   per-line UTF-8 check.
//! - `message`: outbound [`Message`](message::Message) variants.
//! - `request`: inbound [`Request`](request::Request) decoding.
//! - `writer`: the [`FrameWriter`](writer::FrameWriter), sole writer of the
//!   outbound channel.

pub mod codec;
pub mod message;
pub mod request;
pub mod writer;

pub use codec::{Inbound, KernelCodec};
pub use message::{Channel, ImageFormat, Message};
pub use request::{parse_request, Request};
pub use writer::FrameWriter;
