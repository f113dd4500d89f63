//! Framed channel writer.
//!
//! Serializes each [`Message`] to a single NDJSON line and writes it to the
//! outbound channel in one `write_all`, followed by an immediate flush so the
//! controller never waits on buffered output. Every message the kernel emits
//! goes through a single [`FrameWriter`]; nothing else writes to the channel.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::{trace, warn};

use super::codec::KernelCodec;
use super::message::Message;
use crate::{AppError, Result};

/// Internal state protected by a mutex.
struct WriterState {
    sink: Box<dyn Write + Send>,
    codec: KernelCodec,
    buf: BytesMut,
}

/// Sole writer of the outbound protocol channel.
///
/// Takes `&self` so the engine and both output captures can hold shared
/// references to the same writer during an execution.
pub struct FrameWriter {
    state: Mutex<WriterState>,
    broken: AtomicBool,
}

impl FrameWriter {
    /// Construct a writer over an arbitrary byte sink.
    #[must_use]
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            state: Mutex::new(WriterState {
                sink: Box::new(sink),
                // Encoding never consults the line limit.
                codec: KernelCodec::new(usize::MAX),
                buf: BytesMut::new(),
            }),
            broken: AtomicBool::new(false),
        }
    }

    /// Construct a writer over the process's standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Whether a previous write failed; the channel is then unusable.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Serialize `message` and write it as exactly one line.
    ///
    /// # Errors
    ///
    /// - [`AppError::Protocol`] if the message cannot be serialized; the
    ///   channel is left untouched.
    /// - [`AppError::Io`] if the channel is already broken, or the write or
    ///   flush fails (which marks it broken).
    pub fn send(&self, message: &Message) -> Result<()> {
        if self.is_broken() {
            return Err(AppError::Io("outbound channel closed".into()));
        }

        let mut guard = self
            .state
            .lock()
            .map_err(|_| AppError::Io("frame writer mutex poisoned".into()))?;
        let state = &mut *guard;

        state.buf.clear();
        state.codec.encode(message, &mut state.buf)?;

        let written = state
            .sink
            .write_all(&state.buf)
            .and_then(|()| state.sink.flush());
        if let Err(err) = written {
            self.broken.store(true, Ordering::Release);
            warn!(kind = message.kind(), error = %err, "frame writer: write failed");
            return Err(AppError::Io(format!("write failed: {err}")));
        }

        trace!(kind = message.kind(), bytes = state.buf.len(), "frame sent");
        Ok(())
    }
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter")
            .field("broken", &self.is_broken())
            .finish_non_exhaustive()
    }
}
