//! Line-buffered output capture for executed code.
//!
//! An [`OutputCapture`] is the write sink executed code sees for one logical
//! channel. Complete lines are forwarded as soon as they are written, each as
//! its own `stdout`/`stderr` message; a trailing partial line stays buffered
//! until [`OutputCapture::flush`] or [`OutputCapture::deactivate`].

use std::fmt;

use tracing::warn;

use crate::protocol::{Channel, FrameWriter, Message};

/// Write sink bound to one channel for the span of a single execution.
#[derive(Debug)]
pub struct OutputCapture<'w> {
    channel: Channel,
    buffer: String,
    writer: &'w FrameWriter,
    forwarded: usize,
}

impl<'w> OutputCapture<'w> {
    /// Start capturing `channel`, forwarding through `writer`.
    #[must_use]
    pub fn activate(channel: Channel, writer: &'w FrameWriter) -> Self {
        Self {
            channel,
            buffer: String::new(),
            writer,
            forwarded: 0,
        }
    }

    /// Channel this capture is bound to.
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Text written since the last forwarded newline.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Number of chunks forwarded so far.
    #[must_use]
    pub fn forwarded(&self) -> usize {
        self.forwarded
    }

    /// Append `text`, forwarding every complete `"<line>\n"` it closes.
    pub fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.forward(line);
        }
    }

    /// Forward a non-empty partial line without waiting for its newline.
    pub fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.forward(rest);
        }
    }

    /// Flush and release the capture, returning the chunk count.
    pub fn deactivate(mut self) -> usize {
        self.flush();
        self.forwarded
    }

    fn forward(&mut self, content: String) {
        match self.writer.send(&Message::output(self.channel, content)) {
            Ok(()) => self.forwarded += 1,
            // Output is best-effort; the dispatcher notices a broken channel.
            Err(err) => warn!(
                channel = self.channel.as_str(),
                %err,
                "output capture: failed to forward chunk"
            ),
        }
    }
}

impl fmt::Write for OutputCapture<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}
