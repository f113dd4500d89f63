//! Outbound wire messages (kernel → controller).
//!
//! | `type`         | Fields                          |
//! |----------------|---------------------------------|
//! | `status`       | `status`                        |
//! | `stdout`       | `content`                       |
//! | `stderr`       | `content`                       |
//! | `image`        | `format`, `content` (base64)    |
//! | `result`       | `output` (always `{}`)          |
//! | `error`        | `message`, optional `traceback` |
//! | `shutdown_ack` | *(none)*                        |

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Logical output channel of executed code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Primary output.
    Stdout,
    /// Diagnostic output.
    Stderr,
}

impl Channel {
    /// Wire name of the channel, identical to the message `type` it produces.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Encoding of an artifact payload.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
}

/// One outbound protocol message; serializes to exactly one NDJSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Lifecycle status (`ready`).
    Status {
        /// Status value.
        status: String,
    },
    /// Captured primary output: a full line including `\n`, or a trailing
    /// partial line on flush.
    Stdout {
        /// Captured text.
        content: String,
    },
    /// Captured diagnostic output, framed like [`Message::Stdout`].
    Stderr {
        /// Captured text.
        content: String,
    },
    /// Drained visual artifact.
    Image {
        /// Payload encoding.
        format: ImageFormat,
        /// Base64 of the encoded payload bytes.
        content: String,
    },
    /// Successful completion of an execute request.
    Result {
        /// Always empty; output was streamed beforehand.
        #[serde(default)]
        output: serde_json::Map<String, serde_json::Value>,
    },
    /// Protocol error or execution fault.
    Error {
        /// Short description.
        message: String,
        /// Full diagnostic trace; absent for protocol-level errors.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        traceback: Option<String>,
    },
    /// Acknowledges a shutdown command; always the last message.
    ShutdownAck,
}

impl Message {
    /// `{"type":"status","status":"ready"}`.
    #[must_use]
    pub fn ready() -> Self {
        Self::Status {
            status: "ready".into(),
        }
    }

    /// Captured output chunk on `channel`.
    #[must_use]
    pub fn output(channel: Channel, text: impl Into<String>) -> Self {
        let content = text.into();
        match channel {
            Channel::Stdout => Self::Stdout { content },
            Channel::Stderr => Self::Stderr { content },
        }
    }

    /// PNG artifact; `bytes` are base64-encoded for the wire.
    #[must_use]
    pub fn image_png(bytes: &[u8]) -> Self {
        Self::Image {
            format: ImageFormat::Png,
            content: BASE64.encode(bytes),
        }
    }

    /// Empty successful result.
    #[must_use]
    pub fn result() -> Self {
        Self::Result {
            output: serde_json::Map::new(),
        }
    }

    /// Error report with an optional trace.
    #[must_use]
    pub fn error(message: impl Into<String>, traceback: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            traceback,
        }
    }

    /// Shutdown acknowledgement.
    #[must_use]
    pub fn shutdown_ack() -> Self {
        Self::ShutdownAck
    }

    /// Whether this message ends an execute request.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }

    /// Wire `type` tag, used for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Stdout { .. } => "stdout",
            Self::Stderr { .. } => "stderr",
            Self::Image { .. } => "image",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
            Self::ShutdownAck => "shutdown_ack",
        }
    }
}
