//! Error types shared across the kernel.

use std::fmt::{Display, Formatter};

/// Shared kernel result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Kernel error enumeration covering every non-execution failure mode.
///
/// Faults raised by executed payloads are not represented here;
/// they travel as [`Fault`](crate::engine::Fault) values and never leave the
/// execution engine unconverted.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Inbound line could not be decoded into a request.
    ///
    /// The payload is the exact text reported to the controller.
    Protocol(String),
    /// Read or write failure on one of the stdio channels.
    Io(String),
    /// Dataset preload failure.
    Dataset(String),
    /// Artifact rendering or encoding failure.
    Artifact(String),
    /// Host-side access to the script environment failed.
    Script(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Dataset(msg) => write!(f, "dataset: {msg}"),
            Self::Artifact(msg) => write!(f, "artifact: {msg}"),
            Self::Script(msg) => write!(f, "script: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        Self::Dataset(err.to_string())
    }
}

impl From<mlua::Error> for AppError {
    fn from(err: mlua::Error) -> Self {
        Self::Script(err.to_string())
    }
}
