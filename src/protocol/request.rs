//! Inbound command decoding (controller → kernel).
//!
//! | `type`     | Maps to                                   |
//! |------------|-------------------------------------------|
//! | `execute`  | [`Request::Execute`] (`code`, default `""`) |
//! | `shutdown` | [`Request::Shutdown`]                     |
//! | *(other)*  | `Unknown command type: …` error           |

use serde_json::Value;

use crate::{AppError, Result};

/// Reply text for a line that is not JSON at all.
pub const INVALID_JSON: &str = "Invalid JSON command received.";

/// A decoded inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Run `code` against the persistent environment.
    Execute {
        /// Opaque payload text.
        code: String,
    },
    /// Acknowledge and stop the kernel.
    Shutdown,
}

/// Decode a single inbound line.
///
/// # Return value
///
/// - `Ok(Some(request))`: the line is a recognized command.
/// - `Ok(None)`: the line is empty or whitespace and is ignored.
/// - `Err(AppError::Protocol(reply))`: the line is rejected; `reply` is the
///   exact message to report to the controller.
///
/// # Errors
///
/// - [`AppError::Protocol`]`("Invalid JSON command received.")` when the line
///   is not valid JSON.
/// - [`AppError::Protocol`]`("Unknown command type: …")` when it is JSON but
///   not a recognized command shape.
pub fn parse_request(line: &str) -> Result<Option<Request>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_str(line).map_err(|_| AppError::Protocol(INVALID_JSON.into()))?;

    match value.get("type") {
        Some(Value::String(kind)) if kind == "execute" => parse_execute(&value).map(Some),
        Some(Value::String(kind)) if kind == "shutdown" => Ok(Some(Request::Shutdown)),
        Some(Value::String(other)) => Err(unknown_type(other)),
        Some(other) => Err(unknown_type(&other.to_string())),
        None => Err(unknown_type("None")),
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn parse_execute(value: &Value) -> Result<Request> {
    match value.get("code") {
        None | Some(Value::Null) => Ok(Request::Execute {
            code: String::new(),
        }),
        Some(Value::String(code)) => Ok(Request::Execute { code: code.clone() }),
        Some(_) => Err(AppError::Protocol(
            "Invalid execute command: code must be a string".into(),
        )),
    }
}

fn unknown_type(kind: &str) -> AppError {
    AppError::Protocol(format!("Unknown command type: {kind}"))
}
