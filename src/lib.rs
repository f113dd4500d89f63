#![forbid(unsafe_code)]

//! Long-lived execution kernel speaking framed NDJSON over stdio.
//!
//! The controller writes `execute` and `shutdown` commands to the kernel's
//! stdin, one JSON object per line. The kernel runs each payload against a
//! persistent environment and answers on stdout with `stdout`/`stderr`
//! chunks, rendered `image` artifacts, and a terminal `result` or `error`.
//! Diagnostics go to stderr only.

pub mod artifacts;
pub mod capture;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod errors;
pub mod kernel;
pub mod protocol;
pub mod script;

pub use config::KernelConfig;
pub use errors::{AppError, Result};
