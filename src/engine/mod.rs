//! Execution engine: runs payloads against the persistent environment.
//!
//! The [`Evaluator`] trait decouples the engine's ordering contract
//! (activate captures → evaluate → deactivate → drain → emit) from how a
//! payload is actually interpreted. The engine never lets a fault escape:
//! every run ends in exactly one `result` or `error` message.

pub mod convert;
pub mod environment;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, info_span, warn};

use crate::artifacts::{self, ArtifactRegistry};
use crate::capture::OutputCapture;
use crate::config::ArtifactConfig;
use crate::protocol::{Channel, FrameWriter, Message};

pub use convert::TableHandle;
pub use environment::{Environment, Table, Value};

/// A fault raised while evaluating a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Short description, reported as the error `message`.
    pub message: String,
    /// Full diagnostic trace, reported as the error `traceback`.
    pub trace: String,
}

impl Fault {
    /// Build a fault from its description and trace.
    #[must_use]
    pub fn new(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: trace.into(),
        }
    }

    /// Convert a caught panic payload into a fault.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_owned());
        let message = format!("evaluator panicked: {detail}");
        let trace = format!("Traceback (most recent call last):\n  <evaluator>\nPanic: {detail}\n");
        Self::new(message, trace)
    }

    /// The `error` message reporting this fault.
    #[must_use]
    pub fn into_message(self) -> Message {
        Message::error(self.message, Some(self.trace))
    }
}

/// Everything a payload may touch while it runs.
///
/// Output sinks are passed explicitly; executed code never sees the
/// process's real stdout.
#[derive(Debug)]
pub struct ExecContext<'a> {
    /// Primary output sink.
    pub stdout: OutputCapture<'a>,
    /// Diagnostic output sink.
    pub stderr: OutputCapture<'a>,
    /// Persistent bindings.
    pub env: &'a mut Environment,
    /// Figures registered by this and earlier runs.
    pub artifacts: &'a mut ArtifactRegistry,
}

impl<'a> ExecContext<'a> {
    /// The capture bound to `channel`.
    pub fn output(&mut self, channel: Channel) -> &mut OutputCapture<'a> {
        match channel {
            Channel::Stdout => &mut self.stdout,
            Channel::Stderr => &mut self.stderr,
        }
    }
}

/// Pluggable payload interpreter.
pub trait Evaluator {
    /// Evaluate `code` in place against `cx.env`.
    ///
    /// Bindings created persist for later calls. Effects of statements that
    /// ran before a fault are kept.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] describing the first failure.
    fn evaluate(&mut self, code: &str, cx: &mut ExecContext<'_>) -> Result<(), Fault>;
}

/// Owns the environment, the artifact registry and the evaluator.
#[derive(Debug)]
pub struct ExecutionEngine<E> {
    evaluator: E,
    env: Environment,
    artifacts: ArtifactRegistry,
    artifact_size: ArtifactConfig,
    runs: u64,
}

impl<E: Evaluator> ExecutionEngine<E> {
    /// Create an engine with an empty environment.
    #[must_use]
    pub fn new(evaluator: E, artifact_size: ArtifactConfig) -> Self {
        Self {
            evaluator,
            env: Environment::new(),
            artifacts: ArtifactRegistry::new(),
            artifact_size,
            runs: 0,
        }
    }

    /// Shared environment.
    #[must_use]
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Shared environment, mutably (used by the preloader).
    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Pending artifacts.
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.artifacts
    }

    /// Number of completed runs.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Run one payload, emitting its messages through `writer`.
    ///
    /// Emits `stdout`/`stderr` chunks in write order, then either one
    /// `image` per drained artifact followed by `result`, or a single
    /// `error`. Returns the terminal message that was emitted. Never fails:
    /// a terminal message that cannot be sent is logged on the diagnostic
    /// channel instead.
    pub fn run(&mut self, code: &str, writer: &FrameWriter) -> Message {
        self.runs += 1;
        let span = info_span!("execute", run = self.runs, code_bytes = code.len());
        let _guard = span.enter();

        let mut cx = ExecContext {
            stdout: OutputCapture::activate(Channel::Stdout, writer),
            stderr: OutputCapture::activate(Channel::Stderr, writer),
            env: &mut self.env,
            artifacts: &mut self.artifacts,
        };
        let evaluator = &mut self.evaluator;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(code, &mut cx)))
            .unwrap_or_else(|payload| Err(Fault::from_panic(payload.as_ref())));

        // Deactivation precedes any terminal message, on both paths.
        let ExecContext { stdout, stderr, .. } = cx;
        let chunks = stdout.deactivate() + stderr.deactivate();

        let terminal = match outcome {
            Ok(()) => {
                let drained = artifacts::drain(&mut self.artifacts, self.artifact_size);
                for (_, bytes) in &drained {
                    if let Err(err) = writer.send(&Message::image_png(bytes)) {
                        warn!(%err, "engine: failed to send image");
                    }
                }
                debug!(chunks, images = drained.len(), "execution completed");
                Message::result()
            }
            Err(fault) => {
                let discarded = self.artifacts.discard_all();
                debug!(
                    chunks,
                    discarded,
                    message = fault.message.as_str(),
                    "execution faulted"
                );
                fault.into_message()
            }
        };

        if let Err(err) = writer.send(&terminal) {
            error!(
                %err,
                kind = terminal.kind(),
                "engine: failed to send terminal message"
            );
        }
        terminal
    }
}
