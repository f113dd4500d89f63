//! Command dispatcher and protocol loop.
//!
//! Drives the kernel lifecycle:
//!
//! ```text
//! Starting ──preload──▶ Ready ──ready──▶ Idle ⇄ Executing
//!                                          │
//!                      shutdown / EOF / fault ──▶ Stopped
//! ```
//!
//! Inbound lines are read through a [`FramedRead`] backed by
//! [`KernelCodec`]. Each line is handled to completion, including the whole
//! execution of an `execute` request, before the next one is read.

use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

use crate::dataset;
use crate::engine::{Evaluator, ExecutionEngine};
use crate::protocol::request::INVALID_JSON;
use crate::protocol::{parse_request, FrameWriter, Inbound, KernelCodec, Message, Request};
use crate::{AppError, KernelConfig};

/// Lifecycle state of the dispatcher.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KernelState {
    /// Constructed; the dataset has not been preloaded yet.
    Starting,
    /// Preload finished; `ready` not yet announced.
    Ready,
    /// Waiting for the next inbound line.
    Idle,
    /// Running an `execute` request.
    Executing,
    /// Terminal.
    Stopped,
}

/// Why [`Kernel::serve`] returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExitReason {
    /// A `shutdown` command was acknowledged.
    Shutdown,
    /// The inbound channel reached end of input.
    EndOfInput,
    /// The outbound channel can no longer be written.
    OutboundClosed,
    /// An unexpected failure inside the loop itself.
    LoopFault,
}

impl ExitReason {
    /// Whether the process should exit successfully.
    #[must_use]
    pub fn is_clean(self) -> bool {
        matches!(self, Self::Shutdown | Self::EndOfInput)
    }
}

/// The kernel: an execution engine, its outbound writer and a lifecycle.
#[derive(Debug)]
pub struct Kernel<E> {
    engine: ExecutionEngine<E>,
    writer: FrameWriter,
    config: KernelConfig,
    state: KernelState,
}

impl<E: Evaluator> Kernel<E> {
    /// Assemble a kernel in the `Starting` state.
    #[must_use]
    pub fn new(evaluator: E, writer: FrameWriter, config: KernelConfig) -> Self {
        Self {
            engine: ExecutionEngine::new(evaluator, config.artifacts),
            writer,
            config,
            state: KernelState::Starting,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> KernelState {
        self.state
    }

    /// The execution engine, including the persistent environment.
    #[must_use]
    pub fn engine(&self) -> &ExecutionEngine<E> {
        &self.engine
    }

    /// The outbound writer.
    #[must_use]
    pub fn writer(&self) -> &FrameWriter {
        &self.writer
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Run the startup preloader and move to `Ready`.
    ///
    /// Returns whether a dataset was published. A missing or unparsable
    /// dataset is logged and otherwise ignored.
    pub fn start(&mut self, dataset: Option<&Path>) -> bool {
        if self.state != KernelState::Starting {
            warn!(state = ?self.state, "kernel: start called twice, ignoring");
            return false;
        }
        let loaded = dataset::preload(self.engine.env_mut(), dataset, &self.config);
        self.state = KernelState::Ready;
        loaded
    }

    /// Announce readiness and serve commands from `input` until stopped.
    ///
    /// Runs the preloader without a dataset first if [`Kernel::start`] was
    /// not called.
    pub async fn serve<R>(&mut self, input: R) -> ExitReason
    where
        R: AsyncRead + Unpin,
    {
        if self.state == KernelState::Starting {
            self.start(None);
        }

        if let Err(err) = self.writer.send(&Message::ready()) {
            error!(%err, "kernel: failed to announce readiness");
            return self.stop(ExitReason::OutboundClosed);
        }
        self.state = KernelState::Idle;
        info!(max_line_bytes = self.config.max_line_bytes, "kernel ready");

        let mut framed = FramedRead::new(input, KernelCodec::new(self.config.max_line_bytes));

        loop {
            let exit = match framed.next().await {
                None => {
                    debug!("kernel: end of input");
                    Some(ExitReason::EndOfInput)
                }
                Some(Ok(Inbound::Line(line))) => self.handle_line(&line),
                Some(Ok(Inbound::Undecodable)) => {
                    warn!("kernel: inbound line is not valid UTF-8, skipping");
                    self.reply_error(INVALID_JSON.to_owned());
                    None
                }
                Some(Ok(Inbound::Oversized)) => {
                    warn!(
                        max_line_bytes = self.config.max_line_bytes,
                        "kernel: inbound line too long, skipping"
                    );
                    self.reply_error(format!(
                        "Command line too long: exceeded {} bytes",
                        self.config.max_line_bytes
                    ));
                    None
                }
                Some(Err(err)) => {
                    self.report_loop_fault(&err);
                    Some(ExitReason::LoopFault)
                }
            };

            let exit = exit.or_else(|| {
                self.writer
                    .is_broken()
                    .then_some(ExitReason::OutboundClosed)
            });
            if let Some(reason) = exit {
                return self.stop(reason);
            }
        }
    }

    /// Handle one inbound line, returning an exit reason if the loop must stop.
    pub fn handle_line(&mut self, line: &str) -> Option<ExitReason> {
        match parse_request(line) {
            Ok(None) => None,
            Ok(Some(Request::Execute { code })) => {
                self.state = KernelState::Executing;
                let terminal = self.engine.run(&code, &self.writer);
                debug!(kind = terminal.kind(), "kernel: execute finished");
                self.state = KernelState::Idle;
                None
            }
            Ok(Some(Request::Shutdown)) => {
                if let Err(err) = self.writer.send(&Message::shutdown_ack()) {
                    warn!(%err, "kernel: failed to acknowledge shutdown");
                }
                Some(ExitReason::Shutdown)
            }
            Err(AppError::Protocol(reply)) => {
                debug!(reply = reply.as_str(), "kernel: rejected inbound line");
                self.reply_error(reply);
                None
            }
            Err(err) => {
                self.report_loop_fault(&err);
                Some(ExitReason::LoopFault)
            }
        }
    }

    /// Send a loop-level `error` (no traceback).
    fn reply_error(&self, message: String) {
        if let Err(err) = self.writer.send(&Message::error(message, None)) {
            warn!(%err, "kernel: failed to send error reply");
        }
    }

    /// Report a fault in the loop itself; the caller stops afterwards.
    fn report_loop_fault(&self, fault: &AppError) {
        error!(%fault, "kernel: loop fault");
        let message = Message::error(format!("Kernel loop error: {fault}"), None);
        if let Err(err) = self.writer.send(&message) {
            error!(%err, "kernel: failed to report loop fault");
        }
    }

    fn stop(&mut self, reason: ExitReason) -> ExitReason {
        self.state = KernelState::Stopped;
        info!(
            ?reason,
            runs = self.engine.runs(),
            "kernel stopped"
        );
        reason
    }
}
