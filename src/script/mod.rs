//! Lua payload evaluator.
//!
//! Payloads run as Lua 5.4 chunks against the global table of the
//! [`Environment`](crate::engine::Environment), so globals assigned by one
//! request are visible to every later one. For the span of each run the
//! kernel binds:
//!
//! | Global | Effect |
//! |---|---|
//! | `print(...)` | `tostring` each argument, tab-separated, newline, to stdout |
//! | `eprint(...)` | the same, to stderr |
//! | `io.write(...)`, `io.stdout:write(...)` | strings and numbers verbatim to stdout |
//! | `io.stderr:write(...)` | strings and numbers verbatim to stderr |
//! | `plot(values [, title])` | register a line figure |
//! | `bar(values [, title])` | register a bar figure |
//! | `figures()` | number of figures waiting to be drained |
//!
//! A chunk is compiled before any of it runs, so a syntax error (nesting
//! beyond the parser's limit included) has no effects. Runtime errors keep
//! the effects of everything that ran before them.

mod host;

use std::cell::RefCell;

use mlua::Variadic;
use tracing::trace;

use crate::artifacts::FigureKind;
use crate::engine::{ExecContext, Evaluator, Fault};
use crate::protocol::Channel;
use host::Host;

/// Chunk name shown in error positions, as in `payload:3: boom`.
const CHUNK_NAME: &str = "=payload";

/// Default [`Evaluator`] used by the kernel binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LuaEvaluator;

impl LuaEvaluator {
    /// Create an evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for LuaEvaluator {
    fn evaluate(&mut self, code: &str, cx: &mut ExecContext<'_>) -> Result<(), Fault> {
        let lua = cx.env.lua();
        let state = &RefCell::new(Host {
            stdout: &mut cx.stdout,
            stderr: &mut cx.stderr,
            artifacts: &mut *cx.artifacts,
        });

        lua.scope(|scope| {
            let globals = lua.globals();
            globals.set(
                "print",
                scope.create_function(move |lua, args: Variadic<mlua::Value>| {
                    host::print(lua, state, Channel::Stdout, &args)
                })?,
            )?;
            globals.set(
                "eprint",
                scope.create_function(move |lua, args: Variadic<mlua::Value>| {
                    host::print(lua, state, Channel::Stderr, &args)
                })?,
            )?;

            let io = lua.create_table()?;
            io.set(
                "write",
                scope.create_function(move |_, parts: Variadic<mlua::String>| {
                    host::write(state, Channel::Stdout, &parts)
                })?,
            )?;
            for (name, channel) in [("stdout", Channel::Stdout), ("stderr", Channel::Stderr)] {
                let stream = lua.create_table()?;
                stream.set(
                    "write",
                    scope.create_function(
                        move |_, (_, parts): (mlua::Value, Variadic<mlua::String>)| {
                            host::write(state, channel, &parts)
                        },
                    )?,
                )?;
                io.set(name, stream)?;
            }
            globals.set("io", io)?;

            for (name, kind) in [("plot", FigureKind::Line), ("bar", FigureKind::Bar)] {
                globals.set(
                    name,
                    scope.create_function(
                        move |_, (values, title): (mlua::Table, Option<String>)| {
                            host::figure(state, kind, &values, title)
                        },
                    )?,
                )?;
            }
            globals.set(
                "figures",
                scope.create_function(move |_, ()| Ok(host::figures(state)))?,
            )?;

            lua.load(code).set_name(CHUNK_NAME).exec()
        })
        .map_err(|err| fault(&err))?;

        trace!(code_bytes = code.len(), "lua chunk finished");
        Ok(())
    }
}

/// Build the fault reported for `err`.
///
/// The message is the first line of the innermost error; the trace adds
/// Lua's stack traceback when one was captured.
fn fault(err: &mlua::Error) -> Fault {
    let text = describe(err);
    let message = text.lines().next().unwrap_or_default().to_owned();
    let mut trace = match err {
        mlua::Error::CallbackError { traceback, .. } => format!("{text}\n{traceback}"),
        _ => text,
    };
    if !trace.ends_with('\n') {
        trace.push('\n');
    }
    Fault::new(message, trace)
}

fn describe(err: &mlua::Error) -> String {
    match err {
        mlua::Error::RuntimeError(text) => text.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::CallbackError { cause, .. } => describe(cause),
        other => other.to_string(),
    }
}
