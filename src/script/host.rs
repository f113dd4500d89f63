//! Host functions bound into the Lua state for the span of one run.

use std::cell::RefCell;

use mlua::{Function, Lua};

use crate::artifacts::{ArtifactRegistry, FigureKind};
use crate::capture::OutputCapture;
use crate::protocol::Channel;

/// The parts of an [`ExecContext`](crate::engine::ExecContext) scripts reach.
pub(super) struct Host<'a, 'w> {
    pub stdout: &'a mut OutputCapture<'w>,
    pub stderr: &'a mut OutputCapture<'w>,
    pub artifacts: &'a mut ArtifactRegistry,
}

impl<'w> Host<'_, 'w> {
    fn output(&mut self, channel: Channel) -> &mut OutputCapture<'w> {
        match channel {
            Channel::Stdout => &mut *self.stdout,
            Channel::Stderr => &mut *self.stderr,
        }
    }
}

/// `print`/`eprint`: `tostring` every argument, tab-separated, then a newline.
pub(super) fn print(
    lua: &Lua,
    host: &RefCell<Host<'_, '_>>,
    channel: Channel,
    args: &[mlua::Value],
) -> mlua::Result<()> {
    let tostring: Function = lua.globals().get("tostring")?;
    // `__tostring` may print, so render everything before borrowing the host.
    let mut line = args
        .iter()
        .map(|arg| tostring.call::<String>(arg.clone()))
        .collect::<mlua::Result<Vec<_>>>()?
        .join("\t");
    line.push('\n');
    host.borrow_mut().output(channel).write(&line);
    Ok(())
}

/// `io.write` and the stream `write` methods: strings and numbers verbatim.
pub(super) fn write(
    host: &RefCell<Host<'_, '_>>,
    channel: Channel,
    parts: &[mlua::String],
) -> mlua::Result<()> {
    let mut text = String::new();
    for part in parts {
        text.push_str(&part.to_string_lossy());
    }
    host.borrow_mut().output(channel).write(&text);
    Ok(())
}

/// `plot`/`bar`: register a figure from a sequence of numbers.
#[allow(clippy::cast_precision_loss)]
pub(super) fn figure(
    host: &RefCell<Host<'_, '_>>,
    kind: FigureKind,
    values: &mlua::Table,
    title: Option<String>,
) -> mlua::Result<()> {
    let name = match kind {
        FigureKind::Line => "plot",
        FigureKind::Bar => "bar",
    };
    let len = values.raw_len();
    let mut series = Vec::with_capacity(len);
    for index in 1..=len {
        let point = match values.raw_get::<mlua::Value>(index)? {
            mlua::Value::Integer(i) => i as f64,
            mlua::Value::Number(n) => n,
            other => {
                return Err(mlua::Error::RuntimeError(format!(
                    "{name}() values must be numbers, got '{}'",
                    other.type_name()
                )));
            }
        };
        series.push(point);
    }
    host.borrow_mut().artifacts.register(kind, title, series);
    Ok(())
}

/// `figures()`: number of figures waiting to be drained.
pub(super) fn figures(host: &RefCell<Host<'_, '_>>) -> usize {
    host.borrow().artifacts.len()
}
