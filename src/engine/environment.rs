//! Persistent evaluation environment and the host view of its values.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use mlua::Lua;

use crate::Result;

/// Rows shown when a table is rendered as text.
const DISPLAY_ROWS: usize = 20;

/// A value bound in the [`Environment`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value.
    None,
    /// Boolean.
    Bool(bool),
    /// Double-precision number; integers are represented exactly up to 2^53.
    Number(f64),
    /// UTF-8 string.
    Str(String),
    /// Ordered list.
    List(Vec<Value>),
    /// Shared, immutable table.
    Table(Arc<Table>),
    /// A script value with no host counterpart, by its type name.
    Opaque(&'static str),
}

impl Value {
    /// Short type name used in fault messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Table(_) => "dataset",
            Self::Opaque(name) => *name,
        }
    }

    /// The number held, if any.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Rendering used inside lists, where strings are quoted.
    #[must_use]
    pub fn repr(&self) -> String {
        match self {
            Self::Str(s) => format!("{s:?}"),
            other => other.to_string(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Self::Table(table) => write!(f, "{table}"),
            Self::Opaque(name) => write!(f, "<{name}>"),
        }
    }
}

/// Format a number without a trailing `.0` when it is integral.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".into()
    } else if n.is_infinite() {
        if n > 0.0 { "inf".into() } else { "-inf".into() }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Column-named tabular data, as produced by the dataset preloader.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, checking every row has one cell per column.
    ///
    /// # Errors
    ///
    /// Returns a description of the first ragged row.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> std::result::Result<Self, String> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(format!(
                "row {index} has {} fields, expected {}",
                row.len(),
                columns.len()
            ));
        }
        Ok(Self { columns, rows })
    }

    /// Column names in file order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in file order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Every cell of column `name`, top to bottom.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[index].clone()).collect())
    }

    /// One summary line per numeric column: count, mean, min and max.
    ///
    /// Missing and non-numeric cells are ignored.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn describe(&self) -> String {
        let mut report = String::new();
        for name in &self.columns {
            let values: Vec<f64> = self
                .column(name)
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_number)
                .collect();
            let (Some(lo), Some(hi)) = (
                values.iter().copied().reduce(f64::min),
                values.iter().copied().reduce(f64::max),
            ) else {
                continue;
            };
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            report.push_str(&format!(
                "{name}: count={} mean={} min={} max={}\n",
                values.len(),
                format_number(mean),
                format_number(lo),
                format_number(hi),
            ));
        }
        if report.is_empty() {
            report.push_str("no numeric columns\n");
        }
        report
    }

    /// The first `n` rows as a new table.
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let shown = &self.rows[..self.rows.len().min(DISPLAY_ROWS)];
        let cells: Vec<Vec<String>> = shown
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:>w$}"))
            .collect();
        writeln!(f, "{}", header.join("  "))?;
        for row in &cells {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(c, &w)| format!("{c:>w$}"))
                .collect();
            writeln!(f, "{}", line.join("  "))?;
        }
        if self.rows.len() > shown.len() {
            writeln!(f, "...")?;
        }
        write!(f, "[{} rows x {} columns]", self.rows.len(), self.columns.len())
    }
}

/// Globals the kernel rebinds before every run; never listed as bindings.
pub const HOST_GLOBALS: &[&str] = &["print", "eprint", "io", "plot", "bar", "figures"];

/// Mapping from identifier to value shared by every request.
///
/// Backed by the global table of one Lua state. Created once and mutated in
/// place by each executed payload; never reset or copied between requests.
pub struct Environment {
    lua: Lua,
    builtins: BTreeSet<String>,
}

impl Environment {
    /// Create an environment holding only the standard library.
    #[must_use]
    pub fn new() -> Self {
        let lua = Lua::new();
        let mut builtins = global_names(&lua);
        builtins.extend(HOST_GLOBALS.iter().map(|name| (*name).to_owned()));
        Self { lua, builtins }
    }

    /// The Lua state executed payloads run in.
    #[must_use]
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Host view of the value bound to `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.lua.globals().get::<Value>(name) {
            Ok(Value::None) | Err(_) => None,
            Ok(value) => Some(value),
        }
    }

    /// Bind `name` to `value`, replacing any previous binding.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Script`](crate::AppError::Script) if the value
    /// cannot be created inside the Lua state.
    pub fn insert(&mut self, name: &str, value: Value) -> Result<()> {
        self.lua.globals().set(name, value)?;
        Ok(())
    }

    /// Unbind `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Script`](crate::AppError::Script) if the global
    /// table rejects the update.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.lua.globals().set(name, mlua::Value::Nil)?;
        Ok(())
    }

    /// Whether `name` is bound, standard library included.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lua.globals().contains_key(name).unwrap_or(false)
    }

    /// Names bound by payloads or the preloader, in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        global_names(&self.lua)
            .into_iter()
            .filter(|name| !self.builtins.contains(name))
            .collect()
    }

    /// Number of bindings listed by [`Environment::names`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.names().len()
    }

    /// Whether nothing beyond the standard library is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.names())
            .finish_non_exhaustive()
    }
}

fn global_names(lua: &Lua) -> BTreeSet<String> {
    lua.globals()
        .pairs::<String, mlua::Value>()
        .filter_map(std::result::Result::ok)
        .map(|(name, _)| name)
        .collect()
}
