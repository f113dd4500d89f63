//! Conversions between host [`Value`]s and Lua values.
//!
//! Host → Lua is total: lists become sequences, datasets become
//! [`TableHandle`] userdata, `none` becomes `nil`. Lua → host reads tables
//! through their sequence part and views anything without a host
//! counterpart (functions, coroutines, tables nested too deeply) as
//! [`Value::Opaque`].

use std::sync::Arc;

use mlua::{FromLua, IntoLua, Lua, MetaMethod, UserData, UserDataMethods};

use super::environment::{Table, Value};

/// Rows returned by `t:head()` when no count is given.
const DEFAULT_HEAD_ROWS: usize = 5;

/// Table nesting read before the rest is treated as opaque.
const MAX_DEPTH: usize = 32;

/// Largest magnitude below which integral numbers cross as Lua integers.
const INTEGRAL_LIMIT: f64 = 9_007_199_254_740_992.0;

/// A dataset as seen from scripts.
///
/// Methods: `columns()`, `column(name)`, `row(i)` (1-based), `rows()`,
/// `head([n])`, `describe()`. `#t` is the row count and `tostring(t)` the
/// text rendering.
#[derive(Debug, Clone)]
pub struct TableHandle(pub Arc<Table>);

impl UserData for TableHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("columns", |_, this, ()| Ok(this.0.columns().to_vec()));
        methods.add_method("column", |lua, this, name: String| {
            let cells = this
                .0
                .column(&name)
                .ok_or_else(|| mlua::Error::RuntimeError(format!("no column '{name}'")))?;
            sequence(lua, cells)
        });
        methods.add_method("row", |lua, this, index: usize| {
            let row = index
                .checked_sub(1)
                .and_then(|i| this.0.rows().get(i))
                .ok_or_else(|| {
                    mlua::Error::RuntimeError(format!(
                        "row {index} out of range (1 to {})",
                        this.0.n_rows()
                    ))
                })?;
            let record = lua.create_table()?;
            for (name, cell) in this.0.columns().iter().zip(row) {
                record.set(name.as_str(), cell.clone())?;
            }
            Ok(record)
        });
        methods.add_method("rows", |_, this, ()| Ok(this.0.n_rows()));
        methods.add_method("head", |_, this, n: Option<usize>| {
            Ok(Self(Arc::new(this.0.head(n.unwrap_or(DEFAULT_HEAD_ROWS)))))
        });
        methods.add_method("describe", |_, this, ()| Ok(this.0.describe()));
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.0.n_rows()));
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.0.to_string()));
    }
}

impl IntoLua for Value {
    fn into_lua(self, lua: &Lua) -> mlua::Result<mlua::Value> {
        let value = match self {
            Self::None | Self::Opaque(_) => mlua::Value::Nil,
            Self::Bool(b) => mlua::Value::Boolean(b),
            Self::Number(n) => number(n),
            Self::Str(s) => mlua::Value::String(lua.create_string(&s)?),
            Self::List(items) => mlua::Value::Table(sequence(lua, items)?),
            Self::Table(table) => mlua::Value::UserData(lua.create_userdata(TableHandle(table))?),
        };
        Ok(value)
    }
}

impl FromLua for Value {
    fn from_lua(value: mlua::Value, _lua: &Lua) -> mlua::Result<Self> {
        from_lua_at(value, 0)
    }
}

#[allow(clippy::cast_precision_loss)]
fn from_lua_at(value: mlua::Value, depth: usize) -> mlua::Result<Value> {
    let value = match value {
        mlua::Value::Nil => Value::None,
        mlua::Value::Boolean(b) => Value::Bool(b),
        mlua::Value::Integer(i) => Value::Number(i as f64),
        mlua::Value::Number(n) => Value::Number(n),
        mlua::Value::String(s) => Value::Str(s.to_string_lossy().to_string()),
        mlua::Value::Table(table) if depth < MAX_DEPTH => Value::List(
            table
                .sequence_values::<mlua::Value>()
                .map(|item| item.and_then(|item| from_lua_at(item, depth + 1)))
                .collect::<mlua::Result<_>>()?,
        ),
        mlua::Value::UserData(data) => {
            let handle = data
                .borrow::<TableHandle>()
                .map(|handle| Arc::clone(&handle.0));
            handle.map_or(Value::Opaque("userdata"), Value::Table)
        }
        other => Value::Opaque(other.type_name()),
    };
    Ok(value)
}

/// Build a Lua sequence; `none` items leave holes.
fn sequence(lua: &Lua, items: Vec<Value>) -> mlua::Result<mlua::Table> {
    let list = lua.create_table()?;
    for (index, item) in items.into_iter().enumerate() {
        list.raw_set(index + 1, item)?;
    }
    Ok(list)
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number(n: f64) -> mlua::Value {
    if n.fract() == 0.0 && n.abs() < INTEGRAL_LIMIT {
        mlua::Value::Integer(n as i64)
    } else {
        mlua::Value::Number(n)
    }
}
