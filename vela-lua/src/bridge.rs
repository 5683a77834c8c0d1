//! Host values into Lua
//!
//! Variables arrive as JSON values. The conversion is a closed match: every
//! JSON shape maps to exactly one Lua shape, and anything else that is
//! `Serialize` goes through `serde_json::to_value` first.

use mlua::{Lua, Result as LuaResult, Table, Value};
use serde::Serialize;
use serde_json::{Map, Number};
use std::collections::BTreeMap;

/// Convert a JSON value into a Lua value
///
/// `null` becomes `nil`, arrays become 1-based sequences and objects become
/// tables keyed by string. Integers that fit in `i64` stay integers.
pub fn to_lua(lua: &Lua, value: &serde_json::Value) -> LuaResult<Value> {
    Ok(match value {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => number_to_lua(n),
        serde_json::Value::String(s) => Value::String(lua.create_string(s)?),
        serde_json::Value::Array(items) => {
            let table = lua.create_table_with_capacity(items.len(), 0)?;
            for (index, item) in items.iter().enumerate() {
                table.raw_set(index + 1, to_lua(lua, item)?)?;
            }
            Value::Table(table)
        }
        serde_json::Value::Object(map) => Value::Table(map_to_table(lua, map)?),
    })
}

/// Convert a JSON object into a Lua table
pub fn map_to_table(lua: &Lua, map: &Map<String, serde_json::Value>) -> LuaResult<Table> {
    let table = lua.create_table_with_capacity(0, map.len())?;
    for (key, value) in map {
        table.raw_set(key.as_str(), to_lua(lua, value)?)?;
    }
    Ok(table)
}

/// Convert a string map, such as a platform namespace, into a Lua table
pub fn strings_to_table(lua: &Lua, map: &BTreeMap<String, String>) -> LuaResult<Table> {
    let table = lua.create_table_with_capacity(0, map.len())?;
    for (key, value) in map {
        table.raw_set(key.as_str(), value.as_str())?;
    }
    Ok(table)
}

/// Convert any serializable host value
pub fn serialize_to_lua<T: Serialize + ?Sized>(lua: &Lua, value: &T) -> LuaResult<Value> {
    let value = serde_json::to_value(value).map_err(mlua::Error::external)?;
    to_lua(lua, &value)
}

fn number_to_lua(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Integer(i)
    } else if let Some(u) = n.as_u64() {
        // above i64::MAX
        Value::Number(u as f64)
    } else {
        Value::Number(n.as_f64().unwrap_or(f64::NAN))
    }
}
