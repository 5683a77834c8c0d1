//! Lua return values into pipeline documents
//!
//! `main` returns either one pipeline table or a list of them. The shape is
//! resolved once into a [`PipelineFragment`], then every table is written as
//! JSON, which is also valid YAML, so the document parser can take it from
//! there.

use mlua::{Result as LuaResult, Table, Value};
use std::fmt::Write as _;

/// Deepest table nesting the writer accepts
pub const MAX_DEPTH: usize = 64;

/// What a template's `main` produced
#[derive(Debug, Clone)]
pub enum PipelineFragment {
    /// A single pipeline table
    Single(Table),
    /// A list of pipeline tables, one document each
    Many(Vec<Table>),
}

impl PipelineFragment {
    /// Classify a return value, or hand back its Lua type name
    ///
    /// A non-empty table whose keys are exactly `1..n` and whose values are
    /// all tables is a list of documents, each of which must be a mapping.
    /// Every other table is one document.
    pub fn classify(value: Value) -> Result<Self, &'static str> {
        let Value::Table(table) = value else {
            return Err(value.type_name());
        };

        match document_list(&table) {
            Some(tables) if tables.iter().any(is_sequence) => Err(NON_MAPPING_LIST),
            Some(tables) => Ok(Self::Many(tables)),
            None => Ok(Self::Single(table)),
        }
    }

    pub fn tables(&self) -> &[Table] {
        match self {
            Self::Single(table) => std::slice::from_ref(table),
            Self::Many(tables) => tables,
        }
    }

    /// Write every table as its own YAML document
    pub fn to_documents(&self) -> LuaResult<String> {
        let mut out = String::new();
        for table in self.tables() {
            out.push_str("---\n");
            if table.is_empty() {
                // an empty pipeline, not an empty list
                out.push_str("{}");
            } else {
                write_value(&Value::Table(table.clone()), &mut out, 0)?;
            }
            out.push('\n');
        }
        Ok(out)
    }
}

const NON_MAPPING_LIST: &str = "a list of non-mapping tables";

/// True for a non-empty table keyed exactly `1..n`
fn is_sequence(table: &Table) -> bool {
    let len = table.raw_len();
    len > 0
        && table.pairs::<Value, Value>().all(|pair| {
            matches!(pair, Ok((Value::Integer(i), _)) if i >= 1 && (i as usize) <= len)
        })
}

fn document_list(table: &Table) -> Option<Vec<Table>> {
    let len = table.raw_len();
    if len == 0 {
        return None;
    }

    let mut tables = Vec::with_capacity(len);
    let mut count = 0;
    for pair in table.pairs::<Value, Value>() {
        let (key, value) = pair.ok()?;
        count += 1;
        match (key, value) {
            (Value::Integer(i), Value::Table(_)) if i >= 1 && (i as usize) <= len => {}
            _ => return None,
        }
    }
    if count != len {
        return None;
    }

    for index in 1..=len {
        tables.push(table.raw_get::<Table>(index).ok()?);
    }
    Some(tables)
}

/// Serialize a Lua value as JSON text
///
/// Sequences become arrays and other tables become objects with their keys
/// sorted. Empty tables are written as `[]`.
pub fn write_value(value: &Value, out: &mut String, depth: usize) -> LuaResult<()> {
    if depth > MAX_DEPTH {
        return Err(mlua::Error::runtime(format!(
            "value nesting exceeds the maximum depth of {}",
            MAX_DEPTH
        )));
    }

    match value {
        Value::Nil => out.push_str("null"),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        Value::Number(n) => write_number(*n, out)?,
        Value::String(s) => write_string(&s.to_str()?, out)?,
        Value::Table(table) => write_table(table, out, depth)?,
        other => {
            return Err(mlua::Error::runtime(format!(
                "cannot serialize a {} value",
                other.type_name()
            )));
        }
    }

    Ok(())
}

fn write_number(n: f64, out: &mut String) -> LuaResult<()> {
    if !n.is_finite() {
        return Err(mlua::Error::runtime(format!(
            "cannot serialize non-finite number {}",
            n
        )));
    }
    let _ = write!(out, "{}", n);
    Ok(())
}

fn write_string(s: &str, out: &mut String) -> LuaResult<()> {
    if s.chars().any(|c| (c as u32) < 0x20 || (c as u32) > 0xFFFF) {
        out.push_str(&serde_json::to_string(s).map_err(mlua::Error::external)?);
        return Ok(());
    }

    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(())
}

fn write_table(table: &Table, out: &mut String, depth: usize) -> LuaResult<()> {
    let mut entries = Vec::new();
    for pair in table.pairs::<Value, Value>() {
        entries.push(pair?);
    }

    let len = table.raw_len();
    if entries.is_empty() || (len > 0 && entries.len() == len) {
        out.push('[');
        for index in 1..=len {
            if index > 1 {
                out.push(',');
            }
            let item: Value = table.raw_get(index)?;
            write_value(&item, out, depth + 1)?;
        }
        out.push(']');
        return Ok(());
    }

    let mut fields = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        fields.push((object_key(&key)?, value));
    }
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    out.push('{');
    for (index, (key, value)) in fields.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        write_string(key, out)?;
        out.push(':');
        write_value(value, out, depth + 1)?;
    }
    out.push('}');
    Ok(())
}

fn object_key(key: &Value) -> LuaResult<String> {
    match key {
        Value::String(s) => Ok(String::from(&*s.to_str()?)),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Number(n) if n.is_finite() => Ok(n.to_string()),
        other => Err(mlua::Error::runtime(format!(
            "cannot use a {} value as an object key",
            other.type_name()
        ))),
    }
}
