// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Text rendering of decoded structures.
//!
//! Nested structs and non-void unions are flattened into their parent with
//! dotted keys (`origin.x`), so every style prints one row per scalar field.

use crate::error::Result;
use crate::xdr::codec::XdrReader;
use crate::xdr::registry::TypeRegistry;
use crate::xdr::schema::{FieldDefinition, StructCodec};
use crate::xdr::value::{StructValue, Value};
use std::fmt::Write as _;
use std::io::{self, Write};

/// Output style for structure printers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintStyle {
    /// `Name: value unit`, one per line, with unit conversion applied.
    #[default]
    Human,
    /// `key=value`, one per line.
    Kvp,
    /// Comma-separated keys on one line.
    CsvHeader,
    /// Comma-separated raw values on one line.
    CsvData,
}

struct Row<'a> {
    key: String,
    field: &'a FieldDefinition,
    value: &'a Value,
}

fn flatten<'a>(
    types: &TypeRegistry,
    value: &'a StructValue,
    prefix: &str,
    rows: &mut Vec<Row<'a>>,
) {
    let fields = match types.get(value.type_id).map(|d| d.codec) {
        Some(StructCodec::Fields(fields)) => fields,
        _ => return,
    };
    for (field, v) in fields.iter().zip(&value.fields) {
        let key = if prefix.is_empty() {
            field.key.to_string()
        } else {
            format!("{}.{}", prefix, field.key)
        };
        match v {
            Value::Struct(inner) => flatten(types, inner, &key, rows),
            Value::Union(Some(inner)) => flatten(types, inner, &key, rows),
            _ => rows.push(Row {
                key,
                field,
                value: v,
            }),
        }
    }
}

fn render_raw(value: &Value) -> String {
    match value {
        Value::I32(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::String(s) => s.clone(),
        Value::Bytes(b) => {
            let mut out = String::with_capacity(2 + b.len() * 2);
            out.push_str("0x");
            for byte in b {
                let _ = write!(out, "{:02x}", byte);
            }
            out
        }
        Value::Union(None) => "void".to_string(),
        Value::Union(Some(s)) => format!("<0x{:08x}>", s.type_id),
        Value::Struct(s) => format!("<0x{:08x}>", s.type_id),
    }
}

fn render_human(field: &FieldDefinition, value: &Value) -> String {
    let shown = match (field.conversion, value.as_f64()) {
        (Some(conv), Some(raw)) if conv.divisor != 0.0 => {
            format!("{}", (raw + conv.offset) / conv.divisor)
        }
        _ => render_raw(value),
    };
    match field.unit {
        Some(unit) => format!("{} {}", shown, unit),
        None => shown,
    }
}

fn csv_cell(text: &str) -> String {
    if text.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Print one decoded structure.
///
/// A custom print hook on the struct's definition takes precedence over the
/// field-table printer. Custom-codec structs without a hook print nothing.
pub fn print_struct(
    out: &mut dyn Write,
    types: &TypeRegistry,
    value: &StructValue,
    style: PrintStyle,
) -> io::Result<()> {
    if let Some(StructCodec::Custom(codec)) = types.get(value.type_id).map(|d| d.codec) {
        return match codec.print {
            Some(print) => print(out, value, style),
            None => Ok(()),
        };
    }

    let mut rows = Vec::new();
    flatten(types, value, "", &mut rows);

    match style {
        PrintStyle::Human => {
            for row in &rows {
                let label = if row.key.contains('.') {
                    row.key.as_str()
                } else {
                    row.field.name
                };
                writeln!(out, "{}: {}", label, render_human(row.field, row.value))?;
            }
        }
        PrintStyle::Kvp => {
            for row in &rows {
                writeln!(out, "{}={}", row.key, render_raw(row.value))?;
            }
        }
        PrintStyle::CsvHeader => {
            let keys: Vec<_> = rows.iter().map(|r| csv_cell(&r.key)).collect();
            writeln!(out, "{}", keys.join(","))?;
        }
        PrintStyle::CsvData => {
            let cells: Vec<_> = rows.iter().map(|r| csv_cell(&render_raw(r.value))).collect();
            writeln!(out, "{}", cells.join(","))?;
        }
    }
    Ok(())
}

/// Decode a struct body of `type_id` from `payload` and print it.
///
/// Returns the bytes consumed.
pub fn print_structure(
    out: &mut dyn Write,
    types: &TypeRegistry,
    type_id: u32,
    payload: &[u8],
    style: PrintStyle,
) -> Result<usize> {
    let mut r = XdrReader::new(payload);
    let value = types.decode_body(type_id, &mut r)?;
    print_struct(out, types, &value, style)?;
    Ok(r.position())
}
