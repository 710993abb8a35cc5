// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field and struct descriptors for table-driven messages.
//!
//! Descriptor tables are `const` data. Each field names its wire kind, so the
//! generic encode/decode/scan/print paths match exhaustively on [`FieldKind`]
//! instead of calling through per-field function pointers.

use crate::error::{Error, Result};
use crate::xdr::codec::{XdrReader, XdrWriter};
use crate::xdr::print::PrintStyle;
use crate::xdr::value::{StructValue, Value};
use std::io::{self, Write};

/// Wire kind of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Length-prefixed opaque bytes.
    Bytes,
    /// Length-prefixed UTF-8 text.
    String,
    /// `{ type tag: u32, struct }`, tag 0 meaning "no value".
    Union,
    /// Nested struct of the given type id, encoded without a tag.
    Struct(u32),
}

impl FieldKind {
    /// Whether text can be scanned into this kind from the command line.
    pub const fn is_scannable(&self) -> bool {
        !matches!(self, Self::Union | Self::Struct(_))
    }

    /// Whether `value` has this kind.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::I32, Value::I32(_))
            | (Self::U32, Value::U32(_))
            | (Self::I64, Value::I64(_))
            | (Self::U64, Value::U64(_))
            | (Self::F32, Value::F32(_))
            | (Self::F64, Value::F64(_))
            | (Self::Bytes, Value::Bytes(_))
            | (Self::String, Value::String(_))
            | (Self::Union, Value::Union(_)) => true,
            (Self::Struct(id), Value::Struct(s)) => s.type_id == *id,
            _ => false,
        }
    }

    /// Convert command-line text into a value of this kind.
    ///
    /// Integers accept decimal, `0x` hex, `0o` octal and `0b` binary, with an
    /// optional leading `-` for signed kinds. Byte strings are hex digits,
    /// optionally `0x`-prefixed. Strings are taken verbatim.
    pub fn scan(&self, key: &'static str, text: &str) -> Result<Value> {
        let fail = || Error::Scan {
            key,
            input: text.to_string(),
        };
        let verbatim = text;
        let text = text.trim();
        let int = || parse_int(text).ok_or_else(fail);
        let value = match self {
            Self::I32 => Value::I32(i32::try_from(int()?).map_err(|_| fail())?),
            Self::U32 => Value::U32(u32::try_from(int()?).map_err(|_| fail())?),
            Self::I64 => Value::I64(i64::try_from(int()?).map_err(|_| fail())?),
            Self::U64 => Value::U64(u64::try_from(int()?).map_err(|_| fail())?),
            Self::F32 => Value::F32(text.parse().map_err(|_| fail())?),
            Self::F64 => Value::F64(text.parse().map_err(|_| fail())?),
            Self::String => Value::String(verbatim.to_string()),
            Self::Bytes => Value::Bytes(parse_hex(text).ok_or_else(fail)?),
            Self::Union | Self::Struct(_) => return Err(fail()),
        };
        Ok(value)
    }
}

fn parse_int(text: &str) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(hex) = lower.strip_prefix("0x") {
        (16, hex.to_string())
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (8, oct.to_string())
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (2, bin.to_string())
    } else {
        (10, lower)
    };
    if body.is_empty() || body.starts_with(&['+', '-'][..]) {
        return None;
    }
    let magnitude = i128::from_str_radix(&body, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Linear conversion applied to numeric fields in human-readable output:
/// `shown = (raw + offset) / divisor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub offset: f64,
    pub divisor: f64,
}

/// One named field inside a structured message.
///
/// The field's position in its struct's table is its offset into the
/// decoded [`StructValue`].
#[derive(Debug, Clone, Copy)]
pub struct FieldDefinition {
    /// Wire kind.
    pub kind: FieldKind,
    /// Command-line key (matched case-insensitively).
    pub key: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Unit shown after the value.
    pub unit: Option<&'static str>,
    /// Conversion for human output.
    pub conversion: Option<Conversion>,
    /// Help text.
    pub description: Option<&'static str>,
    /// Whether the command line may set this field.
    pub scannable: bool,
}

impl FieldDefinition {
    /// Create a field named after its key.
    pub const fn new(kind: FieldKind, key: &'static str) -> Self {
        Self {
            kind,
            key,
            name: key,
            unit: None,
            conversion: None,
            description: None,
            scannable: kind.is_scannable(),
        }
    }

    /// Set the human-readable name.
    pub const fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Set the unit.
    pub const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Set the human-output conversion.
    pub const fn convert(mut self, offset: f64, divisor: f64) -> Self {
        self.conversion = Some(Conversion { offset, divisor });
        self
    }

    /// Set the help text.
    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// Hide the field from command-line scanning.
    pub const fn read_only(mut self) -> Self {
        self.scannable = false;
        self
    }
}

/// Hand-written codec for structs that do not fit a field table.
#[derive(Debug, Clone, Copy)]
pub struct CustomCodec {
    /// Append the struct body (no type tag).
    pub encode: fn(&StructValue, &mut XdrWriter<'_>) -> Result<()>,
    /// Read the struct body and return its fields.
    pub decode: fn(&mut XdrReader<'_>) -> Result<Vec<Value>>,
    /// Optional printer; field-less structs print nothing without one.
    pub print: Option<fn(&mut dyn Write, &StructValue, PrintStyle) -> io::Result<()>>,
}

/// How a struct is put on the wire.
#[derive(Debug, Clone, Copy)]
pub enum StructCodec {
    /// Generic codec walking the field table in order.
    Fields(&'static [FieldDefinition]),
    /// Hand-written codec.
    Custom(CustomCodec),
}

/// A structured message or parameter type.
#[derive(Debug, Clone, Copy)]
pub struct StructDefinition {
    /// Type id, unique within a [`TypeRegistry`](crate::xdr::TypeRegistry).
    pub type_id: u32,
    /// Type name for diagnostics.
    pub name: &'static str,
    /// Wire codec.
    pub codec: StructCodec,
}

impl StructDefinition {
    /// Create a field-table struct.
    pub const fn with_fields(
        type_id: u32,
        name: &'static str,
        fields: &'static [FieldDefinition],
    ) -> Self {
        Self {
            type_id,
            name,
            codec: StructCodec::Fields(fields),
        }
    }

    /// Create a struct with a hand-written codec.
    pub const fn custom(type_id: u32, name: &'static str, codec: CustomCodec) -> Self {
        Self {
            type_id,
            name,
            codec: StructCodec::Custom(codec),
        }
    }

    /// Field table, if this struct uses the generic codec.
    pub fn fields(&self) -> Option<&'static [FieldDefinition]> {
        match self.codec {
            StructCodec::Fields(fields) => Some(fields),
            StructCodec::Custom(_) => None,
        }
    }

    /// Index of the field whose key matches case-insensitively.
    pub fn field_index(&self, key: &str) -> Option<usize> {
        self.fields()?
            .iter()
            .position(|f| f.key.eq_ignore_ascii_case(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_integers() {
        assert_eq!(FieldKind::U32.scan("v", "42").unwrap(), Value::U32(42));
        assert_eq!(FieldKind::U32.scan("v", "0x10").unwrap(), Value::U32(16));
        assert_eq!(FieldKind::I32.scan("v", "-7").unwrap(), Value::I32(-7));
        assert_eq!(FieldKind::I64.scan("v", "0b101").unwrap(), Value::I64(5));
        assert_eq!(
            FieldKind::U64.scan("v", "18446744073709551615").unwrap(),
            Value::U64(u64::MAX)
        );
    }

    #[test]
    fn test_scan_rejects_out_of_range() {
        assert!(FieldKind::U32.scan("v", "-1").is_err());
        assert!(FieldKind::I32.scan("v", "2147483648").is_err());
        assert!(FieldKind::U32.scan("v", "").is_err());
        assert!(FieldKind::U32.scan("v", "0x").is_err());
        assert!(FieldKind::U32.scan("v", "twelve").is_err());
    }

    #[test]
    fn test_scan_text_and_bytes() {
        assert_eq!(
            FieldKind::String.scan("s", "safe").unwrap(),
            Value::String("safe".into())
        );
        assert_eq!(
            FieldKind::Bytes.scan("b", "0xdeadBEEF").unwrap(),
            Value::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])
        );
        assert!(FieldKind::Bytes.scan("b", "abc").is_err());
        assert!(FieldKind::F64.scan("f", "1.5e3").is_ok());
    }

    #[test]
    fn test_scan_string_keeps_surrounding_spaces() {
        assert_eq!(
            FieldKind::String.scan("s", "  two words ").unwrap(),
            Value::String("  two words ".into())
        );
        assert_eq!(FieldKind::U32.scan("n", " 42 ").unwrap(), Value::U32(42));
    }

    #[test]
    fn test_compound_kinds_are_not_scannable() {
        assert!(FieldKind::Union.scan("u", "1").is_err());
        assert!(!FieldKind::Struct(9).is_scannable());
        assert!(!FieldDefinition::new(FieldKind::Union, "u").scannable);
        assert!(!FieldDefinition::new(FieldKind::U32, "x").read_only().scannable);
    }

    #[test]
    fn test_field_index_case_insensitive() {
        const FIELDS: &[FieldDefinition] = &[
            FieldDefinition::new(FieldKind::U32, "interval"),
            FieldDefinition::new(FieldKind::String, "Mode"),
        ];
        let def = StructDefinition::with_fields(0x100, "Params", FIELDS);
        assert_eq!(def.field_index("MODE"), Some(1));
        assert_eq!(def.field_index("missing"), None);
    }
}
