// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded message values.

use crate::error::{Error, Result};
use crate::xdr::schema::StructDefinition;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
    String(String),
    /// Tagged union. `None` is the void tag (0).
    Union(Option<Box<StructValue>>),
    Struct(StructValue),
}

impl Value {
    /// Try to get as u32.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u64.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as nested struct.
    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Self::Struct(v) => Some(v),
            Self::Union(Some(v)) => Some(v),
            _ => None,
        }
    }

    /// Numeric view used by unit conversion. `None` for non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::I32(v) => Some(f64::from(*v)),
            Self::U32(v) => Some(f64::from(*v)),
            Self::I64(v) => Some(*v as f64),
            Self::U64(v) => Some(*v as f64),
            Self::F32(v) => Some(f64::from(*v)),
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }
}

/// In-memory form of one structure: its type id and field values in
/// field-table order.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub type_id: u32,
    pub fields: Vec<Value>,
}

impl StructValue {
    /// Create a struct value from parts.
    pub fn new(type_id: u32, fields: Vec<Value>) -> Self {
        Self { type_id, fields }
    }

    /// Field by position.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Field by key, case-insensitive.
    pub fn field<'a>(&'a self, def: &StructDefinition, key: &str) -> Option<&'a Value> {
        self.fields.get(def.field_index(key)?)
    }

    /// Replace the field at `index`, checking its kind against `def`.
    pub fn set(&mut self, def: &StructDefinition, index: usize, value: Value) -> Result<()> {
        let field = def
            .fields()
            .and_then(|f| f.get(index))
            .ok_or(Error::NotFieldTable(def.type_id))?;
        if !field.kind.matches(&value) {
            return Err(Error::KindMismatch { field: field.key });
        }
        match self.fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::FieldCount {
                type_id: self.type_id,
                expected: index + 1,
                found: self.fields.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdr::schema::{FieldDefinition, FieldKind};

    const FIELDS: &[FieldDefinition] = &[
        FieldDefinition::new(FieldKind::U32, "count"),
        FieldDefinition::new(FieldKind::String, "label"),
    ];
    const DEF: StructDefinition = StructDefinition::with_fields(0x200, "Sample", FIELDS);

    #[test]
    fn test_set_checks_kind() {
        let mut v = StructValue::new(0x200, vec![Value::U32(0), Value::String(String::new())]);
        v.set(&DEF, 0, Value::U32(9)).unwrap();
        assert_eq!(v.field(&DEF, "COUNT"), Some(&Value::U32(9)));

        assert!(matches!(
            v.set(&DEF, 1, Value::U32(1)),
            Err(Error::KindMismatch { field: "label" })
        ));
        assert!(v.set(&DEF, 5, Value::U32(1)).is_err());
    }

    #[test]
    fn test_numeric_view() {
        assert_eq!(Value::I32(-3).as_f64(), Some(-3.0));
        assert_eq!(Value::String("x".into()).as_f64(), None);
        assert!(Value::Union(None).as_struct().is_none());
    }
}
