// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Struct type registry and the generic field-table codec.

use crate::error::{Error, Result};
use crate::xdr::codec::{encode_with_retry, XdrReader, XdrWriter};
use crate::xdr::schema::{FieldDefinition, FieldKind, StructCodec, StructDefinition};
use crate::xdr::value::{StructValue, Value};
use crate::xdr::{MAX_NESTING_DEPTH, OPAQUE_STRUCT_ARRAY_TYPE, VOID_TYPE};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// StructDefinitions keyed by type id.
///
/// Owned by process start-up and handed by reference to the dispatcher and
/// the command-line sender.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    defs: HashMap<u32, StructDefinition>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition.
    ///
    /// An id already present is kept unless `override_existing` is set, in
    /// which case the entry is replaced in place. Reserved ids are refused.
    /// Returns whether `def` is now the registered definition.
    pub fn register(&mut self, def: StructDefinition, override_existing: bool) -> bool {
        if def.type_id == VOID_TYPE || def.type_id == OPAQUE_STRUCT_ARRAY_TYPE {
            log::warn!(
                "[XDR] refusing to register reserved type id 0x{:08x} ({})",
                def.type_id,
                def.name
            );
            return false;
        }

        match self.defs.entry(def.type_id) {
            Entry::Occupied(mut slot) => {
                if override_existing {
                    log::debug!("[XDR] type 0x{:08x} replaced by {}", def.type_id, def.name);
                    slot.insert(def);
                    true
                } else {
                    log::debug!(
                        "[XDR] type 0x{:08x} already registered as {}, keeping it",
                        def.type_id,
                        slot.get().name
                    );
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(def);
                true
            }
        }
    }

    /// Register a table of definitions.
    pub fn register_all(&mut self, defs: &[StructDefinition], override_existing: bool) {
        for def in defs {
            self.register(*def, override_existing);
        }
    }

    /// Definition for a type id.
    pub fn get(&self, type_id: u32) -> Option<&StructDefinition> {
        self.defs.get(&type_id)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Whether no types are registered.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    fn lookup(&self, type_id: u32, depth: usize) -> Result<&StructDefinition> {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        self.get(type_id).ok_or(Error::UnknownType(type_id))
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocate a zero-initialised value of a registered type.
    ///
    /// Nested structs are allocated recursively; unions start out void.
    /// Custom-codec types allocate with no fields.
    pub fn allocate(&self, type_id: u32) -> Result<StructValue> {
        self.allocate_at(type_id, 0)
    }

    fn allocate_at(&self, type_id: u32, depth: usize) -> Result<StructValue> {
        let def = self.lookup(type_id, depth)?;
        let fields = match def.codec {
            StructCodec::Fields(fields) => fields
                .iter()
                .map(|f| self.default_value(f.kind, depth))
                .collect::<Result<Vec<_>>>()?,
            StructCodec::Custom(_) => Vec::new(),
        };
        Ok(StructValue::new(type_id, fields))
    }

    fn default_value(&self, kind: FieldKind, depth: usize) -> Result<Value> {
        Ok(match kind {
            FieldKind::I32 => Value::I32(0),
            FieldKind::U32 => Value::U32(0),
            FieldKind::I64 => Value::I64(0),
            FieldKind::U64 => Value::U64(0),
            FieldKind::F32 => Value::F32(0.0),
            FieldKind::F64 => Value::F64(0.0),
            FieldKind::Bytes => Value::Bytes(Vec::new()),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Union => Value::Union(None),
            FieldKind::Struct(id) => Value::Struct(self.allocate_at(id, depth + 1)?),
        })
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Append a struct body (fields only, no type tag).
    pub fn encode_body(&self, value: &StructValue, w: &mut XdrWriter<'_>) -> Result<()> {
        self.encode_body_at(value, w, 0)
    }

    /// Append a struct preceded by its `u32` type id.
    pub fn encode_tagged(&self, value: &StructValue, w: &mut XdrWriter<'_>) -> Result<()> {
        w.encode_u32(value.type_id);
        self.encode_body_at(value, w, 0)
    }

    /// Encode a struct body into `dst`.
    ///
    /// Returns the bytes written, or [`Error::BufferTooSmall`] carrying the
    /// size the value needs.
    pub fn encode_struct(&self, value: &StructValue, dst: &mut [u8]) -> Result<usize> {
        let mut w = XdrWriter::new(dst);
        self.encode_body(value, &mut w)?;
        w.finish()
    }

    /// Encode a self-contained tagged struct (`{type, body}`) into a fresh
    /// buffer, growing it once if the default size is not enough.
    pub fn encode_opaque(&self, value: &StructValue) -> Result<Vec<u8>> {
        encode_with_retry(value.type_id, |w| self.encode_tagged(value, w))
    }

    fn encode_body_at(&self, value: &StructValue, w: &mut XdrWriter<'_>, depth: usize) -> Result<()> {
        let def = self.lookup(value.type_id, depth)?;
        match def.codec {
            StructCodec::Fields(fields) => {
                if fields.len() != value.fields.len() {
                    return Err(Error::FieldCount {
                        type_id: value.type_id,
                        expected: fields.len(),
                        found: value.fields.len(),
                    });
                }
                for (field, v) in fields.iter().zip(&value.fields) {
                    self.encode_field(field, v, w, depth)?;
                }
                Ok(())
            }
            StructCodec::Custom(codec) => (codec.encode)(value, w),
        }
    }

    fn encode_field(
        &self,
        field: &FieldDefinition,
        value: &Value,
        w: &mut XdrWriter<'_>,
        depth: usize,
    ) -> Result<()> {
        match (field.kind, value) {
            (FieldKind::I32, Value::I32(v)) => w.encode_i32(*v),
            (FieldKind::U32, Value::U32(v)) => w.encode_u32(*v),
            (FieldKind::I64, Value::I64(v)) => w.encode_i64(*v),
            (FieldKind::U64, Value::U64(v)) => w.encode_u64(*v),
            (FieldKind::F32, Value::F32(v)) => w.encode_f32(*v),
            (FieldKind::F64, Value::F64(v)) => w.encode_f64(*v),
            (FieldKind::Bytes, Value::Bytes(v)) => w.encode_bytes(v)?,
            (FieldKind::String, Value::String(v)) => w.encode_string(v)?,
            (FieldKind::Union, Value::Union(None)) => w.encode_u32(VOID_TYPE),
            (FieldKind::Union, Value::Union(Some(inner))) => {
                w.encode_u32(inner.type_id);
                self.encode_body_at(inner, w, depth + 1)?;
            }
            (FieldKind::Struct(id), Value::Struct(inner)) if inner.type_id == id => {
                self.encode_body_at(inner, w, depth + 1)?;
            }
            _ => return Err(Error::KindMismatch { field: field.key }),
        }
        Ok(())
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Decode a struct body of a known type.
    pub fn decode_body(&self, type_id: u32, r: &mut XdrReader<'_>) -> Result<StructValue> {
        self.decode_body_at(type_id, r, 0)
    }

    /// Decode a `{type, body}` struct.
    pub fn decode_tagged(&self, r: &mut XdrReader<'_>) -> Result<StructValue> {
        let type_id = r.decode_u32()?;
        self.decode_body_at(type_id, r, 0)
    }

    /// Decode a struct body from at most `max` bytes of `src`.
    ///
    /// Returns the value and the number of bytes consumed. Fails as a whole
    /// if any field fails or the fields would run past `max`.
    pub fn decode_struct(&self, type_id: u32, src: &[u8], max: usize) -> Result<(StructValue, usize)> {
        let mut r = XdrReader::new(&src[..max.min(src.len())]);
        let value = self.decode_body(type_id, &mut r)?;
        Ok((value, r.position()))
    }

    fn decode_body_at(&self, type_id: u32, r: &mut XdrReader<'_>, depth: usize) -> Result<StructValue> {
        let def = self.lookup(type_id, depth)?;
        let fields = match def.codec {
            StructCodec::Fields(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                for field in fields {
                    values.push(self.decode_kind(field.kind, r, depth)?);
                }
                values
            }
            StructCodec::Custom(codec) => (codec.decode)(r)?,
        };
        Ok(StructValue::new(type_id, fields))
    }

    fn decode_kind(&self, kind: FieldKind, r: &mut XdrReader<'_>, depth: usize) -> Result<Value> {
        Ok(match kind {
            FieldKind::I32 => Value::I32(r.decode_i32()?),
            FieldKind::U32 => Value::U32(r.decode_u32()?),
            FieldKind::I64 => Value::I64(r.decode_i64()?),
            FieldKind::U64 => Value::U64(r.decode_u64()?),
            FieldKind::F32 => Value::F32(r.decode_f32()?),
            FieldKind::F64 => Value::F64(r.decode_f64()?),
            FieldKind::Bytes => Value::Bytes(r.decode_bytes()?),
            FieldKind::String => Value::String(r.decode_string()?),
            FieldKind::Union => match r.decode_u32()? {
                VOID_TYPE => Value::Union(None),
                tag => Value::Union(Some(Box::new(self.decode_body_at(tag, r, depth + 1)?))),
            },
            FieldKind::Struct(id) => Value::Struct(self.decode_body_at(id, r, depth + 1)?),
        })
    }
}
