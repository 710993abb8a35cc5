// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Table-driven XDR wire codec.
//!
//! Message layouts are described by `const` [`StructDefinition`] tables and
//! looked up by type id in a [`TypeRegistry`]; no per-message code is
//! generated. Decoding works on untrusted input: every length is checked
//! against the bytes actually present and nesting depth is bounded.
//!
//! # Example
//!
//! ```
//! use flightipc::xdr::{FieldDefinition, FieldKind, StructDefinition, TypeRegistry, Value};
//!
//! const FIELDS: &[FieldDefinition] = &[FieldDefinition::new(FieldKind::U32, "value")];
//!
//! let mut types = TypeRegistry::new();
//! types.register(StructDefinition::with_fields(0x1000, "SetMode", FIELDS), false);
//!
//! let mut params = types.allocate(0x1000).unwrap();
//! params.fields[0] = Value::U32(3);
//!
//! let mut buf = [0u8; 16];
//! let len = types.encode_struct(&params, &mut buf).unwrap();
//! let (decoded, _) = types.decode_struct(0x1000, &buf, len).unwrap();
//! assert_eq!(decoded.fields[0], Value::U32(3));
//! ```

pub mod codec;
pub mod print;
pub mod registry;
pub mod schema;
pub mod stream;
pub mod value;

pub use codec::{encode_with_retry, padding, XdrReader, XdrWriter};
pub use print::{print_struct, print_structure, PrintStyle};
pub use registry::TypeRegistry;
pub use schema::{
    Conversion, CustomCodec, FieldDefinition, FieldKind, StructCodec, StructDefinition,
};
pub use stream::{encode_struct_array, iterate_structs, StreamError};
pub use value::{StructValue, Value};

/// Union tag meaning "no value".
pub const VOID_TYPE: u32 = 0;

/// Type tag of an opaque struct array stream.
pub const OPAQUE_STRUCT_ARRAY_TYPE: u32 = 1;

/// Deepest struct/union/array nesting accepted by the decoders.
pub const MAX_NESTING_DEPTH: usize = 16;
