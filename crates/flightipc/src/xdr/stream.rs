// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Self-describing structure streams.
//!
//! A stream is a `u32` type tag followed by that type's body. The special
//! [`OPAQUE_STRUCT_ARRAY_TYPE`] tag is followed instead by an element count
//! and, per element, `{u32 byte length, payload}` where each payload is itself
//! a stream bounded by its declared length.
//!
//! ```text
//! +------+-------+-----+---------+-----+---------+
//! | 0x01 | count | len | stream  | len | stream  | ...
//! +------+-------+-----+---------+-----+---------+
//! ```

use crate::error::Result;
use crate::xdr::codec::XdrReader;
use crate::xdr::registry::TypeRegistry;
use crate::xdr::schema::StructDefinition;
use crate::xdr::value::StructValue;
use crate::xdr::{MAX_NESTING_DEPTH, OPAQUE_STRUCT_ARRAY_TYPE};
use std::fmt;

/// Why a structure stream could not be walked.
///
/// Callers use [`StreamError::code`] to tell "malformed before any element"
/// (-1) from "stopped at element k" (-2, -3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Outer type tag undecodable.
    MissingType,
    /// Array element count undecodable.
    MissingCount,
    /// Arrays nested deeper than the decoder allows.
    TooDeep,
    /// Length prefix of an element undecodable or larger than the input.
    ElementLength { index: u32 },
    /// Nested stream of an element failed.
    Element { index: u32, cause: Box<StreamError> },
}

impl StreamError {
    /// Stable status code.
    pub fn code(&self) -> i32 {
        match self {
            Self::MissingType | Self::MissingCount | Self::TooDeep => -1,
            Self::ElementLength { .. } => -2,
            Self::Element { .. } => -3,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingType => write!(f, "Struct stream has no type tag"),
            Self::MissingCount => write!(f, "Struct array has no element count"),
            Self::TooDeep => write!(f, "Struct arrays nested deeper than {}", MAX_NESTING_DEPTH),
            Self::ElementLength { index } => {
                write!(f, "Bad length prefix for array element {}", index)
            }
            Self::Element { index, cause } => write!(f, "Array element {}: {}", index, cause),
        }
    }
}

impl std::error::Error for StreamError {}

/// Walk a structure stream, calling `visit(type_id, definition, body)` for
/// every leaf structure in encoding order.
///
/// The definition is `None` for type ids the registry does not know; the
/// visitor decides whether that matters. Returns the number of leaves visited.
pub fn iterate_structs<F>(
    types: &TypeRegistry,
    src: &[u8],
    mut visit: F,
) -> core::result::Result<usize, StreamError>
where
    F: FnMut(u32, Option<&StructDefinition>, &[u8]),
{
    let mut visited = 0;
    walk(types, src, &mut visit, &mut visited, 0)?;
    Ok(visited)
}

fn walk<F>(
    types: &TypeRegistry,
    src: &[u8],
    visit: &mut F,
    visited: &mut usize,
    depth: usize,
) -> core::result::Result<(), StreamError>
where
    F: FnMut(u32, Option<&StructDefinition>, &[u8]),
{
    if depth > MAX_NESTING_DEPTH {
        return Err(StreamError::TooDeep);
    }

    let mut r = XdrReader::new(src);
    let type_id = r.decode_u32().map_err(|_| StreamError::MissingType)?;

    if type_id != OPAQUE_STRUCT_ARRAY_TYPE {
        visit(type_id, types.get(type_id), r.rest());
        *visited += 1;
        return Ok(());
    }

    let count = r.decode_u32().map_err(|_| StreamError::MissingCount)?;
    for index in 0..count {
        let len = r
            .decode_u32()
            .map_err(|_| StreamError::ElementLength { index })?;
        let element = r
            .take(len as usize)
            .map_err(|_| StreamError::ElementLength { index })?;
        walk(types, element, visit, visited, depth + 1).map_err(|cause| StreamError::Element {
            index,
            cause: Box::new(cause),
        })?;
    }
    Ok(())
}

/// Encode `elements` as one opaque struct array stream.
///
/// Each element is encoded through [`TypeRegistry::encode_opaque`], so an
/// element larger than the default encode buffer is grown once.
pub fn encode_struct_array(types: &TypeRegistry, elements: &[StructValue]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(8 + elements.len() * 16);
    out.extend_from_slice(&OPAQUE_STRUCT_ARRAY_TYPE.to_be_bytes());
    out.extend_from_slice(&(elements.len() as u32).to_be_bytes());
    for element in elements {
        let payload = types.encode_opaque(element)?;
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&payload);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xdr::schema::{FieldDefinition, FieldKind};
    use crate::xdr::value::Value;

    const COUNTER: &[FieldDefinition] = &[FieldDefinition::new(FieldKind::U32, "count")];

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.register(StructDefinition::with_fields(0x400, "Counter", COUNTER), false);
        types
    }

    fn counter(n: u32) -> StructValue {
        StructValue::new(0x400, vec![Value::U32(n)])
    }

    fn collect(types: &TypeRegistry, src: &[u8]) -> (core::result::Result<usize, StreamError>, Vec<u32>) {
        let mut seen = Vec::new();
        let result = iterate_structs(types, src, |type_id, def, body| {
            assert_eq!(type_id, 0x400);
            let (value, _) = types.decode_struct(def.unwrap().type_id, body, body.len()).unwrap();
            seen.push(value.fields[0].as_u32().unwrap());
        });
        (result, seen)
    }

    #[test]
    fn test_array_visits_in_order() {
        let types = types();
        let stream = encode_struct_array(&types, &[counter(1), counter(2), counter(3)]).unwrap();

        let (result, seen) = collect(&types, &stream);
        assert_eq!(result, Ok(3));
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_corrupt_second_length_stops_before_third() {
        let types = types();
        let mut stream = encode_struct_array(&types, &[counter(1), counter(2), counter(3)]).unwrap();
        // tag(4) + count(4) + len(4) + element(8) = offset of the 2nd length
        stream[20..24].copy_from_slice(&0xFFFF_0000u32.to_be_bytes());

        let (result, seen) = collect(&types, &stream);
        let err = result.unwrap_err();
        assert_eq!(err, StreamError::ElementLength { index: 1 });
        assert_eq!(err.code(), -2);
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn test_short_element_is_nested_failure() {
        let types = types();
        let mut stream = encode_struct_array(&types, &[counter(1), counter(2)]).unwrap();
        // Shrink the 2nd element to two bytes: too short for its type tag.
        stream[20..24].copy_from_slice(&2u32.to_be_bytes());

        let (result, seen) = collect(&types, &stream);
        let err = result.unwrap_err();
        assert_eq!(err.code(), -3);
        assert!(matches!(err, StreamError::Element { index: 1, .. }));
        assert_eq!(seen, vec![1]);
    }

    #[test]
    fn test_malformed_before_any_element() {
        let types = types();
        assert_eq!(collect(&types, &[0, 0]).0, Err(StreamError::MissingType));
        assert_eq!(
            collect(&types, &OPAQUE_STRUCT_ARRAY_TYPE.to_be_bytes()).0,
            Err(StreamError::MissingCount)
        );
        assert_eq!(StreamError::MissingCount.code(), -1);
    }

    #[test]
    fn test_plain_struct_is_single_leaf() {
        let types = types();
        let payload = types.encode_opaque(&counter(9)).unwrap();
        let (result, seen) = collect(&types, &payload);
        assert_eq!(result, Ok(1));
        assert_eq!(seen, vec![9]);
    }

    #[test]
    fn test_nested_arrays_are_bounded() {
        // Each level is an array of one element containing the next level.
        let mut stream = counter_stream();
        for _ in 0..(MAX_NESTING_DEPTH + 2) {
            let mut outer = Vec::new();
            outer.extend_from_slice(&OPAQUE_STRUCT_ARRAY_TYPE.to_be_bytes());
            outer.extend_from_slice(&1u32.to_be_bytes());
            outer.extend_from_slice(&(stream.len() as u32).to_be_bytes());
            outer.extend_from_slice(&stream);
            stream = outer;
        }
        let types = types();
        let result = iterate_structs(&types, &stream, |_, _, _| {});
        assert_eq!(result.unwrap_err().code(), -3);
    }

    fn counter_stream() -> Vec<u8> {
        types().encode_opaque(&counter(0)).unwrap()
    }
}
