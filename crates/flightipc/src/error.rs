// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the command messaging core.

use std::fmt;
use std::io;

/// Result type for flightipc operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for flightipc
///
/// Every failure in the core degrades to "log and drop" for inbound traffic or
/// to a status code for the command-line sender; nothing here is fatal to the
/// hosting process.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Codec Errors
    // ========================================================================
    /// Encode target too small. `needed` is the full size the value requires.
    BufferTooSmall { needed: usize, available: usize },
    /// Input ended before the value was complete.
    Truncated { needed: usize, available: usize },
    /// String payload was not valid UTF-8.
    InvalidUtf8,
    /// No StructDefinition registered for this type id.
    UnknownType(u32),
    /// Value does not match the kind declared by its field definition.
    KindMismatch { field: &'static str },
    /// Struct value carries the wrong number of fields for its definition.
    FieldCount { type_id: u32, expected: usize, found: usize },
    /// Encoder still overflowed after the single resize retry.
    EncodeRetryExhausted { type_id: u32, needed: usize },
    /// Operation requires a field-table codec but the struct uses a custom one.
    NotFieldTable(u32),
    /// Struct/union nesting exceeded the decoder's depth bound.
    NestingTooDeep(usize),

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// Datagram does not start with the structured-format sentinel byte.
    MissingSentinel(u8),
    /// Text could not be converted into the field's binary representation.
    Scan { key: &'static str, input: String },
    /// Command name or id is not registered.
    UnknownCommand(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// I/O error with underlying cause.
    Io(io::Error),
    /// Host or service name could not be resolved.
    Resolve(String),
    /// No response arrived before the deadline.
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BufferTooSmall { needed, available } => write!(
                f,
                "Buffer too small: need {} bytes, have {}",
                needed, available
            ),
            Error::Truncated { needed, available } => write!(
                f,
                "Truncated input: need {} bytes, have {}",
                needed, available
            ),
            Error::InvalidUtf8 => write!(f, "String is not valid UTF-8"),
            Error::UnknownType(id) => write!(f, "Unknown struct type 0x{:08x}", id),
            Error::KindMismatch { field } => write!(f, "Value kind mismatch for field {}", field),
            Error::FieldCount {
                type_id,
                expected,
                found,
            } => write!(
                f,
                "Struct 0x{:08x} expects {} fields, value has {}",
                type_id, expected, found
            ),
            Error::EncodeRetryExhausted { type_id, needed } => write!(
                f,
                "Encoder for 0x{:08x} still needs {} bytes after resize",
                type_id, needed
            ),
            Error::NotFieldTable(id) => {
                write!(f, "Struct 0x{:08x} does not use a field table", id)
            }
            Error::NestingTooDeep(depth) => write!(f, "Nesting deeper than {} levels", depth),
            Error::MissingSentinel(b) => {
                write!(f, "Expected structured sentinel 0x00, found 0x{:02x}", b)
            }
            Error::Scan { key, input } => write!(f, "Cannot parse '{}' for {}", input, key),
            Error::UnknownCommand(name) => write!(f, "Unknown command: {}", name),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Resolve(host) => write!(f, "Cannot resolve {}", host),
            Error::Timeout => write!(f, "Timed out waiting for response"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
