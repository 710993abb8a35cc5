// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Structured command envelope and response header.
//!
//! A structured command is `{u32 command id, u32 parameter type, body}`.
//! Command ids stay below 2^24, so the first byte on the wire is always
//! `0x00`; that byte is what tells the dispatcher a datagram is structured
//! rather than a legacy single-byte command.
//!
//! A response is `{u32 command id, u32 result code}` followed by an optional
//! structure stream (see [`crate::xdr::stream`]).

use crate::error::{Error, Result};
use crate::xdr::{
    encode_struct_array, encode_with_retry, StructValue, TypeRegistry, XdrReader, VOID_TYPE,
};

/// First byte of every structured datagram.
pub const STRUCTURED_SENTINEL: u8 = 0x00;

/// Largest structured command id: the top byte must stay zero.
pub const MAX_COMMAND_ID: u32 = 0x00FF_FFFF;

/// Size of the encoded [`ResponseHeader`].
pub const RESPONSE_HEADER_LEN: usize = 8;

// ============================================================================
// Result Codes
// ============================================================================

/// Command completed.
pub const RESULT_SUCCESS: u32 = 0;
/// No handler for the command id.
pub const RESULT_UNKNOWN_COMMAND: u32 = 1;
/// Parameters missing or of the wrong type.
pub const RESULT_INVALID_PARAMETERS: u32 = 2;
/// Handler ran but could not complete.
pub const RESULT_FAILED: u32 = 3;
/// Command recognised but not supported by this process.
pub const RESULT_UNSUPPORTED: u32 = 4;

// ============================================================================
// Command Envelope
// ============================================================================

/// Decoded structured command.
#[derive(Debug, Clone, PartialEq)]
pub struct IpcCommand {
    pub command: u32,
    /// Parameter union; `None` is the void tag.
    pub parameters: Option<StructValue>,
}

impl IpcCommand {
    /// Command without parameters.
    pub fn new(command: u32) -> Self {
        Self {
            command,
            parameters: None,
        }
    }

    /// Command carrying a parameter block.
    pub fn with_parameters(command: u32, parameters: StructValue) -> Self {
        Self {
            command,
            parameters: Some(parameters),
        }
    }
}

/// Encode a structured command datagram.
pub fn encode_command(types: &TypeRegistry, cmd: &IpcCommand) -> Result<Vec<u8>> {
    if cmd.command == 0 || cmd.command > MAX_COMMAND_ID {
        return Err(Error::UnknownCommand(format!("0x{:08x}", cmd.command)));
    }
    encode_with_retry(cmd.command, |w| {
        w.encode_u32(cmd.command);
        match &cmd.parameters {
            Some(params) => types.encode_tagged(params, w),
            None => {
                w.encode_u32(VOID_TYPE);
                Ok(())
            }
        }
    })
}

/// Decode a structured command datagram.
///
/// The whole datagram must be consumed; trailing bytes are treated as
/// malformed input.
pub fn decode_command(types: &TypeRegistry, datagram: &[u8]) -> Result<IpcCommand> {
    match datagram.first() {
        Some(&STRUCTURED_SENTINEL) => {}
        Some(&b) => return Err(Error::MissingSentinel(b)),
        None => {
            return Err(Error::Truncated {
                needed: 1,
                available: 0,
            })
        }
    }

    let mut r = XdrReader::new(datagram);
    let command = r.decode_u32()?;
    let parameters = match r.decode_u32()? {
        VOID_TYPE => None,
        type_id => Some(types.decode_body(type_id, &mut r)?),
    };
    if r.remaining() != 0 {
        return Err(Error::Truncated {
            needed: r.position(),
            available: datagram.len(),
        });
    }
    Ok(IpcCommand {
        command,
        parameters,
    })
}

// ============================================================================
// Response
// ============================================================================

/// Fixed header at the start of every structured response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub command: u32,
    pub result: u32,
}

impl ResponseHeader {
    /// Whether the result code is [`RESULT_SUCCESS`].
    pub fn is_success(&self) -> bool {
        self.result == RESULT_SUCCESS
    }
}

/// Encode a response: header, then nothing, a single tagged struct, or an
/// opaque struct array when `body` holds more than one structure.
pub fn encode_response(
    types: &TypeRegistry,
    header: ResponseHeader,
    body: &[StructValue],
) -> Result<Vec<u8>> {
    let payload = match body {
        [] => Vec::new(),
        [single] => types.encode_opaque(single)?,
        many => encode_struct_array(types, many)?,
    };
    let mut out = Vec::with_capacity(RESPONSE_HEADER_LEN + payload.len());
    out.extend_from_slice(&header.command.to_be_bytes());
    out.extend_from_slice(&header.result.to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode the response header. Returns the header and its encoded length.
pub fn decode_response_header(src: &[u8]) -> Result<(ResponseHeader, usize)> {
    let mut r = XdrReader::new(src);
    let command = r.decode_u32()?;
    let result = r.decode_u32()?;
    Ok((ResponseHeader { command, result }, r.position()))
}
