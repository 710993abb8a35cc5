// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! XDR primitive encoder/decoder over caller-supplied buffers.
//!
//! All quantities are big-endian and occupy a multiple of four bytes; strings
//! and byte strings carry a `u32` length prefix and are zero-padded to the next
//! four-byte boundary.
//!
//! The writer never fails mid-value. Once the target buffer is exhausted it
//! keeps counting, so [`XdrWriter::finish`] can report the exact size the
//! value needs. Callers use that to resize once and retry.

use crate::config::{DEFAULT_ENCODE_BUFFER, ENCODE_SLACK};
use crate::error::{Error, Result};

/// Bytes of zero padding needed after `len` payload bytes.
#[inline]
pub const fn padding(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

/// Cursor over an inbound buffer.
///
/// `position()` is the number of bytes consumed so far, the "used" count of
/// every decode.
#[derive(Debug, Clone)]
pub struct XdrReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> XdrReader<'a> {
    /// Create a reader over `buf`. The slice length is the hard `max`.
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Unread tail of the buffer.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Decode u32
    pub fn decode_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    /// Decode i32
    pub fn decode_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    /// Decode u64 (XDR unsigned hyper)
    pub fn decode_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    /// Decode i64 (XDR hyper)
    pub fn decode_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    /// Decode f32
    pub fn decode_f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.take_array()?))
    }

    /// Decode f64
    pub fn decode_f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    /// Decode a length-prefixed, padded byte string.
    ///
    /// The length is checked against the remaining input before anything is
    /// allocated, so a hostile prefix cannot trigger a large allocation.
    pub fn decode_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.decode_u32()? as usize;
        let payload = self.take(len)?;
        self.take(padding(len))?;
        Ok(payload.to_vec())
    }

    /// Decode a length-prefixed, padded UTF-8 string.
    pub fn decode_string(&mut self) -> Result<String> {
        let bytes = self.decode_bytes()?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }
}

/// Cursor over an outbound buffer that measures overflow.
pub struct XdrWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> XdrWriter<'a> {
    /// Create a writer over `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far, or bytes needed once the buffer overflowed.
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Size of the target buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Whether the value so far still fits.
    pub fn fits(&self) -> bool {
        self.pos <= self.buf.len()
    }

    /// Append raw bytes (no length prefix, no padding).
    pub fn put(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end <= self.buf.len() {
            self.buf[self.pos..end].copy_from_slice(bytes);
        }
        self.pos = end;
    }

    fn zero_pad(&mut self, n: usize) {
        self.put(&[0u8; 3][..n]);
    }

    /// Encode u32
    pub fn encode_u32(&mut self, value: u32) {
        self.put(&value.to_be_bytes());
    }

    /// Encode i32
    pub fn encode_i32(&mut self, value: i32) {
        self.put(&value.to_be_bytes());
    }

    /// Encode u64
    pub fn encode_u64(&mut self, value: u64) {
        self.put(&value.to_be_bytes());
    }

    /// Encode i64
    pub fn encode_i64(&mut self, value: i64) {
        self.put(&value.to_be_bytes());
    }

    /// Encode f32
    pub fn encode_f32(&mut self, value: f32) {
        self.put(&value.to_be_bytes());
    }

    /// Encode f64
    pub fn encode_f64(&mut self, value: f64) {
        self.put(&value.to_be_bytes());
    }

    /// Encode a length-prefixed, padded byte string.
    pub fn encode_bytes(&mut self, value: &[u8]) -> Result<()> {
        let len = u32::try_from(value.len()).map_err(|_| Error::BufferTooSmall {
            needed: value.len(),
            available: u32::MAX as usize,
        })?;
        self.encode_u32(len);
        self.put(value);
        self.zero_pad(padding(value.len()));
        Ok(())
    }

    /// Encode a length-prefixed, padded string.
    pub fn encode_string(&mut self, value: &str) -> Result<()> {
        self.encode_bytes(value.as_bytes())
    }

    /// Finish encoding: bytes written, or the size needed on overflow.
    pub fn finish(self) -> Result<usize> {
        if self.fits() {
            Ok(self.pos)
        } else {
            Err(Error::BufferTooSmall {
                needed: self.pos,
                available: self.buf.len(),
            })
        }
    }
}

/// Encode into a fresh buffer, resizing at most once.
///
/// The first attempt uses [`DEFAULT_ENCODE_BUFFER`] bytes. If the encoder
/// reports it needs more, the buffer grows to `needed + ENCODE_SLACK` and the
/// encoder runs one more time. A second overflow means the encoder misreports
/// its size and is a hard error.
pub fn encode_with_retry<F>(type_id: u32, mut encode: F) -> Result<Vec<u8>>
where
    F: FnMut(&mut XdrWriter<'_>) -> Result<()>,
{
    let mut buf = vec![0u8; DEFAULT_ENCODE_BUFFER];
    let needed = {
        let mut w = XdrWriter::new(&mut buf);
        encode(&mut w)?;
        match w.finish() {
            Ok(len) => {
                buf.truncate(len);
                return Ok(buf);
            }
            Err(Error::BufferTooSmall { needed, .. }) => needed,
            Err(e) => return Err(e),
        }
    };

    log::debug!(
        "[XDR] type 0x{:08x} needs {} bytes, retrying with {}",
        type_id,
        needed,
        needed + ENCODE_SLACK
    );
    buf = vec![0u8; needed + ENCODE_SLACK];
    let mut w = XdrWriter::new(&mut buf);
    encode(&mut w)?;
    match w.finish() {
        Ok(len) => {
            buf.truncate(len);
            Ok(buf)
        }
        Err(Error::BufferTooSmall { needed, .. }) => {
            log::warn!(
                "[XDR] encoder for type 0x{:08x} overflowed twice (needs {})",
                type_id,
                needed
            );
            Err(Error::EncodeRetryExhausted { type_id, needed })
        }
        Err(e) => Err(e),
    }
}
