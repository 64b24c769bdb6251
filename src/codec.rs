// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Canonical value codec
//!
//! Serializes a [`Value`] into a deterministic, self-delimiting byte form
//! usable both as fingerprint key material and as a persisted payload, and
//! decodes it back losslessly.
//!
//! # Canonical form
//!
//! Each value is a one-byte tag followed by a fixed- or length-prefixed body
//! (lengths and counts are little-endian `u64`):
//!
//! ```text
//! 0x01  int    i64 LE
//! 0x02  float  f64 bit pattern, u64 LE
//! 0x03  str    len, UTF-8 bytes
//! 0x04  blob   len, bytes
//! 0x05  list   count, elements in order
//! 0x06  bag    count, element encodings sorted lexicographically
//! ```
//!
//! Sorting bag element encodings makes the form order-independent: two bags
//! with the same multiplicity of each distinct element encode identically, no
//! matter the insertion order. Lists encode order-dependently.
//!
//! `materialize(canonicalize(v)) == v` for every supported variant at any
//! nesting depth.

use crate::error::{Error, Result};
use crate::value::{Bag, Value};

const TAG_INT: u8 = 0x01;
const TAG_FLOAT: u8 = 0x02;
const TAG_STR: u8 = 0x03;
const TAG_BLOB: u8 = 0x04;
const TAG_LIST: u8 = 0x05;
const TAG_BAG: u8 = 0x06;

/// Encode a value into its canonical byte form.
///
/// Infallible: [`Value`] is a closed enum and every variant has an encoding.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_into(value, &mut buf);
    buf
}

/// Encode an ordered tuple of values (e.g. a call's output list) into one
/// canonical byte form. Used for conflict detection in the store.
pub fn canonicalize_tuple(values: &[Value]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(values.len() as u64).to_le_bytes());
    for value in values {
        encode_into(value, &mut buf);
    }
    buf
}

/// Decode a canonical byte form back into a [`Value`].
///
/// The input must contain exactly one value; trailing bytes are an error.
/// For bags the decoded insertion order is the canonical (sorted) order,
/// which is equal to the original bag under multiset equality.
pub fn materialize(bytes: &[u8]) -> Result<Value> {
    let mut cursor = Cursor::new(bytes);
    let value = cursor.decode_value()?;
    let remaining = cursor.remaining();
    if remaining != 0 {
        return Err(Error::DeserializationFailed {
            reason: format!("{remaining} trailing bytes after canonical value"),
        });
    }
    Ok(value)
}

fn encode_into(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Int(i) => {
            buf.push(TAG_INT);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => {
            buf.push(TAG_FLOAT);
            buf.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        Value::Str(s) => {
            buf.push(TAG_STR);
            buf.extend_from_slice(&(s.len() as u64).to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Blob(b) => {
            buf.push(TAG_BLOB);
            buf.extend_from_slice(&(b.len() as u64).to_le_bytes());
            buf.extend_from_slice(b);
        }
        Value::List(items) => {
            buf.push(TAG_LIST);
            buf.extend_from_slice(&(items.len() as u64).to_le_bytes());
            for item in items {
                encode_into(item, buf);
            }
        }
        Value::Bag(bag) => {
            buf.push(TAG_BAG);
            buf.extend_from_slice(&(bag.len() as u64).to_le_bytes());
            let mut encoded: Vec<Vec<u8>> = bag.iter().map(canonicalize).collect();
            encoded.sort_unstable();
            for element in encoded {
                buf.extend_from_slice(&element);
            }
        }
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_u8(&mut self) -> Result<u8> {
        let byte = *self.buf.get(self.pos).ok_or_else(|| self.truncated(1))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.truncated(len));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a length prefix, bounded by the bytes actually remaining so a
    /// corrupt prefix cannot drive a huge allocation.
    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_u64()?;
        if len > self.remaining() as u64 {
            return Err(Error::DeserializationFailed {
                reason: format!(
                    "length prefix {len} exceeds {} remaining bytes at offset {}",
                    self.remaining(),
                    self.pos
                ),
            });
        }
        Ok(len as usize)
    }

    fn truncated(&self, wanted: usize) -> Error {
        Error::DeserializationFailed {
            reason: format!(
                "truncated canonical form: wanted {wanted} bytes at offset {}, {} remain",
                self.pos,
                self.remaining()
            ),
        }
    }

    fn decode_value(&mut self) -> Result<Value> {
        let offset = self.pos;
        let tag = self.read_u8()?;
        match tag {
            TAG_INT => {
                let bytes = self.read_bytes(8)?;
                Ok(Value::Int(i64::from_le_bytes(
                    bytes.try_into().expect("8 bytes"),
                )))
            }
            TAG_FLOAT => {
                let bits = self.read_u64()?;
                Ok(Value::Float(f64::from_bits(bits)))
            }
            TAG_STR => {
                let len = self.read_len()?;
                let bytes = self.read_bytes(len)?;
                let s = std::str::from_utf8(bytes).map_err(|e| Error::DeserializationFailed {
                    reason: format!("invalid UTF-8 in string value: {e}"),
                })?;
                Ok(Value::Str(s.to_string()))
            }
            TAG_BLOB => {
                let len = self.read_len()?;
                Ok(Value::Blob(self.read_bytes(len)?.to_vec()))
            }
            TAG_LIST => {
                let count = self.read_len()?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.decode_value()?);
                }
                Ok(Value::List(items))
            }
            TAG_BAG => {
                let count = self.read_len()?;
                let mut bag = Bag::new();
                for _ in 0..count {
                    bag.insert(self.decode_value()?);
                }
                Ok(Value::Bag(bag))
            }
            tag => Err(Error::UnsupportedType { tag, offset }),
        }
    }
}
