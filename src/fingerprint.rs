// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Call fingerprinting
//!
//! A [`Fingerprint`] is the deterministic identity of one checkpointed call:
//! SHA-256 over the function identifier and the canonical encodings of its
//! arguments, each length-prefixed so distinct argument splits cannot
//! collide by concatenation.
//!
//! Two calls with the same function identifier and structurally-equal
//! argument lists always produce the same fingerprint; bags fingerprint
//! order-independently, lists order-dependently, both inherited from the
//! canonical codec.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec::canonicalize;
use crate::value::Value;

/// Deterministic identity of a (function, arguments) pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering, as used for store file names.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a fingerprint from its hex rendering.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let digest: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(digest))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

/// Compute the fingerprint of a call to `function_id` with `args`.
///
/// Pure: no side effects, no dependence on anything but the inputs.
///
/// # Example
///
/// ```rust
/// use xptcache::{fingerprint, Value};
///
/// let a = fingerprint("arrayf", &[Value::Int(10)]);
/// let b = fingerprint("arrayf", &[Value::Int(10)]);
/// assert_eq!(a, b);
/// assert_ne!(a, fingerprint("g", &[Value::Int(10)]));
/// ```
pub fn fingerprint(function_id: &str, args: &[Value]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update((function_id.len() as u64).to_le_bytes());
    hasher.update(function_id.as_bytes());
    hasher.update((args.len() as u64).to_le_bytes());
    for arg in args {
        let encoded = canonicalize(arg);
        hasher.update((encoded.len() as u64).to_le_bytes());
        hasher.update(&encoded);
    }
    Fingerprint(hasher.finalize().into())
}
