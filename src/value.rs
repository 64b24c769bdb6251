// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Dynamic value model for checkpointed call arguments and outputs
//!
//! Checkpointed functions exchange heterogeneous data: scalars, blobs,
//! ordered sequences, and bags (unordered multisets). [`Value`] is the closed
//! tagged variant covering all of them; everything that crosses the
//! checkpoint boundary is a `Value`.
//!
//! Equality is structural, never identity-based:
//!
//! - Floats compare by bit pattern, so the relation is a total equivalence
//!   (NaN equals NaN, `+0.0` differs from `-0.0`). Fingerprinting requires a
//!   deterministic equivalence and IEEE `==` is not one.
//! - Lists compare elementwise in order.
//! - Bags compare as multisets: two bags built by inserting the same elements
//!   in different orders are equal.
//!
//! # Example
//!
//! ```rust
//! use xptcache::{Bag, Value};
//!
//! let a: Bag = [Value::Int(1), Value::Int(2), Value::Int(2)].into_iter().collect();
//! let b: Bag = [Value::Int(2), Value::Int(1), Value::Int(2)].into_iter().collect();
//! assert_eq!(a, b);
//!
//! let list_a = Value::List(vec![Value::Int(1), Value::Int(2)]);
//! let list_b = Value::List(vec![Value::Int(2), Value::Int(1)]);
//! assert_ne!(list_a, list_b);
//! ```

use serde::{Deserialize, Serialize};

use crate::codec;

/// A value passed into or returned from a checkpointed function call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Value {
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit IEEE float. Compared and fingerprinted by bit pattern.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Opaque byte blob.
    Blob(Vec<u8>),
    /// Ordered sequence; order is significant.
    List(Vec<Value>),
    /// Unordered multiset; order is not significant.
    Bag(Bag),
}

impl Value {
    /// Build a blob value from anything byte-like.
    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Blob(bytes.into())
    }

    /// Build a string value.
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Short name of the variant, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Blob(_) => "blob",
            Value::List(_) => "list",
            Value::Bag(_) => "bag",
        }
    }

    /// Returns the integer if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the float if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bytes if this is a `Blob`.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the elements if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the bag if this is a `Bag`.
    pub fn as_bag(&self) -> Option<&Bag> {
        match self {
            Value::Bag(bag) => Some(bag),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Bag(a), Value::Bag(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Bag> for Value {
    fn from(bag: Bag) -> Self {
        Value::Bag(bag)
    }
}

/// Unordered multiset of values.
///
/// Supports incremental insertion and duplicate elements. Insertion order is
/// retained internally for cheap appends but is irrelevant to equality and
/// fingerprinting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bag {
    items: Vec<Value>,
}

impl Bag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element. Duplicates are kept.
    pub fn insert(&mut self, value: impl Into<Value>) {
        self.items.push(value.into());
    }

    /// Number of elements, counting duplicates.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the bag holds no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate over elements in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }
}

impl PartialEq for Bag {
    /// Multiset equality: same multiplicity of each distinct element.
    ///
    /// Compares sorted canonical encodings, the same equivalence the
    /// fingerprint uses.
    fn eq(&self, other: &Self) -> bool {
        if self.items.len() != other.items.len() {
            return false;
        }
        let mut lhs: Vec<Vec<u8>> = self.items.iter().map(codec::canonicalize).collect();
        let mut rhs: Vec<Vec<u8>> = other.items.iter().map(codec::canonicalize).collect();
        lhs.sort_unstable();
        rhs.sort_unstable();
        lhs == rhs
    }
}

impl Eq for Bag {}

impl FromIterator<Value> for Bag {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl Extend<Value> for Bag {
    fn extend<I: IntoIterator<Item = Value>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl From<Vec<Value>> for Bag {
    fn from(items: Vec<Value>) -> Self {
        Self { items }
    }
}

impl<'a> IntoIterator for &'a Bag {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
