// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! In-memory checkpoint store
//!
//! Keeps records in a `HashMap` behind an async `RwLock`. Useful for tests
//! and short-lived runs; provides every store invariant except durability
//! across process restarts. For that, use [`FileStore`](super::FileStore).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::codec::canonicalize_tuple;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::store::CheckpointStore;
use crate::value::Value;

/// In-process checkpoint store.
///
/// # Example
///
/// ```rust
/// use xptcache::{fingerprint, CheckpointStore, MemoryStore, Value};
///
/// # async fn example() -> xptcache::Result<()> {
/// let store = MemoryStore::new();
/// let key = fingerprint("f", &[Value::Int(1)]);
///
/// assert!(store.get(&key).await?.is_none());
/// store.put(&key, &[Value::Int(2)]).await?;
/// assert_eq!(store.get(&key).await?, Some(vec![Value::Int(2)]));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<Fingerprint, Vec<Value>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn contains(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.records.read().await.contains_key(fingerprint))
    }

    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<Value>>> {
        Ok(self.records.read().await.get(fingerprint).cloned())
    }

    async fn put(&self, fingerprint: &Fingerprint, outputs: &[Value]) -> Result<()> {
        // Write lock held across check-and-insert: conflicting puts for the
        // same fingerprint are serialized here.
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(fingerprint) {
            if canonicalize_tuple(existing) == canonicalize_tuple(outputs) {
                debug!(%fingerprint, "re-put of equal outputs, no-op");
                return Ok(());
            }
            return Err(Error::Conflict {
                fingerprint: fingerprint.to_hex(),
            });
        }
        debug!(%fingerprint, outputs = outputs.len(), "stored checkpoint record");
        records.insert(*fingerprint, outputs.to_vec());
        Ok(())
    }
}
