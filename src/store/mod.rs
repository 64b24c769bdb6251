// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Durable checkpoint storage
//!
//! A [`CheckpointStore`] maps call fingerprints to the output tuples first
//! computed for them. Records are immutable: once `put` succeeds for a
//! fingerprint, every later `get` for that fingerprint returns the same
//! outputs, across process restarts for durable backends.
//!
//! `put` is idempotent-safe. Re-putting structurally-equal outputs is a
//! no-op success; putting *different* outputs for an existing fingerprint
//! fails with [`Error::Conflict`], which flags a checkpointed function that
//! is not deterministic over its declared inputs.
//!
//! Backends:
//! - [`MemoryStore`] - in-process, for tests and short-lived runs
//! - [`FileStore`] - one file per record, crash-consistent, survives restart

pub mod file;
pub mod memory;

use std::time::SystemTime;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::value::Value;

pub use file::{FileStore, FlushPolicy};
pub use memory::MemoryStore;

/// On-disk record format version. Bumped on incompatible layout changes.
pub const RECORD_FORMAT_VERSION: u32 = 1;

/// One persisted checkpoint: the outputs of a single function call.
///
/// Immutable once written. `created_at` records first execution time and
/// plays no part in equality or conflict checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Record layout version, [`RECORD_FORMAT_VERSION`] at write time.
    pub format_version: u32,
    /// Fingerprint of the call that produced these outputs.
    pub fingerprint: Fingerprint,
    /// Ordered output values of the call.
    pub outputs: Vec<Value>,
    /// When the record was first created.
    pub created_at: SystemTime,
}

impl CheckpointRecord {
    /// Build a record for `fingerprint` with the current timestamp.
    pub fn new(fingerprint: Fingerprint, outputs: Vec<Value>) -> Self {
        Self {
            format_version: RECORD_FORMAT_VERSION,
            fingerprint,
            outputs,
            created_at: SystemTime::now(),
        }
    }
}

/// Durable fingerprint-to-outputs mapping.
///
/// Implementations must serialize conflicting `put` calls for the same
/// fingerprint so the conflict check cannot race. A missing record is
/// reported as `Ok(None)` from [`get`](CheckpointStore::get), never as an
/// error; callers that need existence only should prefer
/// [`contains`](CheckpointStore::contains).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Whether a record exists for `fingerprint`.
    async fn contains(&self, fingerprint: &Fingerprint) -> Result<bool> {
        Ok(self.get(fingerprint).await?.is_some())
    }

    /// Fetch the outputs stored for `fingerprint`, if any.
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<Value>>>;

    /// Persist `outputs` for `fingerprint`.
    ///
    /// No-op success when an equal-valued record already exists;
    /// [`Error::Conflict`](crate::Error::Conflict) when the existing record
    /// holds different outputs. Once this returns `Ok`, the record is
    /// readable by any later `get`, for durable backends even after a
    /// process restart.
    async fn put(&self, fingerprint: &Fingerprint, outputs: &[Value]) -> Result<()>;
}
