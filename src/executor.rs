// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Memoizing call executor
//!
//! [`CheckpointExecutor`] wraps checkpointed function bodies. On invocation
//! it fingerprints the call, replays persisted outputs on a store hit, and
//! only on a miss runs the body, persisting its outputs before returning.
//! Body side effects (tracing, appends to external sinks) therefore happen
//! at most once per fingerprint over the lifetime of the store.
//!
//! Concurrent callers with an equal fingerprint are single-flighted: one of
//! them executes the body while the rest wait on a per-fingerprint gate and
//! then read the persisted result. Calls with distinct fingerprints never
//! wait on each other.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use xptcache::{CheckpointExecutor, MemoryStore, Value};
//!
//! # async fn example() -> xptcache::Result<()> {
//! let executor = CheckpointExecutor::new(Arc::new(MemoryStore::new()));
//!
//! let args = vec![Value::Int(10)];
//! let outputs = executor
//!     .invoke("double", &args, || async { Ok(vec![Value::Int(20)]) })
//!     .await?;
//! assert_eq!(outputs, vec![Value::Int(20)]);
//!
//! // Structurally-equal call: replayed, body not executed
//! let replayed = executor
//!     .invoke("double", &args, || async { unreachable!("skipped on hit") })
//!     .await?;
//! assert_eq!(replayed, outputs);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::store::CheckpointStore;
use crate::value::Value;

/// Wraps checkpointed function calls with fingerprint-keyed memoization.
///
/// Cheap to clone; clones share the store and the in-flight table.
#[derive(Clone)]
pub struct CheckpointExecutor {
    store: Arc<dyn CheckpointStore>,
    in_flight: Arc<DashMap<Fingerprint, Arc<Mutex<()>>>>,
}

impl CheckpointExecutor {
    /// Create an executor over an injected store.
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            store,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Invoke the checkpointed function `function_id` with `args`.
    ///
    /// On a store hit, returns the persisted outputs without running `body`.
    /// On a miss, runs `body`, persists its outputs, and returns them. If
    /// `body` fails, nothing is persisted and the error propagates; the next
    /// equal call re-attempts execution from scratch. Store errors
    /// ([`Conflict`](crate::Error::Conflict), I/O) propagate unchanged.
    ///
    /// Cancellation-safe: dropping this future releases the per-fingerprint
    /// gate, so waiting callers are unblocked and one of them re-attempts.
    pub async fn invoke<F, Fut>(
        &self,
        function_id: &str,
        args: &[Value],
        body: F,
    ) -> Result<Vec<Value>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Value>>>,
    {
        let key = fingerprint(function_id, args);

        // Fast path: already persisted, replay without touching the gate.
        if let Some(outputs) = self.store.get(&key).await? {
            debug!(function_id, %key, "checkpoint hit, replaying persisted outputs");
            return Ok(outputs);
        }

        // Single-flight gate per fingerprint. The shard lock is released
        // before any await.
        let gate = {
            let entry = self.in_flight.entry(key).or_default();
            Arc::clone(entry.value())
        };
        let guard = GateGuard {
            in_flight: &self.in_flight,
            key,
            gate,
        };
        let _leader = guard.gate.lock().await;

        // A previous leader may have persisted while we waited.
        if let Some(outputs) = self.store.get(&key).await? {
            debug!(function_id, %key, "checkpoint persisted by concurrent leader");
            return Ok(outputs);
        }

        debug!(function_id, %key, "checkpoint miss, executing body");
        let outputs = body().await?;
        self.store.put(&key, &outputs).await?;
        Ok(outputs)
    }
}

impl std::fmt::Debug for CheckpointExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointExecutor")
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

/// Removes the in-flight entry when the last interested caller leaves,
/// including on cancellation, so a dropped leader cannot leak its gate.
struct GateGuard<'a> {
    in_flight: &'a DashMap<Fingerprint, Arc<Mutex<()>>>,
    key: Fingerprint,
    gate: Arc<Mutex<()>>,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        // Only remove our own generation of the gate, and only when no other
        // caller still holds it (count: map's reference + ours). A later
        // generation created after removal is someone else's to clean up.
        self.in_flight
            .remove_if(&self.key, |_, gate| {
                Arc::ptr_eq(gate, &self.gate) && Arc::strong_count(gate) <= 2
            });
    }
}
