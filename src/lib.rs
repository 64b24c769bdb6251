// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! # xptcache - checkpointed call cache
//!
//! Memoizes calls to checkpointed functions over composite values. A call is
//! identified by a fingerprint of its function id and canonicalized
//! arguments; the outputs of the first execution are persisted, and every
//! later structurally-equal call replays them without running the body, so
//! body side effects happen at most once per fingerprint, surviving process
//! restarts with a durable store.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ CheckpointExecutor ──▶ fingerprint(fn id, canonical args)
//!                  │                        │
//!                  │                 Value Codec (canonicalize)
//!                  ▼
//!           CheckpointStore lookup ── hit ──▶ persisted outputs ──▶ caller
//!                  │
//!                 miss
//!                  ▼
//!           execute body ──▶ store.put(fingerprint, outputs) ──▶ caller
//! ```
//!
//! Concurrent callers with an equal fingerprint are single-flighted: exactly
//! one executes the body, the rest wait and read the persisted result.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xptcache::{CheckpointExecutor, FileStore, Value};
//!
//! let store = Arc::new(FileStore::new("./checkpoints")?);
//! let executor = CheckpointExecutor::new(store);
//!
//! let args = vec![
//!     Value::Int(10),
//!     Value::List(vec![Value::blob(*b"hello"), Value::blob(*b"world")]),
//! ];
//! let outputs = executor
//!     .invoke("arrayf", &args, || async { /* run the real body */ })
//!     .await?;
//! ```
//!
//! # Guarantees
//!
//! - **Determinism replay**: equal calls against an unchanged store return
//!   structurally-equal outputs; replays skip the body entirely.
//! - **Conflict detection**: a non-deterministic checkpointed function that
//!   produces different outputs for the same fingerprint is surfaced as
//!   [`Error::Conflict`] instead of silently rewriting history.
//! - **No persisted failures**: a failing body leaves no record; the next
//!   equal call re-executes from scratch.

pub mod codec;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod store;
pub mod value;

pub use error::{Error, Result};
pub use executor::CheckpointExecutor;
pub use fingerprint::{fingerprint, Fingerprint};
pub use store::{CheckpointRecord, CheckpointStore, FileStore, FlushPolicy, MemoryStore};
pub use value::{Bag, Value};
