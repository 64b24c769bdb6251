// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! File-backed checkpoint store
//!
//! Stores one record per fingerprint as `<hex-fingerprint>.ckpt` under a
//! directory. Each file is framed as:
//!
//! ```text
//! magic "XPTC" (4 bytes) | format version (u32 LE) | CRC32 of payload (u32 LE) | bincode payload
//! ```
//!
//! Writes are crash-consistent: the record is written to a temp file, synced
//! per the configured [`FlushPolicy`], then renamed into place, so readers
//! only ever observe complete records. A directory-level `fs2` advisory lock
//! serializes writers across processes during `put`, which is what makes the
//! conflict check sound when several workers share the store directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use xptcache::{FileStore, FlushPolicy};
//!
//! let store = FileStore::new("./checkpoints")?;
//!
//! // Trade durability for throughput, like ADLB's no-flush mode
//! let fast = FileStore::new("./checkpoints")?.with_flush_policy(FlushPolicy::Never);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tracing::{debug, warn};

use crate::codec::canonicalize_tuple;
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::store::{CheckpointRecord, CheckpointStore, RECORD_FORMAT_VERSION};
use crate::value::Value;

/// Magic bytes at the head of every record file.
const MAGIC: &[u8; 4] = b"XPTC";

/// Frame header size: magic + format version + checksum.
const HEADER_LEN: usize = 12;

/// When record files are fsync'd.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum FlushPolicy {
    /// Sync every record to stable storage before `put` returns (default).
    /// Required for the resume-after-crash guarantee.
    #[default]
    Always,
    /// Never fsync; leave flushing to the OS. Faster, but records written
    /// shortly before a crash may be lost.
    Never,
}

/// Durable file-per-record checkpoint store.
pub struct FileStore {
    directory: PathBuf,
    flush: FlushPolicy,
}

impl FileStore {
    /// Create a store rooted at `directory`, creating it if needed
    /// (synchronous).
    ///
    /// # Note
    ///
    /// This constructor performs blocking filesystem operations. If called
    /// from an async context, consider using [`Self::new_async`] instead.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            flush: FlushPolicy::default(),
        })
    }

    /// Create a store rooted at `directory` (async).
    pub async fn new_async(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;
        Ok(Self {
            directory,
            flush: FlushPolicy::default(),
        })
    }

    /// Set the flush policy.
    #[must_use]
    pub fn with_flush_policy(mut self, flush: FlushPolicy) -> Self {
        self.flush = flush;
        self
    }

    /// Current flush policy.
    pub fn flush_policy(&self) -> FlushPolicy {
        self.flush
    }

    /// Store directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File path holding the record for `fingerprint`.
    fn record_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.directory.join(format!("{fingerprint}.ckpt"))
    }

    /// Path of the writer lock file.
    fn lock_path(&self) -> PathBuf {
        self.directory.join("store.lock")
    }

    /// Acquire the cross-process writer lock. Released when the returned
    /// handle is dropped.
    fn acquire_write_lock(lock_path: &Path) -> Result<File> {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)
            .map_err(|e| Error::LockFailed {
                path: lock_path.display().to_string(),
                reason: format!("opening lock file: {e}"),
            })?;
        lock_file.lock_exclusive().map_err(|e| Error::LockFailed {
            path: lock_path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(lock_file)
    }
}

/// Frame a record for disk.
fn encode_record(record: &CheckpointRecord) -> Result<Vec<u8>> {
    let payload = bincode::serialize(record).map_err(|e| Error::SerializationFailed {
        reason: format!("failed to serialize checkpoint record: {e}"),
    })?;
    let checksum = crc32fast::hash(&payload);

    let mut framed = Vec::with_capacity(HEADER_LEN + payload.len());
    framed.extend_from_slice(MAGIC);
    framed.extend_from_slice(&RECORD_FORMAT_VERSION.to_le_bytes());
    framed.extend_from_slice(&checksum.to_le_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

/// Parse and verify a framed record read from `path`.
fn decode_record(path: &Path, data: &[u8]) -> Result<CheckpointRecord> {
    let integrity = |reason: String| Error::IntegrityCheckFailed {
        path: path.display().to_string(),
        reason,
    };

    if data.len() < HEADER_LEN {
        return Err(integrity(format!(
            "file too short: {} bytes, header needs {HEADER_LEN}",
            data.len()
        )));
    }
    if &data[0..4] != MAGIC {
        return Err(integrity("bad magic bytes".to_string()));
    }

    let version = u32::from_le_bytes(data[4..8].try_into().expect("4 bytes"));
    if version != RECORD_FORMAT_VERSION {
        return Err(Error::DeserializationFailed {
            reason: format!(
                "unsupported record format version {version}, expected {RECORD_FORMAT_VERSION}"
            ),
        });
    }

    let expected = u32::from_le_bytes(data[8..12].try_into().expect("4 bytes"));
    let payload = &data[HEADER_LEN..];
    let actual = crc32fast::hash(payload);
    if actual != expected {
        return Err(integrity(format!(
            "checksum mismatch: stored {expected:08x}, computed {actual:08x}"
        )));
    }

    bincode::deserialize(payload).map_err(|e| Error::DeserializationFailed {
        reason: format!("failed to deserialize checkpoint record: {e}"),
    })
}

/// Read and verify the record at `path`, or `None` if it does not exist.
fn read_record(path: &Path) -> Result<Option<CheckpointRecord>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(Some(decode_record(path, &data)?))
}

/// Write `framed` to `path` via temp file + atomic rename.
fn write_record_atomic(path: &Path, framed: &[u8], flush: FlushPolicy) -> Result<()> {
    let tmp_path = path.with_extension("ckpt.tmp");
    let mut tmp = File::create(&tmp_path)?;
    tmp.write_all(framed)?;
    if flush == FlushPolicy::Always {
        tmp.sync_all()?;
    }
    drop(tmp);

    if let Err(e) = fs::rename(&tmp_path, path) {
        // Leave no partial temp file behind on failure
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl CheckpointStore for FileStore {
    async fn contains(&self, fingerprint: &Fingerprint) -> Result<bool> {
        // Temp files never occupy the final path, so existence implies a
        // complete record.
        let path = self.record_path(fingerprint);
        tokio::task::spawn_blocking(move || path.try_exists())
            .await
            .map_err(Error::join)?
            .map_err(Error::from)
    }

    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<Value>>> {
        let path = self.record_path(fingerprint);
        let wanted = *fingerprint;
        tokio::task::spawn_blocking(move || {
            let Some(record) = read_record(&path)? else {
                return Ok(None);
            };
            if record.fingerprint != wanted {
                warn!(path = %path.display(), "record fingerprint does not match file name");
                return Err(Error::IntegrityCheckFailed {
                    path: path.display().to_string(),
                    reason: format!(
                        "record fingerprint {} does not match requested {wanted}",
                        record.fingerprint
                    ),
                });
            }
            Ok(Some(record.outputs))
        })
        .await
        .map_err(Error::join)?
    }

    async fn put(&self, fingerprint: &Fingerprint, outputs: &[Value]) -> Result<()> {
        let path = self.record_path(fingerprint);
        let lock_path = self.lock_path();
        let flush = self.flush;
        let fingerprint = *fingerprint;
        let outputs = outputs.to_vec();

        tokio::task::spawn_blocking(move || {
            // Writer lock held across check-and-write: conflicting puts are
            // serialized even across processes sharing the directory.
            let lock_file = Self::acquire_write_lock(&lock_path)?;

            let result = (|| {
                if let Some(existing) = read_record(&path)? {
                    if canonicalize_tuple(&existing.outputs) == canonicalize_tuple(&outputs) {
                        debug!(%fingerprint, "re-put of equal outputs, no-op");
                        return Ok(());
                    }
                    return Err(Error::Conflict {
                        fingerprint: fingerprint.to_hex(),
                    });
                }

                let record = CheckpointRecord::new(fingerprint, outputs);
                let framed = encode_record(&record)?;
                write_record_atomic(&path, &framed, flush)?;
                debug!(%fingerprint, bytes = framed.len(), "persisted checkpoint record");
                Ok(())
            })();

            let _ = FileExt::unlock(&lock_file);
            result
        })
        .await
        .map_err(Error::join)?
    }
}
