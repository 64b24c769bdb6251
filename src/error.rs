// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Error types for the checkpoint cache
//!
//! Every failure mode a caller can observe is a variant of [`Error`]. The
//! store and codec never swallow errors and never retry; retry policy belongs
//! to the workflow layer driving [`crate::CheckpointExecutor`].

use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Checkpoint cache error taxonomy.
///
/// # Example
///
/// ```rust
/// use xptcache::Error;
///
/// fn handle(err: Error) {
///     match err {
///         Error::Conflict { fingerprint, .. } => {
///             eprintln!("non-deterministic checkpointed function at {fingerprint}");
///         }
///         Error::IntegrityCheckFailed { path, reason } => {
///             eprintln!("corrupt checkpoint file {path}: {reason}");
///         }
///         other => eprintln!("checkpoint error: {other}"),
///     }
/// }
/// ```
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// Decoder encountered a value tag outside the supported set.
    #[error("Unsupported value type tag 0x{tag:02x} at byte offset {offset}")]
    UnsupportedType {
        /// The unrecognized tag byte.
        tag: u8,
        /// Byte offset of the tag within the canonical form.
        offset: usize,
    },

    /// A `put` tried to overwrite an existing record with different outputs.
    ///
    /// This signals a non-deterministic checkpointed function: the same
    /// fingerprint produced two different output tuples. The original record
    /// is left untouched.
    #[error("Checkpoint conflict for fingerprint {fingerprint}: stored outputs differ from new outputs")]
    Conflict {
        /// Hex fingerprint of the conflicting record.
        fingerprint: String,
    },

    /// Serialization of a checkpoint record failed.
    #[error("Checkpoint serialization failed: {reason}")]
    SerializationFailed {
        /// Detailed reason for serialization failure.
        reason: String,
    },

    /// Deserialization of a checkpoint record or canonical form failed.
    #[error("Checkpoint deserialization failed: {reason}")]
    DeserializationFailed {
        /// Detailed reason for deserialization failure.
        reason: String,
    },

    /// Checkpoint integrity check failed (corruption detected).
    #[error("Checkpoint integrity check failed for '{path}': {reason}")]
    IntegrityCheckFailed {
        /// Path of the file that failed its integrity check.
        path: String,
        /// Reason for integrity failure.
        reason: String,
    },

    /// Cross-process lock acquisition failed.
    #[error("Failed to acquire checkpoint lock at '{path}': {reason}")]
    LockFailed {
        /// Path where the lock was attempted.
        path: String,
        /// Reason for lock failure.
        reason: String,
    },

    /// I/O error during a checkpoint operation.
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking filesystem task was cancelled or panicked.
    #[error("Checkpoint task join error: {reason}")]
    Join {
        /// Description of the join failure.
        reason: String,
    },
}

impl Error {
    /// Returns true if retrying the operation may succeed.
    ///
    /// Conflicts and corruption are permanent; lock contention and I/O
    /// failures are environmental and worth a retry at the workflow layer.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Io(_) | Error::LockFailed { .. } | Error::Join { .. })
    }

    pub(crate) fn join(e: tokio::task::JoinError) -> Self {
        Error::Join {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_not_recoverable() {
        let err = Error::Conflict {
            fingerprint: "ab".repeat(32),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_io_is_recoverable() {
        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_unsupported_type_display_includes_tag() {
        let err = Error::UnsupportedType {
            tag: 0x7f,
            offset: 3,
        };
        assert!(err.to_string().contains("0x7f"));
        assert!(err.to_string().contains("offset 3"));
    }
}
