//! Error taxonomy for the store.
//!
//! Every fallible operation in this crate returns [`StoreError`]. Filesystem
//! failures are wrapped with enough context to locate the offending path;
//! on-disk integrity failures (malformed objects, corrupt packs) are
//! distinguished from ordinary not-found lookups so callers can tell a
//! missing key from a damaged repository.

use crate::objects::ObjectId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} is not a repository")]
    RepositoryMissing(PathBuf),

    #[error("object {0} not found")]
    NotFound(ObjectId),

    #[error("malformed object {0:?}: {1}")]
    MalformedObject(Option<ObjectId>, String),

    #[error("{0} is not a loose object file")]
    NotLooseObject(PathBuf),

    #[error("corrupt pack {0}: {1}")]
    CorruptPack(PathBuf, String),

    #[error("unsupported pack index version {0}")]
    UnknownPackVersion(u32),

    #[error("unknown object kind {0:?}")]
    UnknownKind(String),

    #[error("delta chain for {0} exceeds the maximum resolution depth")]
    DeltaLoop(ObjectId),

    #[error("could not acquire lock on {0}")]
    LockContention(PathBuf),

    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("a transaction is already in progress on this thread")]
    NestedTransaction,

    #[error("invalid path {0:?}: {1}")]
    InvalidPath(String, String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
