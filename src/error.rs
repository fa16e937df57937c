//! Error types for the map/reduce execution core.

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapReduceError>;

/// Errors raised anywhere in the execution core: validation at the invoker,
/// retry-exhausted I/O from the chunk-backing store, remote task failure, or
/// cancellation propagated up from a fork/join or RPC subtree.
#[derive(Error, Debug)]
pub enum MapReduceError {
    /// Two input vectors disagree on chunk count or chunk boundaries.
    #[error("vectors are not chunk-aligned: {0}")]
    MisalignedVectors(String),

    /// `map` was defined for more input vectors than the core supports (>2).
    #[error("task map() supports at most 2 input vectors, got {0}")]
    TooManyInputVectors(usize),

    /// A chunk key failed to decode, or an object-store key failed the
    /// encode/decode round trip.
    #[error("malformed key: {0}")]
    InvalidKey(String),

    /// Persistent I/O failure from the chunk-backing store after retries.
    #[error("chunk backing I/O error after retries: {0}")]
    Io(#[from] std::io::Error),

    /// The object store returned a non-retryable error.
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// A `map`, `reduce`, or `init` hook raised an error.
    #[error("user hook failed: {0}")]
    Hook(String),

    /// A remote RPC sub-task failed; its error is captured here rather than
    /// swallowed, per §7 ("never silently swallow an exception from user
    /// code").
    #[error("remote task failed: {0}")]
    RemoteTask(String),

    /// The local fork/join pool or the async runtime failed internally.
    #[error("pool internal error: {0}")]
    PoolInternal(String),

    /// The task tree was cancelled (a sibling failed, or cancellation was
    /// requested explicitly).
    #[error("task cancelled")]
    Cancelled,

    /// The root invocation produced no result at all (e.g. an empty cluster
    /// range reduced to nothing).
    #[error("map/reduce invocation produced no result")]
    NoResult,

    /// Catch-all for conditions not covered above.
    #[error("{0}")]
    Other(String),
}

impl MapReduceError {
    /// Fatal errors fail the invocation outright; they are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MapReduceError::MisalignedVectors(_)
                | MapReduceError::TooManyInputVectors(_)
                | MapReduceError::InvalidKey(_)
                | MapReduceError::Hook(_)
                | MapReduceError::RemoteTask(_)
                | MapReduceError::PoolInternal(_)
                | MapReduceError::Cancelled
                | MapReduceError::NoResult
        )
    }

    /// Transient errors are worth retrying inside the backing store; they
    /// must never surface past `store::object_store` into `map`.
    pub fn is_transient(&self) -> bool {
        match self {
            MapReduceError::Io(io_err) => Self::is_io_transient(io_err),
            MapReduceError::ObjectStore(_) => true,
            _ => false,
        }
    }

    fn is_io_transient(io_err: &std::io::Error) -> bool {
        use std::io::ErrorKind::*;
        matches!(
            io_err.kind(),
            ConnectionReset | ConnectionAborted | TimedOut | Interrupted | UnexpectedEof
        )
    }

    /// Classification used for instrumentation, mirroring the teacher's
    /// `OrbitError::category()`.
    pub fn category(&self) -> ErrorCategory {
        match self {
            MapReduceError::MisalignedVectors(_) | MapReduceError::TooManyInputVectors(_) => {
                ErrorCategory::Validation
            }
            MapReduceError::InvalidKey(_) => ErrorCategory::Validation,
            MapReduceError::Io(_) | MapReduceError::ObjectStore(_) => ErrorCategory::IoError,
            MapReduceError::Hook(_) => ErrorCategory::UserHook,
            MapReduceError::RemoteTask(_) => ErrorCategory::Remote,
            MapReduceError::PoolInternal(_) => ErrorCategory::Concurrency,
            MapReduceError::Cancelled => ErrorCategory::Cancellation,
            MapReduceError::NoResult => ErrorCategory::Unknown,
            MapReduceError::Other(_) => ErrorCategory::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    IoError,
    UserHook,
    Remote,
    Concurrency,
    Cancellation,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::IoError => "io",
            ErrorCategory::UserHook => "user_hook",
            ErrorCategory::Remote => "remote",
            ErrorCategory::Concurrency => "concurrency",
            ErrorCategory::Cancellation => "cancellation",
            ErrorCategory::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}
