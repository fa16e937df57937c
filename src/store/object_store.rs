//! Object-store backing (§4.C): stores/retrieves **whole vectors** against a
//! remote blob store, with silent retry of transient failures. Grounded in
//! `examples/saworbit-orbit/src/protocol/s3/recovery.rs`'s `RetryPolicy` /
//! `with_retry` and in the "init-once cell" design note of spec §9.

use crate::config::CHUNK_SZ;
use crate::error::{MapReduceError, Result};
use crate::key::ObjectStoreKey;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Backoff policy for object-store retries (§4.C: "silently retry end of
/// stream and socket timeout failures with a short backoff (~500ms)"; other
/// I/O errors retry with `backoff = 256 * 2^attempt` ms up to a small retry
/// count, default 3).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub eof_timeout_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(256),
            eof_timeout_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32, is_eof_or_timeout: bool) -> Duration {
        if is_eof_or_timeout {
            self.eof_timeout_delay
        } else {
            self.base_delay * 2u32.pow(attempt)
        }
    }
}

/// Classifies an object-store I/O error as retryable, per §4.C/§7: EOF and
/// socket-timeout are always retryable; other I/O errors are retryable up to
/// the same bounded attempt count.
pub fn is_retryable(err: &std::io::Error) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        err.kind(),
        UnexpectedEof | TimedOut | ConnectionReset | ConnectionAborted | Interrupted
    )
}

fn is_eof_or_timeout(err: &std::io::Error) -> bool {
    use std::io::ErrorKind::*;
    matches!(err.kind(), UnexpectedEof | TimedOut)
}

/// Retries `operation` against `policy`, treating any `std::io::Error` as
/// retryable per [`is_retryable`] and anything else as fatal. Sleeps are
/// real (`tokio::time::sleep`) so this must be called from async context —
/// matching §5's "the object-store reader blocks on network I/O, off the
/// fork/join pool".
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, std::io::Error>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt, is_eof_or_timeout(&e));
                warn!(attempt, ?delay, error = %e, "retrying object-store operation");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(MapReduceError::ObjectStore(e.to_string())),
        }
    }
}

/// A byte range of a blob, used both to address the whole-vector fetch and
/// the ranged GET it's mapped to for sub-range reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub len: u64,
}

/// Minimal surface the backing store needs from a remote blob client: a
/// (possibly ranged) GET and a PUT of a whole blob. A production
/// implementation would wrap an S3/GCS/Azure SDK client the way
/// `examples/saworbit-orbit/src/backend/s3.rs` wraps `aws-sdk-s3`; this
/// trait is the seam, consistent with §1's "RPC transport ... out of scope".
#[async_trait::async_trait]
pub trait BlobClient: Send + Sync {
    async fn get_range(&self, key: &ObjectStoreKey, range: Option<ByteRange>) -> std::io::Result<Bytes>;
    async fn put(&self, key: &ObjectStoreKey, value: Bytes) -> std::io::Result<()>;
    async fn size(&self, key: &ObjectStoreKey) -> std::io::Result<u64>;
}

/// Progress callback invoked after each successful underlying read, as
/// required by §4.C's streaming-reader contract.
pub type ProgressCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// A streaming reader over a sub-range of a remote blob. Does **not**
/// support mark/reset (§4.C): it is forward-only and re-opens the
/// underlying ranged GET transparently on each retry, carrying the current
/// offset across reopenings.
pub struct RangedReader {
    client: Arc<dyn BlobClient>,
    key: ObjectStoreKey,
    range: ByteRange,
    position: u64,
    policy: RetryPolicy,
    progress: Option<ProgressCallback>,
}

impl RangedReader {
    pub fn new(
        client: Arc<dyn BlobClient>,
        key: ObjectStoreKey,
        range: ByteRange,
        policy: RetryPolicy,
        progress: Option<ProgressCallback>,
    ) -> Self {
        Self {
            client,
            key,
            range,
            position: range.offset,
            policy,
            progress,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads the remainder of the range in one shot, retrying transparently.
    /// Each retry re-issues a ranged GET starting from `self.position`, not
    /// from `self.range.offset` — so a partial read before a transient
    /// failure is never re-fetched.
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let mut collected = Vec::new();
        loop {
            let remaining = self.range.offset + self.range.len - self.position;
            if remaining == 0 {
                break;
            }
            let sub_range = ByteRange {
                offset: self.position,
                len: remaining,
            };
            let client = self.client.clone();
            let key = self.key.clone();
            let chunk = with_retry(&self.policy, || {
                let client = client.clone();
                let key = key.clone();
                async move { client.get_range(&key, Some(sub_range)).await }
            })
            .await?;

            let n = chunk.len() as u64;
            self.position += n;
            collected.extend_from_slice(&chunk);
            if let Some(cb) = &self.progress {
                cb(n);
            }
            if n == 0 {
                break;
            }
        }
        Ok(Bytes::from(collected))
    }
}

/// Whether a logical-name vector of `size` bytes should be wrapped as a
/// chunked vector (large files, §4.C) versus stored as a single value.
pub fn is_chunked(size: u64) -> bool {
    size >= 2 * CHUNK_SZ
}

/// Maps a logical offset into the on-wire offset, shifting by the header
/// length for `.hex`-suffixed logical names (§4.C).
pub fn apply_header_shift(key: &ObjectStoreKey, logical_offset: u64) -> u64 {
    logical_offset + key.header_len()
}

/// Process-wide, lazily-constructed object-store client, built under the
/// init-once-cell model called for in spec §9 ("model as an init-once cell
/// with lifecycle {uninit -> initialized} -- no teardown needed"), mirroring
/// the double-checked-locking singleton note in §5.
pub struct ObjectStoreClient {
    pub blob_client: Arc<dyn BlobClient>,
    pub policy: RetryPolicy,
}

static GLOBAL_CLIENT: OnceCell<Arc<ObjectStoreClient>> = OnceCell::new();

/// Returns the process-wide client, constructing it on first call via
/// `init` (or returning an error if it is not yet initialized and no `init`
/// is supplied — callers own the construction policy).
pub fn global_client_or_init(
    init: impl FnOnce() -> Arc<ObjectStoreClient>,
) -> Arc<ObjectStoreClient> {
    GLOBAL_CLIENT.get_or_init(init).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FlakyClient {
        fail_count: AtomicU32,
        payload: Vec<u8>,
        reopen_offsets: Mutex<Vec<u64>>,
    }

    #[async_trait::async_trait]
    impl BlobClient for FlakyClient {
        async fn get_range(
            &self,
            _key: &ObjectStoreKey,
            range: Option<ByteRange>,
        ) -> std::io::Result<Bytes> {
            let range = range.unwrap();
            self.reopen_offsets.lock().unwrap().push(range.offset);
            if self.fail_count.fetch_sub(1, Ordering::SeqCst) > 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
            }
            let start = range.offset as usize;
            let end = (start + range.len as usize).min(self.payload.len());
            Ok(Bytes::copy_from_slice(&self.payload[start..end]))
        }

        async fn put(&self, _key: &ObjectStoreKey, _value: Bytes) -> std::io::Result<()> {
            Ok(())
        }

        async fn size(&self, _key: &ObjectStoreKey) -> std::io::Result<u64> {
            Ok(self.payload.len() as u64)
        }
    }

    #[tokio::test]
    async fn retry_is_transparent_and_progress_is_observed() {
        // §8 scenario S6: EOFException twice then success.
        let payload = b"hello orbit world".to_vec();
        let client = Arc::new(FlakyClient {
            fail_count: AtomicU32::new(2),
            payload: payload.clone(),
            reopen_offsets: Mutex::new(vec![]),
        });

        let total_read = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let total_read_cb = total_read.clone();
        let progress: ProgressCallback = Arc::new(move |n| {
            total_read_cb.fetch_add(n, Ordering::SeqCst);
        });

        let key = ObjectStoreKey::new("s3", "bucket", "obj.bin");
        let mut reader = RangedReader::new(
            client.clone(),
            key,
            ByteRange { offset: 0, len: payload.len() as u64 },
            RetryPolicy {
                max_attempts: 5,
                base_delay: Duration::from_millis(1),
                eof_timeout_delay: Duration::from_millis(1),
            },
            Some(progress),
        );

        let data = reader.read_to_end().await.unwrap();
        assert_eq!(data.as_ref(), payload.as_slice());
        assert_eq!(total_read.load(Ordering::SeqCst), payload.len() as u64);
    }

    #[tokio::test]
    async fn retry_exhausts_and_surfaces_io_error() {
        let client = Arc::new(FlakyClient {
            fail_count: AtomicU32::new(100),
            payload: vec![1, 2, 3],
            reopen_offsets: Mutex::new(vec![]),
        });
        let key = ObjectStoreKey::new("s3", "bucket", "obj.bin");
        let mut reader = RangedReader::new(
            client,
            key,
            ByteRange { offset: 0, len: 3 },
            RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                eof_timeout_delay: Duration::from_millis(1),
            },
            None,
        );
        let err = reader.read_to_end().await.unwrap_err();
        assert!(matches!(err, MapReduceError::ObjectStore(_)));
    }

    #[test]
    fn chunked_threshold_matches_spec() {
        assert!(!is_chunked(CHUNK_SZ));
        assert!(is_chunked(2 * CHUNK_SZ));
    }

    #[test]
    fn header_shift_applies_only_to_hex_suffix() {
        let hex_key = ObjectStoreKey::new("s3", "b", "data.hex");
        let plain_key = ObjectStoreKey::new("s3", "b", "data.bin");
        assert_eq!(apply_header_shift(&hex_key, 100), 100 + hex_key.header_len());
        assert_eq!(apply_header_shift(&plain_key, 100), 100);
    }
}
