//! The `Vector` data model (§3): an immutable logical column of `N` rows
//! partitioned into chunks, plus the decoded `ChunkView` window over one
//! chunk that `map` hooks operate on.

pub mod appendable;
pub mod file_backed;
pub mod materialized;

pub use appendable::AppendableVector;
pub use file_backed::FileBackedVector;
pub use materialized::MaterializedVector;

use crate::error::{MapReduceError, Result};
use crate::key::{chunk2_start_elem, chunk_len, elem2_chunk_idx, n_chunks_for_length, ChunkKey};
use std::sync::Arc;

/// A decoded window over one chunk (§3). Payload is opaque to the core —
/// `map` hooks interpret the bytes according to their own element type.
#[derive(Debug, Clone)]
pub struct ChunkView {
    pub start_row: u64,
    pub len: u64,
    pub payload: Arc<[u8]>,
}

impl ChunkView {
    pub fn new(start_row: u64, len: u64, payload: Arc<[u8]>) -> Self {
        Self {
            start_row,
            len,
            payload,
        }
    }
}

/// Common contract for every vector kind (§3): read-only file-backed,
/// appendable, and new/materialized vectors all implement this.
pub trait Vector: Send + Sync {
    /// Stable identity used in `ChunkKey`s and for alignment checks.
    fn vector_id(&self) -> u64;

    fn length(&self) -> u64;

    fn n_chunks(&self) -> u64;

    /// Whether new chunks may still be appended (appendable vectors only).
    fn writable(&self) -> bool {
        false
    }

    /// Whether this vector's metadata has been published and is safe for
    /// other nodes to read.
    fn readable(&self) -> bool {
        true
    }

    fn chunk2_start_elem(&self, cidx: u64) -> u64 {
        chunk2_start_elem(cidx)
    }

    fn elem2_chunk_idx(&self, row: u64) -> u64 {
        elem2_chunk_idx(row, self.n_chunks())
    }

    fn chunk_key(&self, cidx: u64) -> ChunkKey {
        ChunkKey::new(self.vector_id(), cidx as u32)
    }

    fn chunk_idx(&self, key: &ChunkKey) -> Option<u64> {
        if key.vector_id == self.vector_id() {
            Some(key.chunk_idx as u64)
        } else {
            None
        }
    }

    /// Decode chunk `cidx` into a view starting at `start_row`. Returns
    /// `Ok(None)` for the §9 open-question branch: a would-be trailing chunk
    /// whose remainder was already swallowed by the fat tail.
    fn elem2_bv(&self, start_row: u64, cidx: u64) -> Result<Option<ChunkView>>;
}

/// Validates the §3 alignment invariant before any fan-out: every pair of
/// input vectors (excluding appendable *outputs*, which are exempt) must
/// agree on `n_chunks()` and on `chunk2_start_elem(i)` for every `i`
/// (§8 property 3).
pub fn validate_alignment(inputs: &[Arc<dyn Vector>]) -> Result<()> {
    let Some(first) = inputs.first() else {
        return Ok(());
    };
    let n_chunks = first.n_chunks();
    for other in &inputs[1..] {
        if other.n_chunks() != n_chunks {
            return Err(MapReduceError::MisalignedVectors(format!(
                "vector {} has {} chunks, vector {} has {}",
                first.vector_id(),
                n_chunks,
                other.vector_id(),
                other.n_chunks()
            )));
        }
        for i in 0..n_chunks {
            if first.chunk2_start_elem(i) != other.chunk2_start_elem(i) {
                return Err(MapReduceError::MisalignedVectors(format!(
                    "vector {} and vector {} disagree on chunk {} start row",
                    first.vector_id(),
                    other.vector_id(),
                    i
                )));
            }
        }
    }
    Ok(())
}

/// Length, in rows, of chunk `c` given a vector's total `length`/`n_chunks`.
pub fn chunk_len_for(c: u64, length: u64, n_chunks: u64) -> u64 {
    chunk_len(c, length, n_chunks)
}

pub fn n_chunks_for(length: u64) -> u64 {
    n_chunks_for_length(length)
}
