//! Appendable output vector (§3): accumulates chunks produced by `map` calls
//! during a task, then is finalized into a read-only vector on completion.
//! Mutated only from the owning task's threads (§5) — no cross-task sharing.

use super::{ChunkView, Vector};
use crate::error::Result;
use crate::key::{chunk2_start_elem, ChunkKey};
use crate::store::KvStore;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct AppendableVector {
    vector_id: u64,
    n_chunks: u64,
    store: Arc<dyn KvStore>,
    chunks: RwLock<BTreeMap<u64, u64>>, // cidx -> length, for readable() bookkeeping
    finalized: AtomicBool,
}

impl AppendableVector {
    pub fn new(vector_id: u64, n_chunks: u64, store: Arc<dyn KvStore>) -> Self {
        Self {
            vector_id,
            n_chunks,
            store,
            chunks: RwLock::new(BTreeMap::new()),
            finalized: AtomicBool::new(false),
        }
    }

    /// Closes a new chunk produced inside a `map` call: publishes it into
    /// the chunk store and records it locally. Publication is synchronous —
    /// the chunk is durable and visible to `elem2_bv` by the time this
    /// returns.
    pub fn close_chunk(&self, cidx: u64, bytes: Bytes) {
        let key = ChunkKey::new(self.vector_id, cidx as u32).encode();
        self.store.put(&key, bytes.clone());
        self.chunks.write().insert(cidx, bytes.len() as u64);
    }

    /// Merge chunks produced by a sibling subtree (used when combining two
    /// appendable outputs chunk-index-wise during `reduceAll`, §4.G). Reads
    /// `other` into a snapshot before taking `self`'s write lock so this is
    /// still correct when `self` and `other` happen to be the same vector
    /// (e.g. every node shares the same output handle in a single-process
    /// cluster).
    pub fn merge_from(&self, other: &AppendableVector) {
        let snapshot: Vec<(u64, u64)> = other.chunks.read().iter().map(|(c, l)| (*c, *l)).collect();
        let mut mine = self.chunks.write();
        for (cidx, len) in snapshot {
            mine.insert(cidx, len);
        }
    }

    /// Finalizes the vector into its read-only form (§3, §4.G: "on the root,
    /// close any appendable input vector into its read-only form"). After
    /// this, `readable()` is true and no further chunks may be closed.
    pub fn finalize(&self) {
        self.finalized.store(true, Ordering::SeqCst);
    }

    pub fn chunk_count_closed(&self) -> usize {
        self.chunks.read().len()
    }
}

impl Vector for AppendableVector {
    fn vector_id(&self) -> u64 {
        self.vector_id
    }

    fn length(&self) -> u64 {
        self.chunks
            .read()
            .iter()
            .map(|(cidx, len)| chunk2_start_elem(*cidx) + len)
            .max()
            .unwrap_or(0)
    }

    fn n_chunks(&self) -> u64 {
        self.n_chunks
    }

    fn writable(&self) -> bool {
        !self.finalized.load(Ordering::SeqCst)
    }

    fn readable(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }

    fn elem2_bv(&self, start_row: u64, cidx: u64) -> Result<Option<ChunkView>> {
        let key = ChunkKey::new(self.vector_id, cidx as u32).encode();
        Ok(self
            .store
            .get(&key)
            .map(|bytes| ChunkView::new(start_row, bytes.len() as u64, std::sync::Arc::from(bytes.to_vec()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryKvStore;

    #[test]
    fn closing_chunks_makes_them_readable_after_finalize() {
        let store = InMemoryKvStore::shared();
        let vec_out = AppendableVector::new(1, 2, store);
        assert!(vec_out.writable());
        assert!(!vec_out.readable());

        vec_out.close_chunk(0, Bytes::from_static(b"aaaa"));
        vec_out.close_chunk(1, Bytes::from_static(b"bb"));
        assert_eq!(vec_out.chunk_count_closed(), 2);

        vec_out.finalize();
        assert!(!vec_out.writable());
        assert!(vec_out.readable());

        let view = vec_out.elem2_bv(0, 0).unwrap().unwrap();
        assert_eq!(view.payload.as_ref(), b"aaaa");
    }

    #[test]
    fn merge_combines_chunk_index_wise() {
        let store = InMemoryKvStore::shared();
        let a = AppendableVector::new(1, 2, store.clone());
        let b = AppendableVector::new(1, 2, store);
        a.close_chunk(0, Bytes::from_static(b"a0"));
        b.close_chunk(1, Bytes::from_static(b"b1"));
        a.merge_from(&b);
        assert_eq!(a.chunk_count_closed(), 2);
    }
}
