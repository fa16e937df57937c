//! New/materialized vector (§3): a write-once chunk built inside a single
//! `map` call and published on task exit. Unlike `AppendableVector`, a
//! materialized vector is always exactly one chunk, built by exactly one
//! `map` invocation.

use super::{ChunkView, Vector};
use crate::error::Result;
use crate::key::ChunkKey;
use crate::store::KvStore;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct MaterializedVector {
    vector_id: u64,
    store: Arc<dyn KvStore>,
    bytes: Bytes,
    published: AtomicBool,
}

impl MaterializedVector {
    pub fn new(vector_id: u64, bytes: Bytes, store: Arc<dyn KvStore>) -> Self {
        Self {
            vector_id,
            store,
            bytes,
            published: AtomicBool::new(false),
        }
    }

    /// Publishes the single chunk into the chunk store; idempotent.
    pub fn publish(&self) {
        if !self.published.swap(true, Ordering::SeqCst) {
            let key = ChunkKey::new(self.vector_id, 0).encode();
            self.store.put(&key, self.bytes.clone());
        }
    }
}

impl Vector for MaterializedVector {
    fn vector_id(&self) -> u64 {
        self.vector_id
    }

    fn length(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn n_chunks(&self) -> u64 {
        1
    }

    fn writable(&self) -> bool {
        false
    }

    fn readable(&self) -> bool {
        self.published.load(Ordering::SeqCst)
    }

    fn elem2_bv(&self, start_row: u64, cidx: u64) -> Result<Option<ChunkView>> {
        if cidx != 0 {
            return Ok(None);
        }
        Ok(Some(ChunkView::new(
            start_row,
            self.bytes.len() as u64,
            Arc::from(self.bytes.to_vec()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryKvStore;

    #[test]
    fn publish_is_idempotent_and_makes_readable() {
        let store = InMemoryKvStore::shared();
        let v = MaterializedVector::new(9, Bytes::from_static(b"payload"), store.clone());
        assert!(!v.readable());
        v.publish();
        v.publish();
        assert!(v.readable());
        let key = ChunkKey::new(9, 0).encode();
        assert_eq!(store.get(&key), Some(Bytes::from_static(b"payload")));
    }
}
