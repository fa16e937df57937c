//! Read-only file-backed vector (§3, §4.B): chunks of a local file are
//! materialized lazily on first access and published into the chunk store
//! under compare-and-swap, so a race between two threads/nodes first-touching
//! the same chunk resolves deterministically (§8 property 8).

use super::{ChunkView, Vector};
use crate::error::Result;
use crate::key::{chunk2_start_elem, chunk_len, n_chunks_for_length, ChunkKey};
use crate::store::KvStore;
use bytes::Bytes;
use std::fs::File;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A local file of length `L`, addressable as `nChunks = max(1, L >> LOG_CHK)`
/// uniformly-sized chunks (final chunk fat-tailed). Not writable (§3).
pub struct FileBackedVector {
    vector_id: u64,
    path: PathBuf,
    length: u64,
    n_chunks: u64,
    // `File` is not `Sync`; guard it so multiple threads can materialize
    // different chunks without racing on the same `File` handle's cursor.
    file: Mutex<File>,
    store: Arc<dyn KvStore>,
}

impl FileBackedVector {
    pub fn open(vector_id: u64, path: impl Into<PathBuf>, store: Arc<dyn KvStore>) -> std::io::Result<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let length = file.metadata()?.len();
        let n_chunks = n_chunks_for_length(length).max(1);
        Ok(Self {
            vector_id,
            path,
            length,
            n_chunks,
            file: Mutex::new(file),
            store,
        })
    }

    fn read_chunk_bytes(&self, cidx: u64) -> std::io::Result<Vec<u8>> {
        let start = chunk2_start_elem(cidx);
        let len = chunk_len(cidx, self.length, self.n_chunks);
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl Vector for FileBackedVector {
    fn vector_id(&self) -> u64 {
        self.vector_id
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn n_chunks(&self) -> u64 {
        self.n_chunks
    }

    fn writable(&self) -> bool {
        false
    }

    fn elem2_bv(&self, start_row: u64, cidx: u64) -> Result<Option<ChunkView>> {
        if cidx >= self.n_chunks {
            return Ok(None);
        }
        let key = self.chunk_key(cidx);
        let key_bytes = key.encode();

        if let Some(existing) = self.store.get(&key_bytes) {
            return Ok(Some(ChunkView::new(start_row, existing.len() as u64, Arc::from(existing.to_vec()))));
        }

        let bytes = self.read_chunk_bytes(cidx)?;
        let candidate = Bytes::from(bytes);
        let published = self.store.put_if_match(&key_bytes, candidate.clone(), None);
        if published != candidate {
            debug!(chunk = cidx, vector = self.vector_id, "lost CAS race, using existing published chunk");
        }
        Ok(Some(ChunkView::new(start_row, published.len() as u64, Arc::from(published.to_vec()))))
    }
}

/// `key.home()` from §6: whether `self_index` owns `key`'s chunk.
pub fn is_home(key: &ChunkKey, self_index: usize, cloud_size: usize) -> bool {
    key.is_home(self_index, cloud_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CHUNK_SZ;
    use crate::store::InMemoryKvStore;
    use std::io::Write;

    fn write_temp_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn fat_tail_chunk_count_and_final_length() {
        let len = (CHUNK_SZ * 2 + 123) as usize;
        let data = vec![7u8; len];
        let file = write_temp_file(&data);
        let store = InMemoryKvStore::shared();
        let vector = FileBackedVector::open(1, file.path(), store).unwrap();

        assert_eq!(vector.n_chunks(), 2);
        let view = vector.elem2_bv(CHUNK_SZ, 1).unwrap().unwrap();
        assert_eq!(view.len, len as u64 - CHUNK_SZ);
    }

    #[test]
    fn single_chunk_for_small_file() {
        let data = vec![1u8; 10];
        let file = write_temp_file(&data);
        let store = InMemoryKvStore::shared();
        let vector = FileBackedVector::open(1, file.path(), store).unwrap();
        assert_eq!(vector.n_chunks(), 1);
    }

    #[test]
    fn repeated_reads_hit_store_not_file() {
        let data = vec![9u8; CHUNK_SZ as usize];
        let file = write_temp_file(&data);
        let store = InMemoryKvStore::shared();
        let vector = FileBackedVector::open(3, file.path(), store.clone());
        let vector = vector.unwrap();

        let first = vector.elem2_bv(0, 0).unwrap().unwrap();
        let key = vector.chunk_key(0).encode();
        assert!(store.get(&key).is_some());

        let second = vector.elem2_bv(0, 0).unwrap().unwrap();
        assert_eq!(first.payload.as_ref(), second.payload.as_ref());
    }

    #[test]
    fn concurrent_first_touch_of_same_chunk_converges() {
        use std::sync::Arc as StdArc;
        use std::thread;

        let data = vec![5u8; CHUNK_SZ as usize];
        let file = write_temp_file(&data);
        let store = InMemoryKvStore::shared();
        let vector = StdArc::new(FileBackedVector::open(4, file.path(), store).unwrap());

        let mut handles = vec![];
        for _ in 0..6 {
            let vector = vector.clone();
            handles.push(thread::spawn(move || vector.elem2_bv(0, 0).unwrap().unwrap()));
        }
        let views: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = views[0].payload.clone();
        assert!(views.iter().all(|v| v.payload.as_ref() == first.as_ref()));
    }
}
