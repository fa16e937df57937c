//! Chunk addressing (§4.A) and the wire-exact key layouts from §6.
//!
//! Two distinct key schemes live here: the `ChunkKey` that identifies one
//! chunk of one vector (and crosses the wire between nodes, §6), and the
//! `ObjectStoreKey` that addresses a whole blob in the remote object store
//! (§4.C, §6). Keeping them as separate types (rather than one "key" enum)
//! mirrors how the teacher keeps `backend` addressing and its manifest chunk
//! addressing in separate modules.

use crate::config::{CHUNK_SZ, LOG_CHK};
use crate::error::{MapReduceError, Result};
use std::hash::{Hash, Hasher};

/// `elem2ChunkIdx`: clamps to `nChunks - 1` so the final chunk absorbs the
/// remainder (the fat-tail rule, §3, §8 property 7).
pub fn elem2_chunk_idx(row: u64, n_chunks: u64) -> u64 {
    debug_assert!(n_chunks > 0);
    (row >> LOG_CHK).min(n_chunks - 1)
}

/// `chunk2StartElem`.
pub fn chunk2_start_elem(chunk_idx: u64) -> u64 {
    chunk_idx << LOG_CHK
}

/// Number of chunks for a vector of `length` rows: `max(1, L >> LOG_CHK)`,
/// floor division so the remainder is absorbed into the last chunk (the
/// fat-tail rule) rather than spawning a short extra chunk.
pub fn n_chunks_for_length(length: u64) -> u64 {
    if length == 0 {
        return 0;
    }
    (length >> LOG_CHK).max(1)
}

/// Length, in rows, of chunk `c` of a vector with `length` total rows and
/// `n_chunks` chunks.
pub fn chunk_len(c: u64, length: u64, n_chunks: u64) -> u64 {
    let start = chunk2_start_elem(c);
    if c + 1 < n_chunks {
        CHUNK_SZ
    } else {
        length - start
    }
}

/// Kind tag for the first byte of a `ChunkKey`, bit-exact per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyKind {
    /// A chunk of a distributed vector.
    DVec = 0xD0,
    /// A chunk of a legacy arraylet (accepted on decode, never produced).
    ArrayletChunk = 0xA1,
}

impl KeyKind {
    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0xD0 => Ok(KeyKind::DVec),
            0xA1 => Ok(KeyKind::ArrayletChunk),
            other => Err(MapReduceError::InvalidKey(format!(
                "unknown chunk key kind tag 0x{other:02x}"
            ))),
        }
    }
}

/// `{kind=DVEC, vector-id, chunk-index}` — identifies one chunk of one
/// vector. Encodes as `[kind:1][vector_id:8 BE][chunk_idx:4 BE]`, chosen
/// big-endian and documented as such so every node in the cluster agrees
/// (§6: "implementer's choice, but consistent cluster-wide").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub kind: KeyKindTag,
    pub vector_id: u64,
    pub chunk_idx: u32,
}

/// Newtype so `ChunkKey` can derive `Hash`/`Eq` without `KeyKind`'s explicit
/// discriminants getting in the way of round-tripping unknown-but-valid tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyKindTag(pub u8);

impl ChunkKey {
    pub fn new(vector_id: u64, chunk_idx: u32) -> Self {
        Self {
            kind: KeyKindTag(KeyKind::DVec as u8),
            vector_id,
            chunk_idx,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(13);
        buf.push(self.kind.0);
        buf.extend_from_slice(&self.vector_id.to_be_bytes());
        buf.extend_from_slice(&self.chunk_idx.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 13 {
            return Err(MapReduceError::InvalidKey(format!(
                "chunk key must be 13 bytes, got {}",
                bytes.len()
            )));
        }
        let kind = KeyKind::from_byte(bytes[0])?;
        let vector_id = u64::from_be_bytes(bytes[1..9].try_into().unwrap());
        let chunk_idx = u32::from_be_bytes(bytes[9..13].try_into().unwrap());
        Ok(Self {
            kind: KeyKindTag(kind as u8),
            vector_id,
            chunk_idx,
        })
    }

    /// Deterministic home node for this chunk, hashed against cluster size.
    /// `home(self_index, cloud_size)` is true iff this node owns the chunk.
    pub fn home_node(&self, cloud_size: usize) -> usize {
        if cloud_size == 0 {
            return 0;
        }
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        (hasher.finish() % cloud_size as u64) as usize
    }

    pub fn is_home(&self, self_index: usize, cloud_size: usize) -> bool {
        self.home_node(cloud_size) == self_index
    }
}

/// `s3://{bucket}/{key}` addressing for whole-vector blobs (§4.C, §6).
/// `encode` and `decode` are required to be mutual inverses (§8 property 6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreKey {
    pub scheme: String,
    pub bucket: String,
    pub key: String,
}

impl ObjectStoreKey {
    pub fn new(scheme: impl Into<String>, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Encodes verbatim as `{scheme}://{bucket}/{key}`.
    pub fn encode(&self) -> String {
        format!("{}://{}/{}", self.scheme, self.bucket, self.key)
    }

    /// Splits on the first `/` after the `scheme://` prefix, per §6.
    pub fn decode(encoded: &str) -> Result<Self> {
        let (scheme, rest) = encoded.split_once("://").ok_or_else(|| {
            MapReduceError::InvalidKey(format!("missing scheme separator in {encoded:?}"))
        })?;
        let (bucket, key) = rest.split_once('/').ok_or_else(|| {
            MapReduceError::InvalidKey(format!("missing bucket/key separator in {encoded:?}"))
        })?;
        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Header length, in bytes, to shift all chunk offsets by for logical
    /// names carrying the `.hex` sentinel suffix (§4.C).
    pub fn header_len(&self) -> u64 {
        const HEX_HEADER_LEN: u64 = 64;
        if self.key.ends_with(".hex") {
            HEX_HEADER_LEN
        } else {
            0
        }
    }
}
