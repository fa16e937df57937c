//! The task descriptor (§4.D, §3 "Task instance"): a tagged set of user
//! hooks (`init`/`map`/`reduce`) plus per-invocation state, modeled as a
//! capability set rather than deep inheritance per §9's design note ("the
//! scheduler only needs `{onLeaf, onCombine, onInit}`"). The task *instance*
//! itself — ranges, children, accumulated result — lives in
//! [`MapReduceTask`] below; the fan-out and reduction logic that walks it
//! lives in `fanout`/`reduce`.

use crate::vector::{ChunkView, Vector};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// User contract: any subset may be defined; unused ones are no-ops. Exactly
/// one of `map_one`/`map_two` is called per homed chunk, depending on how
/// many input vectors the invocation carries; supplying three or more input
/// vectors is a configuration error (§4.D), rejected before fan-out by
/// [`crate::engine::invoke`].
pub trait TaskHooks: Send + Sync + 'static {
    /// The partial result type combined pairwise by `reduce`.
    type Result: Send + 'static;

    /// Called once per node before any local chunk is touched (§4.D, §5:
    /// "init on a node happens-before any map on that node").
    fn init(&self) {}

    /// One input vector's chunk.
    fn map_one(&self, _start_row: u64, _len: u64, _a: &ChunkView) -> Option<Self::Result> {
        None
    }

    /// Two input vectors' chunks, row-aligned.
    fn map_two(
        &self,
        _start_row: u64,
        _len: u64,
        _a: &ChunkView,
        _b: &ChunkView,
    ) -> Option<Self::Result> {
        None
    }

    /// Associative combiner of two task results (§4.D). May assume `other`
    /// is the result of a prior `map` or itself the result of a prior
    /// `reduce` — never a bare default/empty value.
    fn reduce(&self, a: Self::Result, b: Self::Result) -> Self::Result;
}

/// State machine of a task instance (§4.G): `New -> Setup -> FannedOut ->
/// (Mapped | Split) -> Reduced -> (top only) PostLocalDone -> Complete`, with
/// any state transitioning to `Cancelled` on exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New,
    Setup,
    FannedOut,
    Mapped,
    Split,
    Reduced,
    PostLocalDone,
    Complete,
    Cancelled,
}

/// Sentinel node-range lower bound meaning "this instance produced no local
/// result" (§4.G: "set the sentinel (nlo = -1) so callers up the tree can
/// skip this sub-tree").
pub const NO_RESULT_SENTINEL: i64 = -1;

/// A clonable descriptor holding the input vector handles, the node range
/// `[nlo, nhi)` and local chunk range `[lo, hi)` this instance is responsible
/// for, the local fork/join children, and the accumulated result (§3, §4.D).
/// Output-chunk publication (`AppendableVector::close_chunk`) is synchronous,
/// so there is no separate pending-futures set to gate on.
///
/// Per §9's "cyclic parent/child references" note, this is a
/// parent-owning-children arena: `left`/`rite` are owned `Box`es, nulled out
/// after `reduce2` to collapse memory promptly.
pub struct MapReduceTask<H: TaskHooks> {
    pub hooks: Arc<H>,
    pub inputs: Vec<Arc<dyn Vector>>,
    pub outputs: Vec<Arc<crate::vector::AppendableVector>>,
    pub nlo: i64,
    pub nhi: i64,
    pub lo: u64,
    pub hi: u64,
    pub left: Option<Box<MapReduceTask<H>>>,
    pub rite: Option<Box<MapReduceTask<H>>>,
    pub result: Option<H::Result>,
    pub top_local: bool,
    pub state: TaskState,
    /// Shared across an entire local fork/join subtree: set the moment any
    /// leaf or combine step fails, so siblings short-circuit instead of
    /// starting new work (§5 "Cancellation": "the tree stops spawning
    /// further work").
    pub cancelled: Arc<AtomicBool>,
}

impl<H: TaskHooks> MapReduceTask<H> {
    pub fn new_root(
        hooks: Arc<H>,
        inputs: Vec<Arc<dyn Vector>>,
        outputs: Vec<Arc<crate::vector::AppendableVector>>,
        cloud_size: usize,
        n_chunks: u64,
    ) -> Self {
        Self {
            hooks,
            inputs,
            outputs,
            nlo: 0,
            nhi: cloud_size as i64,
            lo: 0,
            hi: n_chunks,
            left: None,
            rite: None,
            result: None,
            top_local: false,
            state: TaskState::New,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `fork_clone` (§9): an explicit clone method rather than a general
    /// copy operator, producing a child with `topLocal := false`, empty
    /// children, a fresh `result` slot, and the given sub-range. User fields
    /// (`hooks`, `inputs`, `outputs`) shallow-copy via `Arc`/`Vec` clone.
    pub fn fork_clone(&self, nlo: i64, nhi: i64, lo: u64, hi: u64) -> Self {
        Self {
            hooks: self.hooks.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            nlo,
            nhi,
            lo,
            hi,
            left: None,
            rite: None,
            result: None,
            top_local: false,
            state: TaskState::New,
            cancelled: self.cancelled.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SumHooks;

    impl TaskHooks for SumHooks {
        type Result = i64;

        fn map_one(&self, _start_row: u64, _len: u64, a: &ChunkView) -> Option<i64> {
            Some(a.payload.iter().map(|b| *b as i64).sum())
        }

        fn reduce(&self, a: i64, b: i64) -> i64 {
            a + b
        }
    }

    #[test]
    fn hooks_default_to_no_ops_except_reduce() {
        let hooks: Arc<dyn TaskHooks<Result = i64>> = Arc::new(SumHooks);
        hooks.init();
        assert_eq!(hooks.reduce(1, 2), 3);
    }
}
