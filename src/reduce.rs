//! Result combination (§4.G): `reduce2` folds a local fork/join pair back
//! together, `reduce3` folds a pair of remote RPC results back together, and
//! `post_local` is the bookkeeping a node does once both are done with it.
//! Kept as two entry points rather than one, since only `reduce3` needs to
//! merge appendable *output* vectors across node boundaries — `reduce2`'s
//! two children share the very same `Arc<AppendableVector>` and never need
//! merging.

use crate::error::Result;
use crate::task::{MapReduceTask, TaskHooks, TaskState, NO_RESULT_SENTINEL};

/// Folds a local fork/join pair's results, adopting either side's result
/// untouched if the other produced none, and discarding the exhausted
/// children (§9: "nulled out after `reduce2` to collapse memory promptly").
pub fn reduce2<H: TaskHooks>(task: &mut MapReduceTask<H>) -> Result<()> {
    let mut left = task.left.take().expect("reduce2 called without a left child");
    let mut rite = task.rite.take().expect("reduce2 called without a rite child");

    task.result = combine(&task.hooks, left.result.take(), rite.result.take());
    Ok(())
}

/// Folds a pair of remote RPC results into `task` (§4.E/§4.G): a child
/// carrying the `NO_RESULT_SENTINEL` node-range marker contributed nothing
/// and is treated as an empty subtree. Output vectors are merged
/// chunk-index-wise since each remote node built its own closed-chunk
/// bookkeeping independently of the others.
pub fn reduce3<H: TaskHooks>(
    task: &mut MapReduceTask<H>,
    mut left: MapReduceTask<H>,
    mut rite: MapReduceTask<H>,
) -> Result<()> {
    let left_result = if left.nlo == NO_RESULT_SENTINEL { None } else { left.result.take() };
    let rite_result = if rite.nlo == NO_RESULT_SENTINEL { None } else { rite.result.take() };

    for (mine, theirs) in task.outputs.iter().zip(left.outputs.iter()) {
        mine.merge_from(theirs);
    }
    for (mine, theirs) in task.outputs.iter().zip(rite.outputs.iter()) {
        mine.merge_from(theirs);
    }

    task.result = combine(&task.hooks, left_result, rite_result);
    Ok(())
}

fn combine<H: TaskHooks>(hooks: &H, a: Option<H::Result>, b: Option<H::Result>) -> Option<H::Result> {
    match (a, b) {
        (Some(a), Some(b)) => Some(hooks.reduce(a, b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Once both the local fork/join pass and (for an intermediate or top node)
/// the distributed RPC pass have produced `task.result`, a node marks
/// itself done. A node with no result at all sets the sentinel node range
/// (§4.G) so its parent's `reduce3` skips it instead of treating a missing
/// result as an error.
pub fn post_local<H: TaskHooks>(task: &mut MapReduceTask<H>) {
    if task.result.is_none() {
        task.nlo = NO_RESULT_SENTINEL;
    }
    task.state = TaskState::PostLocalDone;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::ChunkView;
    use std::sync::Arc;

    struct SumHooks;
    impl TaskHooks for SumHooks {
        type Result = i64;
        fn map_one(&self, _s: u64, _l: u64, _a: &ChunkView) -> Option<i64> {
            None
        }
        fn reduce(&self, a: i64, b: i64) -> i64 {
            a + b
        }
    }

    fn leaf(hooks: Arc<SumHooks>, result: Option<i64>) -> MapReduceTask<SumHooks> {
        let mut t = MapReduceTask::new_root(hooks, vec![], vec![], 1, 1);
        t.result = result;
        t
    }

    #[test]
    fn reduce2_adopts_lone_result() {
        let hooks = Arc::new(SumHooks);
        let mut parent = leaf(hooks.clone(), None);
        parent.left = Some(Box::new(leaf(hooks.clone(), Some(3))));
        parent.rite = Some(Box::new(leaf(hooks, None)));
        reduce2(&mut parent).unwrap();
        assert_eq!(parent.result, Some(3));
    }

    #[test]
    fn reduce2_combines_both_results() {
        let hooks = Arc::new(SumHooks);
        let mut parent = leaf(hooks.clone(), None);
        parent.left = Some(Box::new(leaf(hooks.clone(), Some(3))));
        parent.rite = Some(Box::new(leaf(hooks, Some(4))));
        reduce2(&mut parent).unwrap();
        assert_eq!(parent.result, Some(7));
    }

    #[test]
    fn reduce3_skips_sentinel_child() {
        let hooks = Arc::new(SumHooks);
        let mut parent = leaf(hooks.clone(), None);
        let mut empty_child = leaf(hooks.clone(), Some(99));
        empty_child.nlo = NO_RESULT_SENTINEL;
        let present_child = leaf(hooks, Some(5));
        reduce3(&mut parent, empty_child, present_child).unwrap();
        assert_eq!(parent.result, Some(5));
    }

    #[test]
    fn post_local_sets_sentinel_when_no_result() {
        let hooks = Arc::new(SumHooks);
        let mut t = leaf(hooks, None);
        post_local(&mut t);
        assert_eq!(t.nlo, NO_RESULT_SENTINEL);
        assert_eq!(t.state, TaskState::PostLocalDone);
    }
}
