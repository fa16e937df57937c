//! Local fork/join fan-out over one node's chunk range `[lo, hi)` (§4.F),
//! built on `rayon::join` the way
//! `examples/saworbit-orbit`'s `offload_parallel_compute` splits CPU-bound
//! work across rayon's pool rather than hand-rolling a thread pool.

use crate::error::{MapReduceError, Result};
use crate::reduce::reduce2;
use crate::task::{MapReduceTask, TaskHooks, TaskState};
use tracing::debug;

/// Recursively splits `[task.lo, task.hi)` in half until each leaf is a
/// single chunk, running leaves concurrently on the rayon pool. Chunks not
/// homed on `node_index` are skipped silently (§9 open question: kept as
/// the original "silent skip" behavior, not surfaced as an error — a
/// missing chunk's owner will map it instead).
pub fn run<H: TaskHooks>(task: &mut MapReduceTask<H>, node_index: usize, cloud_size: usize) -> Result<()> {
    if task.is_cancelled() {
        task.state = TaskState::Cancelled;
        return Err(MapReduceError::Cancelled);
    }

    if task.hi - task.lo <= 1 {
        task.state = TaskState::Mapped;
        task.result = map_leaf(task, node_index, cloud_size)?;
        return Ok(());
    }

    task.state = TaskState::Split;
    let mid = task.lo + (task.hi - task.lo) / 2;
    let mut left = task.fork_clone(task.nlo, task.nhi, task.lo, mid);
    let mut rite = task.fork_clone(task.nlo, task.nhi, mid, task.hi);

    let (left_res, rite_res) = rayon::join(
        || run(&mut left, node_index, cloud_size),
        || run(&mut rite, node_index, cloud_size),
    );

    // A failing sibling cancels the shared subtree so the other side's
    // still-running leaves stop starting new work (§5 "Cancellation").
    if let Err(e) = left_res {
        task.cancel();
        return Err(e);
    }
    if let Err(e) = rite_res {
        task.cancel();
        return Err(e);
    }

    task.left = Some(Box::new(left));
    task.rite = Some(Box::new(rite));
    reduce2(task)?;
    task.state = TaskState::Reduced;
    Ok(())
}

fn map_leaf<H: TaskHooks>(
    task: &MapReduceTask<H>,
    node_index: usize,
    cloud_size: usize,
) -> Result<Option<H::Result>> {
    let cidx = task.lo;
    match task.inputs.len() {
        0 => Ok(None),
        1 => {
            let key = task.inputs[0].chunk_key(cidx);
            if !key.is_home(node_index, cloud_size) {
                debug!(chunk = cidx, node_index, "chunk not homed on this node, skipping");
                return Ok(None);
            }
            let start = task.inputs[0].chunk2_start_elem(cidx);
            let Some(view) = task.inputs[0].elem2_bv(start, cidx)? else {
                return Ok(None);
            };
            Ok(task.hooks.map_one(view.start_row, view.len, &view))
        }
        2 => {
            let key = task.inputs[0].chunk_key(cidx);
            if !key.is_home(node_index, cloud_size) {
                debug!(chunk = cidx, node_index, "chunk not homed on this node, skipping");
                return Ok(None);
            }
            let start0 = task.inputs[0].chunk2_start_elem(cidx);
            let start1 = task.inputs[1].chunk2_start_elem(cidx);
            let a = task.inputs[0].elem2_bv(start0, cidx)?;
            let b = task.inputs[1].elem2_bv(start1, cidx)?;
            let (Some(a), Some(b)) = (a, b) else {
                return Ok(None);
            };
            Ok(task.hooks.map_two(a.start_row, a.len, &a, &b))
        }
        n => Err(MapReduceError::TooManyInputVectors(n)),
    }
}
