//! Distributed fan-out over the cluster's node range `[nlo, nhi)` (§4.E): a
//! balanced binary tree of RPCs, non-blocking from the caller's point of
//! view (`tokio::join!`, not a blocking wait), mirroring the async
//! request/response dispatch in `examples/saworbit-orbit/orbit-connect`'s
//! manager loop rather than a thread-per-peer model.

use crate::cluster::ClusterRuntime;
use crate::error::Result;
use crate::reduce::{post_local, reduce3};
use crate::task::{MapReduceTask, TaskHooks, TaskState};
use std::sync::Arc;

/// Runs one node's share of the invocation: if `[nlo, nhi)` has narrowed to
/// a single node, that node's local fork/join fan-out runs directly;
/// otherwise the range is split in half and each half is dispatched to a
/// representative peer, concurrently, and the two results are folded back
/// together with [`reduce3`]. `task.top_local` gates whether [`post_local`]
/// runs once this node's own contribution is settled (§4.G: only the
/// instance the original `invoke` call was made on runs it).
pub async fn run_on_node<H: TaskHooks>(
    cluster: Arc<dyn ClusterRuntime<H>>,
    mut task: MapReduceTask<H>,
) -> Result<MapReduceTask<H>> {
    if task.is_cancelled() {
        task.state = TaskState::Cancelled;
        return Err(crate::error::MapReduceError::Cancelled);
    }

    task.state = TaskState::FannedOut;

    if task.nhi - task.nlo <= 1 {
        let node_index = task.nlo.max(0) as usize;
        task.hooks.init();
        crate::fanout::local::run(&mut task, node_index, cluster.size())?;
        if task.top_local {
            post_local(&mut task);
        }
        return Ok(task);
    }

    let mid = task.nlo + (task.nhi - task.nlo) / 2;
    let left_task = task.fork_clone(task.nlo, mid, task.lo, task.hi);
    let rite_task = task.fork_clone(mid, task.nhi, task.lo, task.hi);
    // §4.E: the receiver of each RPC is the midpoint of its own sub-range,
    // not its low bound — otherwise the same node keeps re-addressing
    // itself down its own left spine instead of a fresh peer each level.
    let left_peer = ((task.nlo + mid) / 2) as usize;
    let rite_peer = ((mid + task.nhi) / 2) as usize;

    // Both halves are in flight at once; this is the "non-blocking" half of
    // §4.E's distributed fan-out — the caller awaits both futures together
    // rather than completing one RPC before starting the next.
    let (left_res, rite_res) = tokio::join!(cluster.rpc(left_peer, left_task), cluster.rpc(rite_peer, rite_task));
    let left_res = left_res?;
    let rite_res = rite_res?;

    reduce3(&mut task, left_res, rite_res)?;
    task.state = TaskState::Reduced;
    if task.top_local {
        post_local(&mut task);
    }
    Ok(task)
}
