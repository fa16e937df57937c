//! Cluster membership and RPC dispatch (§6): both are modeled as external
//! collaborators, per §1's scoping of "RPC transport, cluster membership,
//! object-store wire protocol" out of this crate's concern. `ClusterRuntime`
//! is the seam; real deployments wire it to whatever node-to-node transport
//! the surrounding system already has (the way `examples/saworbit-orbit`'s
//! `StarManager` owns peer discovery behind a trait the filesystem layer
//! never sees directly). [`InProcessCluster`] is a same-process reference
//! implementation used by tests and by single-node callers.

use crate::error::{MapReduceError, Result};
use crate::task::{MapReduceTask, TaskHooks};
use async_trait::async_trait;
use std::sync::Arc;

/// What the distributed fan-out (`fanout::distributed`) needs from the
/// surrounding cluster: this node's own index, the cluster size, and a way
/// to hand a sub-range of the node range to a peer and await its reduced
/// result. `H` is part of the trait (not of `rpc`'s signature) so
/// `dyn ClusterRuntime<H>` stays object-safe.
#[async_trait]
pub trait ClusterRuntime<H: TaskHooks>: Send + Sync {
    /// This node's index within `[0, size())`.
    fn index(&self) -> usize;

    /// Number of nodes in the cluster.
    fn size(&self) -> usize;

    /// Sends `task` (already narrowed to the peer's sub-range) to node
    /// `peer` and awaits its reduced result, wrapped back into a
    /// `MapReduceTask` the caller can `reduce3` against (§4.E). A transport
    /// failure surfaces as [`MapReduceError::RemoteTask`], never silently
    /// dropped (§7).
    async fn rpc(&self, peer: usize, task: MapReduceTask<H>) -> Result<MapReduceTask<H>>;
}

/// Reference `ClusterRuntime` for single-process use: every "peer" is
/// actually this process, so `rpc` just runs the remote node's local
/// fan-out/reduce in a spawned task and hands the result back. Lets
/// `engine::invoke` and the fanout/reduce logic be exercised end-to-end
/// without a real network, the same role `StarManager::local_only()` plays
/// in the teacher's own test suite.
pub struct InProcessCluster {
    index: usize,
    size: usize,
}

impl InProcessCluster {
    pub fn new(index: usize, size: usize) -> Self {
        assert!(index < size, "node index must be within the cluster");
        Self { index, size }
    }

    /// A single-node "cluster" — the common case for a developer running
    /// one invocation locally.
    pub fn single_node() -> Self {
        Self::new(0, 1)
    }
}

#[async_trait]
impl<H: TaskHooks> ClusterRuntime<H> for InProcessCluster {
    fn index(&self) -> usize {
        self.index
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn rpc(&self, _peer: usize, task: MapReduceTask<H>) -> Result<MapReduceTask<H>> {
        use crate::fanout::distributed::run_on_node;

        // `task.nlo`/`task.nhi` already carry the sub-range the caller wants
        // this peer to own (set by the caller's `fork_clone`); a real
        // transport would serialize `task` onto the wire addressed at
        // `_peer` and the remote process would deserialize it and call the
        // same `run_on_node` entry point. Here "the remote process" is just
        // a fresh `Arc<dyn ClusterRuntime<H>>` continuing the recursion.
        let cluster: Arc<dyn ClusterRuntime<H>> =
            Arc::new(InProcessCluster::new(self.index, self.size));
        // The "air gap": the simulated peer's work runs on a blocking-pool
        // task, same as a real RPC handler would run off the caller's
        // runtime thread (§5).
        tokio::task::spawn_blocking(move || {
            let rt = tokio::runtime::Handle::current();
            rt.block_on(run_on_node(cluster, task))
        })
        .await
        .map_err(|e| MapReduceError::RemoteTask(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHooks;
    impl TaskHooks for NoopHooks {
        type Result = ();
        fn reduce(&self, _a: (), _b: ()) {}
    }

    #[test]
    fn single_node_cluster_has_size_one() {
        let c = InProcessCluster::single_node();
        assert_eq!(ClusterRuntime::<NoopHooks>::size(&c), 1);
        assert_eq!(ClusterRuntime::<NoopHooks>::index(&c), 0);
    }
}
