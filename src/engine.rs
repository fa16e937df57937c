//! Top-level entry point (§4.G "on the root..."): validates inputs, builds
//! the root task, drives the distributed fan-out to completion, and
//! finalizes output vectors.

use crate::cluster::ClusterRuntime;
use crate::error::{MapReduceError, Result};
use crate::fanout::distributed::run_on_node;
use crate::task::{MapReduceTask, TaskHooks};
use crate::vector::{validate_alignment, AppendableVector, Vector};
use std::sync::Arc;
use tracing::instrument;

/// Runs one map/reduce invocation to completion.
///
/// Fails fast (before any fan-out starts, §8 property 3) if more than two
/// input vectors are given or if they disagree on chunking. On success,
/// every `output` is finalized into its read-only form before the result is
/// returned — callers never observe a half-written appendable vector.
#[instrument(skip(hooks, inputs, outputs, cluster), fields(n_inputs = inputs.len(), n_outputs = outputs.len()))]
pub async fn invoke<H: TaskHooks>(
    hooks: Arc<H>,
    inputs: Vec<Arc<dyn Vector>>,
    outputs: Vec<Arc<AppendableVector>>,
    cluster: Arc<dyn ClusterRuntime<H>>,
) -> Result<H::Result> {
    if inputs.len() > 2 {
        return Err(MapReduceError::TooManyInputVectors(inputs.len()));
    }
    validate_alignment(&inputs)?;

    let n_chunks = inputs.iter().map(|v| v.n_chunks()).max().unwrap_or(0);
    let cloud_size = cluster.size();

    let mut task = MapReduceTask::new_root(hooks, inputs, outputs.clone(), cloud_size, n_chunks);
    task.top_local = true;

    let result_task = run_on_node(cluster, task).await?;

    for output in &outputs {
        output.finalize();
    }

    result_task.result.ok_or(MapReduceError::NoResult)
}
