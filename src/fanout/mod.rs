//! The two fan-out trees (§4.E, §4.F): [`local`] walks a node's own chunk
//! range on the work-stealing CPU pool, [`distributed`] walks the cluster's
//! node range over RPC. They compose: `distributed::run_on_node` calls
//! `local::run` once it has narrowed down to a single physical node.

pub mod distributed;
pub mod local;
