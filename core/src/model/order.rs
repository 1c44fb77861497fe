use super::{Graph, NodeId};
use crate::errors::{GraphError, MoResult};
use bit_set::BitSet;

/// Deterministic topological order of every node of the graph.
pub fn eval_order(graph: &Graph) -> MoResult<Vec<NodeId>> {
    let mut targets = graph.sinks();
    targets.extend(graph.node_ids());
    eval_order_for_nodes(graph, &targets)
}

/// Topological order of the nodes the targets depend upon, targets included.
pub fn eval_order_for_nodes(graph: &Graph, targets: &[NodeId]) -> MoResult<Vec<NodeId>> {
    let mut done = BitSet::with_capacity(graph.slots());
    let mut pending = BitSet::with_capacity(graph.slots());
    let mut needed: Vec<NodeId> = vec![];
    let mut order: Vec<NodeId> = vec![];
    for &target in targets {
        needed.push(target);
        while let Some(&node) = needed.last() {
            if done.contains(node.0) {
                needed.pop();
                continue;
            }
            let inputs = graph.inputs(node)?;
            if inputs.iter().all(|i| done.contains(i.0)) {
                order.push(node);
                needed.pop();
                done.insert(node.0);
            } else if !pending.insert(node.0) {
                return Err(GraphError::Graph(format!(
                    "cycle detected through node {:?}",
                    graph.node(node)?.name
                ))
                .into());
            } else {
                for input in inputs.iter().rev() {
                    if !done.contains(input.0) {
                        needed.push(*input);
                    }
                }
            }
        }
    }
    Ok(order)
}
