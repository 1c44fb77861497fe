//! Graph normalization: dead node pruning and output port compaction.
use super::*;
use crate::errors::MoResult;
use crate::ops::OpRegistry;
use bit_set::BitSet;
use itertools::Itertools;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Names of the removed nodes, sorted.
    pub removed_nodes: Vec<String>,
    /// Number of op output edges whose port was renumbered.
    pub renumbered_ports: usize,
}

impl CleanupReport {
    pub fn is_noop(&self) -> bool {
        self.removed_nodes.is_empty() && self.renumbered_ports == 0
    }
}

/// Roots of the liveness walk: `Result` ops, or every sink when the graph
/// has none.
fn roots(graph: &Graph) -> Vec<NodeId> {
    let results = graph.op_nodes_of("Result");
    if results.is_empty() { graph.sinks() } else { results }
}

fn live_nodes(graph: &Graph) -> MoResult<BitSet> {
    let mut live = BitSet::with_capacity(graph.slots());
    let mut todo = roots(graph);
    while let Some(node) = todo.pop() {
        if !live.insert(node.0) {
            continue;
        }
        for input in graph.inputs(node)? {
            if !live.contains(input.0) {
                todo.push(input);
            }
        }
    }
    let live_ops: Vec<NodeId> =
        graph.nodes().filter(|n| n.is_op() && live.contains(n.id.0)).map(|n| n.id).collect();
    for op in live_ops {
        for data in graph.outputs(op)? {
            live.insert(data.0);
        }
    }
    Ok(live)
}

/// Normalize the graph in place.
///
/// Removes every node the roots do not depend on (live ops keep all their
/// output data nodes), then isolated data nodes, then renumbers the output
/// ports of live ops to be contiguous, except for ops registered with
/// positional outputs. Shapes and values of retained nodes are untouched.
pub fn clean_up(graph: &mut Graph, registry: &OpRegistry) -> MoResult<CleanupReport> {
    let mut report = CleanupReport::default();
    let live = live_nodes(graph)?;
    let dead: Vec<NodeId> = graph.node_ids().into_iter().filter(|n| !live.contains(n.0)).collect();
    for id in dead {
        report.removed_nodes.push(graph.node(id)?.name.clone());
        graph.remove_node_by_id(id, true)?;
    }
    let isolated: Vec<NodeId> = graph
        .nodes()
        .filter(|n| n.is_data() && n.inputs.is_empty() && n.outputs.is_empty())
        .map(|n| n.id)
        .collect();
    for id in isolated {
        report.removed_nodes.push(graph.node(id)?.name.clone());
        graph.remove_node_by_id(id, true)?;
    }
    let ops: Vec<NodeId> = graph.nodes().filter(|n| n.is_op()).map(|n| n.id).collect();
    for op in ops {
        let fixed = graph
            .op(op)
            .map(|o| registry.get(&o.op).is_some_and(|entry| entry.fixed_output_ports))?;
        if fixed {
            continue;
        }
        let edges = graph.out_edges(op)?;
        let ports: Vec<usize> = edges.iter().map(|e| e.out).dedup().collect();
        for edge in edges {
            let compact = ports.iter().position(|p| *p == edge.out).unwrap_or(edge.out);
            if compact != edge.out {
                graph.set_edge_out_port(edge.id, compact)?;
                report.renumbered_ports += 1;
            }
        }
    }
    report.removed_nodes.sort();
    if !report.is_noop() {
        debug!(
            "Cleanup removed {} node(s) [{}], renumbered {} port(s)",
            report.removed_nodes.len(),
            report.removed_nodes.iter().join(", "),
            report.renumbered_ports
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> OpRegistry {
        OpRegistry::standard()
    }

    #[test]
    fn prunes_dead_branch() {
        let mut g = Graph::default();
        let a = g.add_parameter("a", &[2]).unwrap();
        let live = g.wire("live", OpNode::new("Relu"), &[a]).unwrap();
        g.wire("dead", OpNode::new("Abs"), &[a]).unwrap();
        g.add_result("out", live).unwrap();
        g.add_data("orphan", DataNode::new()).unwrap();
        let report = clean_up(&mut g, &registry()).unwrap();
        assert_eq!(report.removed_nodes, vec!["dead", "dead_d", "orphan"]);
        assert!(g.contains("live_d"));
        assert!(clean_up(&mut g, &registry()).unwrap().is_noop());
    }

    #[test]
    fn live_op_keeps_unused_outputs() {
        let mut g = Graph::default();
        let q = g.add_op("q", OpNode::new("Split")).unwrap();
        g.add_op("r", OpNode::new("Result")).unwrap();
        g.connect("q:0", "r").unwrap();
        let d1 = g.add_data("q_1_d", DataNode::new()).unwrap();
        g.add_edge(q, d1, 1, 0).unwrap();
        clean_up(&mut g, &registry()).unwrap();
        assert!(g.contains("q_1_d"));
    }

    #[test]
    fn compacts_ports() {
        let mut g = Graph::default();
        let q = g.add_op("split", OpNode::new("Split")).unwrap();
        let d = g.add_data("split_2_d", DataNode::new().with_shape(&[3])).unwrap();
        g.add_edge(q, d, 2, 0).unwrap();
        g.add_result("out", d).unwrap();
        let report = clean_up(&mut g, &registry()).unwrap();
        assert_eq!(report.renumbered_ports, 1);
        assert_eq!(g.output_data(q, 0).unwrap(), Some(d));
        assert_eq!(g.data(d).unwrap().shape.as_deref(), Some(&[3i64][..]));
    }

    #[test]
    fn fixed_ports_are_kept() {
        let mut g = Graph::default();
        let q = g.add_op("deq", OpNode::new("QueueDequeueUpToV2")).unwrap();
        let d = g.add_data("deq_1_d", DataNode::new()).unwrap();
        g.add_edge(q, d, 1, 0).unwrap();
        g.add_result("out", d).unwrap();
        let report = clean_up(&mut g, &registry()).unwrap();
        assert_eq!(report.renumbered_ports, 0);
        assert_eq!(g.output_data(q, 1).unwrap(), Some(d));
    }

    #[test]
    fn no_result_keeps_sinks() {
        let mut g = Graph::default();
        let a = g.add_parameter("a", &[2]).unwrap();
        g.wire("relu", OpNode::new("Relu"), &[a]).unwrap();
        let report = clean_up(&mut g, &registry()).unwrap();
        assert!(report.is_noop());
        assert_eq!(g.len(), 4);
    }
}
