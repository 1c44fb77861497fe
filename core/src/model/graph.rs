use super::*;
use crate::errors::{GraphError, MoResult};
use anyhow::{bail, ensure};
use itertools::Itertools;
use moir_data::prelude::*;
use std::collections::HashMap;

fn invalid(msg: String) -> GraphError {
    GraphError::Graph(msg)
}

/// The two-tier graph: operation nodes and data nodes, connected by
/// port-labelled edges alternating between the two kinds.
///
/// Nodes and edges live in slot vectors, so removing one never renumbers the
/// others. Every mutation bumps [`Graph::revision`].
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    by_name: HashMap<String, NodeId>,
    revision: u64,
    pub stage: Stage,
}

impl Graph {
    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Monotonic mutation counter.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn add_node(&mut self, name: impl Into<String>, kind: impl Into<NodeKind>) -> MoResult<NodeId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            bail!(invalid(format!("node name {name:?} is already used")));
        }
        let id = NodeId(self.nodes.len());
        self.by_name.insert(name.clone(), id);
        self.nodes.push(Some(Node {
            id,
            name,
            kind: kind.into(),
            inputs: tvec!(),
            outputs: tvec!(),
        }));
        self.touch();
        Ok(id)
    }

    /// Remove a node by name. Without `cascade`, the node must be disconnected.
    pub fn remove_node(&mut self, name: &str, cascade: bool) -> MoResult<()> {
        let id = self.node_id(name)?;
        self.remove_node_by_id(id, cascade)
    }

    pub fn remove_node_by_id(&mut self, id: NodeId, cascade: bool) -> MoResult<()> {
        let node = self.node(id)?;
        let edges: TVec<EdgeId> = node.inputs.iter().chain(node.outputs.iter()).copied().collect();
        if !edges.is_empty() && !cascade {
            bail!(invalid(format!("node {:?} still has {} edge(s)", node.name, edges.len())));
        }
        for e in edges {
            self.remove_edge(e)?;
        }
        if let Some(node) = self.nodes[id.0].take() {
            self.by_name.remove(&node.name);
        }
        self.touch();
        Ok(())
    }

    /// Connect port `out` of `src` to port `inp` of `dst`.
    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, out: usize, inp: usize) -> MoResult<EdgeId> {
        let (s, d) = (self.node(src)?, self.node(dst)?);
        if s.is_op() == d.is_op() {
            bail!(invalid(format!(
                "edge {:?} -> {:?} must connect an op and a data node",
                s.name, d.name
            )));
        }
        if d.is_data() {
            ensure!(
                d.inputs.is_empty(),
                invalid(format!("data node {:?} already has a producer", d.name))
            );
            ensure!(inp == 0, invalid(format!("data node {:?} has a single input port", d.name)));
            if s.outputs.iter().any(|e| self.edges[e.0].is_some_and(|e| e.out == out)) {
                bail!(invalid(format!("output port {out} of {:?} is already connected", s.name)));
            }
        } else {
            ensure!(out == 0, invalid(format!("data node {:?} has a single output port", s.name)));
            if d.inputs.iter().any(|e| self.edges[e.0].is_some_and(|e| e.inp == inp)) {
                bail!(invalid(format!("input port {inp} of {:?} is already connected", d.name)));
            }
        }
        let id = EdgeId(self.edges.len());
        self.edges.push(Some(Edge { id, src, dst, out, inp }));
        if let Some(n) = self.nodes[src.0].as_mut() {
            n.outputs.push(id);
        }
        if let Some(n) = self.nodes[dst.0].as_mut() {
            n.inputs.push(id);
        }
        self.touch();
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> MoResult<Edge> {
        let edge = *self.edge(id)?;
        self.edges[id.0] = None;
        if let Some(Some(n)) = self.nodes.get_mut(edge.src.0) {
            n.outputs.retain(|e| *e != id);
        }
        if let Some(Some(n)) = self.nodes.get_mut(edge.dst.0) {
            n.inputs.retain(|e| *e != id);
        }
        self.touch();
        Ok(edge)
    }

    pub fn edge(&self, id: EdgeId) -> MoResult<&Edge> {
        self.edges
            .get(id.0)
            .and_then(|e| e.as_ref())
            .ok_or_else(|| GraphError::Lookup(format!("edge #{}", id.0)).into())
    }

    pub(crate) fn set_edge_out_port(&mut self, id: EdgeId, out: usize) -> MoResult<()> {
        let edge = self
            .edges
            .get_mut(id.0)
            .and_then(|e| e.as_mut())
            .ok_or_else(|| GraphError::Lookup(format!("edge #{}", id.0)))?;
        edge.out = out;
        self.touch();
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> MoResult<&Node> {
        self.nodes
            .get(id.0)
            .and_then(|n| n.as_ref())
            .ok_or_else(|| GraphError::Lookup(format!("node {id}")).into())
    }

    pub fn node_mut(&mut self, id: NodeId) -> MoResult<&mut Node> {
        self.touch();
        self.nodes
            .get_mut(id.0)
            .and_then(|n| n.as_mut())
            .ok_or_else(|| GraphError::Lookup(format!("node {id}")).into())
    }

    pub fn get_node(&self, name: &str) -> MoResult<&Node> {
        self.node(self.node_id(name)?)
    }

    pub fn node_id(&self, name: &str) -> MoResult<NodeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::Lookup(format!("node {name:?}")).into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Live nodes, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|n| n.id).collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Upper bound of node ids, for bit sets.
    pub(crate) fn slots(&self) -> usize {
        self.nodes.len()
    }

    pub fn op_nodes_of(&self, op: &str) -> Vec<NodeId> {
        self.nodes().filter(|n| n.op_is(op)).map(|n| n.id).collect()
    }

    /// Incoming edges, sorted by destination port.
    pub fn in_edges(&self, id: NodeId) -> MoResult<TVec<Edge>> {
        let node = self.node(id)?;
        let mut edges: TVec<Edge> =
            node.inputs.iter().map(|e| self.edge(*e).copied()).collect::<MoResult<_>>()?;
        edges.sort_by_key(|e| e.inp);
        Ok(edges)
    }

    /// Outgoing edges, sorted by source port then destination.
    pub fn out_edges(&self, id: NodeId) -> MoResult<TVec<Edge>> {
        let node = self.node(id)?;
        let mut edges: TVec<Edge> =
            node.outputs.iter().map(|e| self.edge(*e).copied()).collect::<MoResult<_>>()?;
        edges.sort_by_key(|e| (e.out, e.dst, e.inp));
        Ok(edges)
    }

    /// Data node connected to input `port` of op node `op`.
    pub fn input_data(&self, op: NodeId, port: usize) -> MoResult<Option<NodeId>> {
        Ok(self.in_edges(op)?.iter().find(|e| e.inp == port).map(|e| e.src))
    }

    /// Data node connected to output `port` of op node `op`.
    pub fn output_data(&self, op: NodeId, port: usize) -> MoResult<Option<NodeId>> {
        Ok(self.out_edges(op)?.iter().find(|e| e.out == port).map(|e| e.dst))
    }

    /// Source nodes, in port order.
    pub fn inputs(&self, id: NodeId) -> MoResult<TVec<NodeId>> {
        Ok(self.in_edges(id)?.iter().map(|e| e.src).collect())
    }

    /// Destination nodes, in port order.
    pub fn outputs(&self, id: NodeId) -> MoResult<TVec<NodeId>> {
        Ok(self.out_edges(id)?.iter().map(|e| e.dst).collect())
    }

    pub fn producer(&self, data: NodeId) -> MoResult<Option<NodeId>> {
        Ok(self.in_edges(data)?.first().map(|e| e.src))
    }

    /// Edges from `data` to the operations consuming it.
    pub fn consumers(&self, data: NodeId) -> MoResult<TVec<Edge>> {
        self.out_edges(data)
    }

    pub fn data(&self, id: NodeId) -> MoResult<&DataNode> {
        let node = self.node(id)?;
        node.as_data().ok_or_else(|| invalid(format!("{node} is not a data node")).into())
    }

    pub fn data_mut(&mut self, id: NodeId) -> MoResult<&mut DataNode> {
        let node = self.node_mut(id)?;
        let desc = node.to_string();
        node.as_data_mut().ok_or_else(|| invalid(format!("{desc} is not a data node")).into())
    }

    pub fn op(&self, id: NodeId) -> MoResult<&OpNode> {
        let node = self.node(id)?;
        node.as_op().ok_or_else(|| invalid(format!("{node} is not an op node")).into())
    }

    pub fn op_mut(&mut self, id: NodeId) -> MoResult<&mut OpNode> {
        let node = self.node_mut(id)?;
        let desc = node.to_string();
        node.as_op_mut().ok_or_else(|| invalid(format!("{desc} is not an op node")).into())
    }

    /// Connect `data` to input `port` of `op`, replacing the previous input.
    pub fn rewire_input(&mut self, op: NodeId, port: usize, data: NodeId) -> MoResult<()> {
        if let Some(e) = self.in_edges(op)?.iter().find(|e| e.inp == port) {
            self.remove_edge(e.id)?;
        }
        self.add_edge(data, op, 0, port)?;
        Ok(())
    }

    /// Move every consumer of `drop` to `keep`, then remove `drop` and its
    /// producer edge.
    pub fn merge_data_nodes(&mut self, keep: NodeId, drop: NodeId) -> MoResult<()> {
        ensure!(keep != drop, invalid(format!("can not merge {keep} with itself")));
        self.data(keep)?;
        self.data(drop)?;
        for e in self.consumers(drop)? {
            self.remove_edge(e.id)?;
            self.add_edge(keep, e.dst, 0, e.inp)?;
        }
        self.remove_node_by_id(drop, true)
    }

    /// Create a producer-less copy of `data` named `name` and move the given
    /// consumer edges to it.
    pub fn split_data_node(
        &mut self,
        data: NodeId,
        consumer_edges: &[EdgeId],
        name: impl Into<String>,
    ) -> MoResult<NodeId> {
        let copy = self.data(data)?.clone();
        let edges: TVec<Edge> = consumer_edges
            .iter()
            .map(|e| self.edge(*e).copied())
            .collect::<MoResult<_>>()?;
        if let Some(e) = edges.iter().find(|e| e.src != data) {
            bail!(invalid(format!("edge #{} does not leave {data}", e.id.0)));
        }
        let new = self.add_node(name, copy)?;
        for e in edges {
            self.remove_edge(e.id)?;
            self.add_edge(new, e.dst, 0, e.inp)?;
        }
        Ok(new)
    }

    /// Flag an op for inference. On a data node, flags its consumers.
    pub fn mark_for_inference(&mut self, id: NodeId) -> MoResult<()> {
        let targets: TVec<NodeId> = if self.node(id)?.is_op() {
            tvec!(id)
        } else {
            self.consumers(id)?.iter().map(|e| e.dst).collect()
        };
        for t in targets {
            if !self.op(t)?.needs_shape_inference {
                self.op_mut(t)?.needs_shape_inference = true;
            }
        }
        Ok(())
    }

    /// Nodes without outgoing edges.
    pub fn sinks(&self) -> Vec<NodeId> {
        self.nodes().filter(|n| n.outputs.is_empty()).map(|n| n.id).collect()
    }

    /// Debug dump, one line per node.
    pub fn dump(&self) -> String {
        self.nodes()
            .map(|n| {
                let inputs = self
                    .in_edges(n.id)
                    .map(|es| es.iter().map(|e| format!("{}:{}", e.src, e.inp)).join(", "))
                    .unwrap_or_default();
                match &n.kind {
                    NodeKind::Data(d) => format!("{n} <- [{inputs}] {:?} {:?}", d.shape, d.value),
                    NodeKind::Op(_) => format!("{n} <- [{inputs}]"),
                }
            })
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::error_kind;

    fn chain() -> (Graph, NodeId, NodeId, NodeId) {
        let mut g = Graph::default();
        let a = g.add_node("a", OpNode::new("Parameter")).unwrap();
        let d = g.add_node("a_d", DataNode::new()).unwrap();
        let r = g.add_node("r", OpNode::new("Result")).unwrap();
        g.add_edge(a, d, 0, 0).unwrap();
        g.add_edge(d, r, 0, 0).unwrap();
        (g, a, d, r)
    }

    fn is_graph_error(e: &anyhow::Error) -> bool {
        matches!(error_kind(e), Some(GraphError::Graph(_)))
    }

    #[test]
    fn duplicate_name() {
        let (mut g, ..) = chain();
        assert!(is_graph_error(&g.add_node("a", DataNode::new()).unwrap_err()));
    }

    #[test]
    fn alternation() {
        let (mut g, a, _, r) = chain();
        assert!(is_graph_error(&g.add_edge(a, r, 1, 1).unwrap_err()));
    }

    #[test]
    fn single_producer() {
        let (mut g, _, d, _) = chain();
        let b = g.add_node("b", OpNode::new("Parameter")).unwrap();
        assert!(is_graph_error(&g.add_edge(b, d, 0, 0).unwrap_err()));
    }

    #[test]
    fn unique_ports() {
        let (mut g, a, _, r) = chain();
        let d2 = g.add_node("d2", DataNode::new()).unwrap();
        assert!(is_graph_error(&g.add_edge(a, d2, 0, 0).unwrap_err()));
        g.add_edge(a, d2, 1, 0).unwrap();
        assert!(is_graph_error(&g.add_edge(d2, r, 0, 0).unwrap_err()));
    }

    #[test]
    fn remove_connected() {
        let (mut g, _, d, r) = chain();
        assert!(is_graph_error(&g.remove_node("a_d", false).unwrap_err()));
        g.remove_node("a_d", true).unwrap();
        assert!(!g.contains("a_d"));
        assert!(g.in_edges(r).unwrap().is_empty());
        assert!(matches!(error_kind(&g.node(d).unwrap_err()), Some(GraphError::Lookup(_))));
    }

    #[test]
    fn lookup() {
        let (g, ..) = chain();
        assert!(matches!(error_kind(&g.get_node("nope").unwrap_err()), Some(GraphError::Lookup(_))));
    }

    #[test]
    fn revision_moves() {
        let (mut g, _, d, r) = chain();
        let rev = g.revision();
        let d2 = g.add_node("d2", DataNode::new().with_shape(&[2])).unwrap();
        g.rewire_input(r, 0, d2).unwrap();
        assert!(g.revision() > rev);
        assert_eq!(g.input_data(r, 0).unwrap(), Some(d2));
        assert!(g.consumers(d).unwrap().is_empty());
    }

    #[test]
    fn merge() {
        let (mut g, a, d, r) = chain();
        let id = g.add_node("id", OpNode::new("Identity")).unwrap();
        let d2 = g.add_node("id_d", DataNode::new()).unwrap();
        g.rewire_input(r, 0, d2).unwrap();
        g.add_edge(d, id, 0, 0).unwrap();
        g.add_edge(id, d2, 0, 0).unwrap();
        g.merge_data_nodes(d, d2).unwrap();
        assert_eq!(g.input_data(r, 0).unwrap(), Some(d));
        assert_eq!(g.producer(d).unwrap(), Some(a));
        assert!(g.out_edges(id).unwrap().is_empty());
    }

    #[test]
    fn split() {
        let (mut g, _, d, r) = chain();
        let edges: Vec<EdgeId> = g.consumers(d).unwrap().iter().map(|e| e.id).collect();
        let new = g.split_data_node(d, &edges, "fresh").unwrap();
        assert_eq!(g.input_data(r, 0).unwrap(), Some(new));
        assert_eq!(g.producer(new).unwrap(), None);
    }

    #[test]
    fn marking_data_marks_consumers() {
        let (mut g, _, d, r) = chain();
        g.op_mut(r).unwrap().needs_shape_inference = false;
        g.mark_for_inference(d).unwrap();
        assert!(g.op(r).unwrap().needs_shape_inference);
    }
}
