use super::InferenceContext;
use crate::errors::{GraphError, MoResult, error_kind};
use crate::model::{Graph, NodeId, eval_order};
use crate::ops::OpRegistry;
use anyhow::Context;
use bit_set::BitSet;
use moir_data::prelude::*;

/// The inference engine, driven by an op registry.
#[derive(new)]
pub struct ShapeInference<'r> {
    registry: &'r OpRegistry,
}

impl ShapeInference<'_> {
    /// Flags every op, then runs inference.
    pub fn infer_all(&self, graph: &mut Graph) -> MoResult<usize> {
        for op in graph.nodes().filter(|n| n.is_op()).map(|n| n.id).collect::<Vec<_>>() {
            graph.mark_for_inference(op)?;
        }
        self.infer_marked(graph)
    }

    /// Visits, in topological order, the flagged ops and the ops consuming a
    /// data node changed earlier in the same run. Returns how many ops were
    /// visited.
    pub fn infer_marked(&self, graph: &mut Graph) -> MoResult<usize> {
        let mut changed = BitSet::with_capacity(graph.slots());
        let mut visited = 0;
        for node in eval_order(graph)? {
            let n = graph.node(node)?;
            let Some(op) = n.as_op() else { continue };
            let dirty_input = graph.inputs(node)?.iter().any(|i| changed.contains(i.0));
            if !op.needs_shape_inference && !dirty_input {
                continue;
            }
            visited += 1;
            for data in self.infer_node(graph, node)? {
                changed.insert(data.0);
            }
        }
        trace!("inference done, {visited} op(s) visited");
        Ok(visited)
    }

    /// Runs the rule of a single op node. Returns the data nodes it changed.
    pub fn infer_node(&self, graph: &mut Graph, node: NodeId) -> MoResult<TVec<NodeId>> {
        let n = graph.node(node)?;
        let name = n.name.clone();
        let op = graph.op(node)?.clone();
        trace!("Inferring {n}");
        let entry = self.registry.get(&op.op).ok_or_else(|| GraphError::UnknownOp {
            op: op.op.clone(),
            node: Some(name.clone()),
        })?;
        if let Some(missing) = entry.required_attrs.iter().find(|a| !op.attrs.contains_key(*a)) {
            return Err(GraphError::ShapeInference {
                node: name,
                reason: format!("missing required attribute {missing}"),
            }
            .into());
        }
        let mut attrs = entry.defaults.clone();
        attrs.extend(op.attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
        let infer = attrs.get("infer").and_then(|a| a.as_infer()).unwrap_or(entry.infer);

        let mut ctx = InferenceContext::new(graph, node, attrs)?;
        let unresolved = graph_inputs_unresolved(ctx.graph(), node)?;
        if unresolved {
            debug!("{name}: an input shape is unresolved, outputs left unresolved");
            for port in ctx.output_ports() {
                ctx.set_output_unknown(port)?;
            }
        } else {
            infer(&mut ctx).map_err(|e| {
                if error_kind(&e).is_some() {
                    e.context(format!("Inferring node {name}"))
                } else {
                    GraphError::ShapeInference { node: name.clone(), reason: format!("{e:#}") }
                        .into()
                }
            })?;
        }
        let changed = ctx.into_changed();
        if graph.op(node)?.needs_shape_inference {
            graph.op_mut(node)?.needs_shape_inference = false;
        }
        for data in &changed {
            trace!("  {} -> {:?}", graph.node(*data)?.name, graph.data(*data)?);
        }
        Ok(changed)
    }
}

fn graph_inputs_unresolved(graph: &Graph, node: NodeId) -> MoResult<bool> {
    for input in graph.inputs(node)? {
        if graph.data(input)?.shape.is_none() {
            return Ok(true);
        }
    }
    Ok(false)
}

impl ShapeInference<'_> {
    /// Same as [`ShapeInference::infer_node`], with the node looked up by name.
    pub fn infer_named(&self, graph: &mut Graph, name: &str) -> MoResult<TVec<NodeId>> {
        let id = graph.node_id(name)?;
        self.infer_node(graph, id).with_context(|| format!("Inferring {name}"))
    }
}

#[cfg(test)]
mod tests {
    use crate::internal::*;

    fn frob(ctx: &mut InferenceContext) -> MoResult<()> {
        ctx.set_output_shape(0, &[42])
    }

    #[test]
    fn unknown_op_is_reported_with_node() {
        crate::setup_test_logger();
        let mut g = Graph::default();
        let a = g.add_parameter("a", &[1]).unwrap();
        g.wire("f", OpNode::new("Frobnicate"), &[a]).unwrap();
        let registry = OpRegistry::standard();
        let e = ShapeInference::new(&registry).infer_all(&mut g).unwrap_err();
        assert_eq!(
            error_kind(&e),
            Some(&GraphError::UnknownOp { op: "Frobnicate".into(), node: Some("f".into()) })
        );
    }

    #[test]
    fn single_node_by_name() {
        let mut g = Graph::default();
        let a = g.add_parameter("a", &[1]).unwrap();
        let out = g.wire("relu", OpNode::new("Relu"), &[a]).unwrap();
        let registry = OpRegistry::standard();
        let changed = ShapeInference::new(&registry).infer_named(&mut g, "relu").unwrap();
        assert_eq!(changed.as_slice(), &[out]);
        assert_eq!(g.data(out).unwrap().shape.as_deref(), Some(&[1i64][..]));
        assert!(ShapeInference::new(&registry).infer_named(&mut g, "missing").is_err());
    }

    #[test]
    fn unknown_op_reported_on_unresolved_input() {
        let mut g = Graph::default();
        let (_, d) = g.add_op_with_data("q", OpNode::new("FIFOQueueV2")).unwrap();
        g.wire("f", OpNode::new("Frobnicate"), &[d]).unwrap();
        let registry = OpRegistry::standard();
        let e = ShapeInference::new(&registry).infer_all(&mut g).unwrap_err();
        assert!(matches!(error_kind(&e), Some(GraphError::UnknownOp { .. })));
    }

    #[test]
    fn none_propagates() {
        let mut g = Graph::default();
        let (_, d) = g.add_op_with_data("q", OpNode::new("FIFOQueueV2")).unwrap();
        let relu = g.wire("relu", OpNode::new("Relu"), &[d]).unwrap();
        g.data_mut(relu).unwrap().shape = Some(tvec!(3));
        let registry = OpRegistry::standard();
        ShapeInference::new(&registry).infer_all(&mut g).unwrap();
        assert_eq!(g.data(relu).unwrap().shape, None);
    }

    #[test]
    fn override_wins() {
        let mut g = Graph::default();
        let a = g.add_parameter("a", &[1, 2]).unwrap();
        let r = g
            .wire("relu", OpNode::new("Relu").with_attr("infer", AttrValue::Infer(frob)), &[a])
            .unwrap();
        let registry = OpRegistry::standard();
        ShapeInference::new(&registry).infer_all(&mut g).unwrap();
        assert_eq!(g.data(r).unwrap().shape.as_deref(), Some(&[42i64][..]));
    }

    #[test]
    fn changed_inputs_are_revisited() {
        let mut g = Graph::default();
        let a = g.add_parameter("a", &[1, 2]).unwrap();
        let r = g.wire("relu", OpNode::new("Relu"), &[a]).unwrap();
        let registry = OpRegistry::standard();
        let engine = ShapeInference::new(&registry);
        engine.infer_all(&mut g).unwrap();
        let p = g.node_id("a").unwrap();
        g.op_mut(p).unwrap().attrs.insert("shape".into(), AttrValue::from(vec![3i64]));
        g.mark_for_inference(p).unwrap();
        assert_eq!(engine.infer_marked(&mut g).unwrap(), 2);
        assert_eq!(g.data(r).unwrap().shape.as_deref(), Some(&[3i64][..]));
        assert_eq!(engine.infer_marked(&mut g).unwrap(), 0);
    }

    #[test]
    fn untyped_errors_are_classified() {
        let mut g = Graph::default();
        let a = g.add_parameter("a", &[2, 3]).unwrap();
        let b = g.add_parameter("b", &[4, 5]).unwrap();
        g.wire("mm", OpNode::new("MatMul"), &[a, b]).unwrap();
        let registry = OpRegistry::standard();
        let e = ShapeInference::new(&registry).infer_all(&mut g).unwrap_err();
        assert!(matches!(error_kind(&e), Some(GraphError::ShapeInference { node, .. }) if node == "mm"));
    }
}
