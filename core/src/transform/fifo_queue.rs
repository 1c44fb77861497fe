use super::*;
use crate::model::{AttrValue, DataNode, GraphDsl, OpNode, Shape};
use bit_set::BitSet;

/// Replaces a TensorFlow input queue by a `Parameter`.
///
/// `Parameter + FIFOQueueV2 -> QueueDequeueUpToV2 -> Identity` becomes a
/// single `Parameter`, named after the queue, feeding whatever consumed the
/// first dequeued tensor. The other dequeued tensors (labels, typically)
/// are dropped, with everything that only depends on them.
#[derive(Clone, Debug, Default)]
pub struct FifoQueueReplacer;

fn first_shape(attr: &AttrValue) -> Option<Shape> {
    match attr {
        AttrValue::Tensor(t) if t.rank() == 2 => {
            if t.shape()[0] == 0 {
                return None;
            }
            let values = t.to_i64s().ok()?;
            Some(values[..t.shape()[1]].into())
        }
        other => other.as_ints(),
    }
}

/// Nodes reachable forward from `from`, `from` included.
fn downstream(graph: &Graph, from: &[NodeId]) -> MoResult<BitSet> {
    let mut seen = BitSet::with_capacity(graph.slots());
    let mut todo: Vec<NodeId> = from.to_vec();
    while let Some(node) = todo.pop() {
        if seen.insert(node.0) {
            todo.extend(graph.outputs(node)?);
        }
    }
    Ok(seen)
}

impl FifoQueueReplacer {
    fn replace(&self, graph: &mut Graph, dequeue: NodeId) -> MoResult<()> {
        let Some(queue) = producer_op(graph, dequeue, 1)? else { return Ok(()) };
        if !graph.node(queue)?.op_is("FIFOQueueV2") {
            return Ok(());
        }
        let Some(image) = graph.output_data(dequeue, 0)? else { return Ok(()) };
        let queue_name = graph.node(queue)?.name.clone();
        let placeholder = producer_op(graph, dequeue, 0)?;
        let mut shape = graph.op(queue)?.attrs.get("shapes").and_then(first_shape);
        if let Some(p) = placeholder {
            if let Some(ph_shape) = graph.op(p)?.attrs.get("shape").and_then(|a| a.as_ints()) {
                if ph_shape.len() > 1 {
                    shape = Some(ph_shape);
                }
            }
        }
        let Some(shape) = shape else {
            warn!("{queue_name}: no shape for the dequeued tensor, queue left in place");
            return Ok(());
        };

        let others: Vec<NodeId> =
            graph.outputs(dequeue)?.into_iter().filter(|d| *d != image).collect();
        let keep = downstream(graph, &[image])?;
        let dropped = downstream(graph, &others)?;
        let mut doomed: Vec<NodeId> = dropped.iter().map(NodeId).filter(|n| !keep.contains(n.0)).collect();
        for input in graph.inputs(dequeue)? {
            if graph.consumers(input)?.len() == 1 {
                doomed.push(input);
                doomed.extend(graph.producer(input)?);
            }
        }
        let consumers = graph.consumers(image)?;
        doomed.push(image);
        doomed.push(dequeue);
        for node in doomed {
            if graph.node(node).is_ok() {
                graph.remove_node_by_id(node, true)?;
            }
        }

        let param = OpNode::new("Parameter").with_attr("shape", shape.clone());
        let name = unique_name(graph, &queue_name);
        let (param, data) = graph.add_op_with_data(&name, param)?;
        *graph.data_mut(data)? = DataNode::new().with_shape(&shape);
        for edge in consumers {
            graph.add_edge(data, edge.dst, 0, edge.inp)?;
        }
        info!("Replaced queue {queue_name} by {name}, a {shape:?} parameter");
        mark_neighbourhood(graph, param)
    }
}

impl Transformation for FifoQueueReplacer {
    fn descriptor(&self) -> TransformationDescriptor {
        TransformationDescriptor::pattern("FifoQueueReplacer", Stage::Front)
    }

    fn find_and_replace_pattern(&self, graph: &mut Graph) -> MoResult<()> {
        for dequeue in graph.op_nodes_of("QueueDequeueUpToV2") {
            self.replace(graph, dequeue)?;
        }
        Ok(())
    }
}
