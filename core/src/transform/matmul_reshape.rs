use super::*;
use crate::model::{GraphDsl, Shape};
use crate::ops::array::compute_shape;

/// Makes the 2D reshape pattern in front of a `MatMul` independent of the
/// batch size.
///
/// A `Reshape` with a constant `[a, b]` pattern feeding one side of a
/// `MatMul` is rewritten to pin the contraction dimension `K`, taken from
/// the other operand, and leave the free dimension to `-1`. The other
/// operand must not come from a `Reshape` or a `Transpose`.
#[derive(Clone, Debug, Default)]
pub struct HcReshapeMatMulFold;

fn flag(graph: &Graph, op: NodeId, name: &str, default: bool) -> MoResult<bool> {
    Ok(graph.op(op)?.attrs.get(name).and_then(|a| a.as_bool()).unwrap_or(default))
}

fn known_shape(graph: &Graph, data: Option<NodeId>) -> MoResult<Option<Shape>> {
    match data {
        Some(data) => Ok(graph.data(data)?.shape.clone()),
        None => Ok(None),
    }
}

impl HcReshapeMatMulFold {
    /// The pattern to use for a reshape on input `port` of `matmul`, if the
    /// rewrite applies.
    fn new_pattern(&self, graph: &Graph, matmul: NodeId, port: usize) -> MoResult<Option<[i64; 2]>> {
        let transpose_a = flag(graph, matmul, "transpose_a", false)?;
        let transpose_b = flag(graph, matmul, "transpose_b", false)?;
        let other = 1 - port;
        if let Some(p) = producer_op(graph, matmul, other)? {
            let p = graph.node(p)?;
            if p.op_is("Reshape") || p.op_is("Transpose") {
                return Ok(None);
            }
        }
        let Some(other_shape) = known_shape(graph, graph.input_data(matmul, other)?)? else {
            return Ok(None);
        };
        let r = other_shape.len();
        if r < 2 {
            return Ok(None);
        }
        let k = match (port, transpose_a, transpose_b) {
            (0, _, true) => other_shape[r - 1],
            (0, _, false) => other_shape[r - 2],
            (_, true, _) => other_shape[r - 2],
            (_, false, _) => other_shape[r - 1],
        };
        if k < 0 {
            return Ok(None);
        }
        Ok(Some(match (port, transpose_a, transpose_b) {
            (0, true, _) => [k, -1],
            (0, false, _) => [-1, k],
            (_, _, true) => [-1, k],
            (_, _, false) => [k, -1],
        }))
    }

    fn fold(&self, graph: &mut Graph, matmul: NodeId, port: usize) -> MoResult<()> {
        let Some(reshape) = producer_op(graph, matmul, port)? else { return Ok(()) };
        if !graph.node(reshape)?.op_is("Reshape") {
            return Ok(());
        }
        let Some(pattern_data) = graph.input_data(reshape, 1)? else { return Ok(()) };
        let Some(konst) = graph.producer(pattern_data)? else { return Ok(()) };
        if !graph.node(konst)?.op_is("Const") {
            return Ok(());
        }
        let Some(pattern) = graph.data(pattern_data)?.value.clone() else { return Ok(()) };
        let pattern = pattern.to_i64s()?;
        if pattern.len() != 2 {
            return Ok(());
        }
        let Some(new) = self.new_pattern(graph, matmul, port)? else { return Ok(()) };
        if pattern.as_slice() == new {
            return Ok(());
        }
        let Some(input_shape) = known_shape(graph, graph.input_data(reshape, 0)?)? else {
            return Ok(());
        };
        let special_zero = flag(graph, reshape, "special_zero", true)?;
        match (
            compute_shape(&input_shape, &pattern, special_zero),
            compute_shape(&input_shape, &new, special_zero),
        ) {
            (Ok(before), Ok(after)) if before == after => (),
            _ => return Ok(()),
        }
        let reshape_name = graph.node(reshape)?.name.clone();
        info!("{reshape_name}: reshape pattern {pattern:?} rewritten to {new:?}");
        if graph.consumers(pattern_data)?.len() > 1 {
            let name = unique_name(graph, &format!("{reshape_name}/pattern"));
            let fresh = graph.add_const(&name, tensor1(&new))?;
            graph.rewire_input(reshape, 1, fresh)?;
        } else {
            set_const_value(graph, konst, tensor1(&new))?;
        }
        mark_neighbourhood(graph, reshape)
    }
}

impl Transformation for HcReshapeMatMulFold {
    fn descriptor(&self) -> TransformationDescriptor {
        TransformationDescriptor::pattern("HcReshapeMatMulFold", Stage::Back).after("RemoveIdentity")
    }

    fn find_and_replace_pattern(&self, graph: &mut Graph) -> MoResult<()> {
        for matmul in graph.op_nodes_of("MatMul") {
            for port in 0..2 {
                self.fold(graph, matmul, port)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::*;

    fn matmul_on_a(transpose_b: bool) -> Graph {
        let mut g = Graph::default();
        let in_1 = g.add_parameter("in_1", &[1, 20, 30]).unwrap();
        let in_2 = g.add_parameter("in_2", if transpose_b { &[40, 30] } else { &[30, 40] }).unwrap();
        let dim = g.add_const("dim", tensor1(&[20i64, -1])).unwrap();
        let reshaped = g.wire("reshape", OpNode::new("Reshape"), &[in_1, dim]).unwrap();
        let mm = OpNode::new("MatMul").with_attr("transpose_b", transpose_b);
        let out = g.wire("matmul", mm, &[reshaped, in_2]).unwrap();
        g.add_result("output", out).unwrap();
        ShapeInference::new(&OpRegistry::standard()).infer_all(&mut g).unwrap();
        g
    }

    #[test]
    fn rewrites_pattern() {
        let mut g = matmul_on_a(false);
        HcReshapeMatMulFold.find_and_replace_pattern(&mut g).unwrap();
        let dim = g.node_id("dim_d").unwrap();
        assert_eq!(&**g.data(dim).unwrap().value.as_ref().unwrap(), &tensor1(&[-1i64, 30]));
        let konst = g.get_node("dim").unwrap().as_op().unwrap();
        assert_eq!(konst.attrs["value"], AttrValue::from(tensor1(&[-1i64, 30])));
        assert!(g.op(g.node_id("reshape").unwrap()).unwrap().needs_shape_inference);
    }

    #[test]
    fn idempotent() {
        let mut g = matmul_on_a(true);
        HcReshapeMatMulFold.find_and_replace_pattern(&mut g).unwrap();
        let rev = g.revision();
        HcReshapeMatMulFold.find_and_replace_pattern(&mut g).unwrap();
        assert_eq!(g.revision(), rev);
    }

    #[test]
    fn shared_pattern_is_copied() {
        let mut g = matmul_on_a(false);
        let dim = g.node_id("dim_d").unwrap();
        g.wire("other", OpNode::new("Identity"), &[dim]).unwrap();
        HcReshapeMatMulFold.find_and_replace_pattern(&mut g).unwrap();
        assert_eq!(&**g.data(dim).unwrap().value.as_ref().unwrap(), &tensor1(&[20i64, -1]));
        let fresh = g.node_id("reshape/pattern_d").unwrap();
        assert_eq!(g.input_data(g.node_id("reshape").unwrap(), 1).unwrap(), Some(fresh));
    }

    #[test]
    fn skips_transposed_other_side() {
        let mut g = Graph::default();
        let in_1 = g.add_parameter("in_1", &[1, 20, 30]).unwrap();
        let in_2 = g.add_parameter("in_2", &[40, 30]).unwrap();
        let perm = g.add_const("perm", tensor1(&[1i64, 0])).unwrap();
        let t = g.wire("transpose", OpNode::new("Transpose"), &[in_2, perm]).unwrap();
        g.data_mut(t).unwrap().shape = Some(tvec!(30, 40));
        let dim = g.add_const("dim", tensor1(&[20i64, -1])).unwrap();
        let reshaped = g.wire("reshape", OpNode::new("Reshape"), &[in_1, dim]).unwrap();
        g.data_mut(reshaped).unwrap().shape = Some(tvec!(20, 30));
        g.wire("matmul", OpNode::new("MatMul"), &[reshaped, t]).unwrap();
        let rev = g.revision();
        HcReshapeMatMulFold.find_and_replace_pattern(&mut g).unwrap();
        assert_eq!(g.revision(), rev);
    }
}
