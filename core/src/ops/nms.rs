//! `SimplerNMS`, the Caffe region proposal layer.
use crate::internal::*;

fn simpler_nms(ctx: &mut InferenceContext) -> MoResult<()> {
    let feat_stride = ctx.attr_i64("feat_stride")?;
    if let Some(scale) = ctx.attr("scale") {
        let strings: Vec<String> = match scale {
            AttrValue::Strs(s) => s.clone(),
            AttrValue::Ints(v) => v.iter().map(|x| x.to_string()).collect(),
            AttrValue::Floats(v) => v.iter().map(|x| x.to_string()).collect(),
            AttrValue::Int(x) => vec![x.to_string()],
            AttrValue::Float(x) => vec![x.to_string()],
            AttrValue::Str(s) => vec![s.clone()],
            other => bail!("Unsupported scale attribute {other:?}"),
        };
        ctx.set_attr("scale", strings)?;
    }
    if feat_stride != 16 {
        error!("{}: SimplerNMS only supports feat_stride 16, got {feat_stride}", ctx.name());
        for port in ctx.output_ports() {
            ctx.set_output_unknown(port)?;
        }
        return Ok(());
    }
    let post_nms_topn = ctx.attr_i64("post_nms_topn")?;
    ctx.set_output_shape(0, &[post_nms_topn, 5])
}

pub(crate) fn register_all_ops(reg: &mut OpRegistry) {
    reg.insert(
        OpEntry::new("SimplerNMS", simpler_nms).with_required(&["feat_stride", "post_nms_topn"]),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(feat_stride: i64) -> (Graph, NodeId) {
        let mut g = Graph::default();
        let op = OpNode::new("SimplerNMS").with_attrs(attrs!(
            "feat_stride" => feat_stride,
            "post_nms_topn" => 150,
            "scale" => vec![1i64, 2, 3],
        ));
        let (_, out) = g.add_op_with_data("SimplerNMS_1", op).unwrap();
        let id = g.wire("node_1", OpNode::new("Identity"), &[out]).unwrap();
        g.add_result("op_output", id).unwrap();
        (g, out)
    }

    #[test]
    fn ideal() {
        let (mut g, out) = graph(16);
        ShapeInference::new(&OpRegistry::standard()).infer_all(&mut g).unwrap();
        assert_eq!(g.data(out).unwrap().shape.as_deref(), Some(&[150i64, 5][..]));
        let scale = &g.get_node("SimplerNMS_1").unwrap().as_op().unwrap().attrs["scale"];
        assert_eq!(scale.as_strs().unwrap(), &["1", "2", "3"]);
    }

    #[test]
    fn unsupported_stride() {
        crate::setup_test_logger();
        let (mut g, out) = graph(12);
        ShapeInference::new(&OpRegistry::standard()).infer_all(&mut g).unwrap();
        assert_eq!(g.data(out).unwrap().shape, None);
        let id = g.get_node("node_1_d").unwrap().id;
        assert_eq!(g.data(id).unwrap().shape, None);
    }
}
