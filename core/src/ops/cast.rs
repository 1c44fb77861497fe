//! `Convert`: element type change. Shape is copied, constants are folded.
use crate::internal::*;

pub fn destination_type(name: &str) -> MoResult<DatumType> {
    Ok(match name {
        "f32" => DatumType::F32,
        "i64" => DatumType::I64,
        "boolean" | "bool" => DatumType::Bool,
        _ => bail!("Unsupported destination type {name}"),
    })
}

fn infer(ctx: &mut InferenceContext) -> MoResult<()> {
    let to = destination_type(ctx.attr_str("destination_type")?)?;
    let shape = ctx.input_shape(0)?;
    ctx.set_output_shape(0, &shape)?;
    if let Some(value) = ctx.input_value(0)? {
        let cast = value.cast_to_dt(to)?.into_owned();
        ctx.set_output_value(0, cast)?;
    }
    Ok(())
}

pub(crate) fn register_all_ops(reg: &mut OpRegistry) {
    reg.insert(OpEntry::new("Convert", infer).with_required(&["destination_type"]));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(to: &str, input: NodeId, g: &mut Graph) -> MoResult<NodeId> {
        let op = OpNode::new("Convert").with_attr("destination_type", to);
        let out = g.wire("cvt", op, &[input])?;
        ShapeInference::new(&OpRegistry::standard()).infer_all(g)?;
        Ok(out)
    }

    #[test]
    fn folds_constants() {
        let mut g = Graph::default();
        let c = g.add_const("c", tensor1(&[0i64, 2, -3])).unwrap();
        let out = convert("f32", c, &mut g).unwrap();
        let data = g.data(out).unwrap();
        assert_eq!(data.shape.as_deref(), Some(&[3i64][..]));
        assert_eq!(data.value.as_deref(), Some(&tensor1(&[0.0f32, 2.0, -3.0])));

        let out = g
            .wire("b", OpNode::new("Convert").with_attr("destination_type", "boolean"), &[c])
            .unwrap();
        ShapeInference::new(&OpRegistry::standard()).infer_all(&mut g).unwrap();
        assert_eq!(g.data(out).unwrap().value.as_deref(), Some(&tensor1(&[false, true, true])));
    }

    #[test]
    fn shape_only() {
        let mut g = Graph::default();
        let a = g.add_parameter("a", &[2, -1]).unwrap();
        let out = convert("i64", a, &mut g).unwrap();
        let data = g.data(out).unwrap();
        assert_eq!(data.shape.as_deref(), Some(&[2i64, -1][..]));
        assert!(data.value.is_none());
    }

    #[test]
    fn unknown_type() {
        let mut g = Graph::default();
        let a = g.add_parameter("a", &[2]).unwrap();
        let e = convert("u8", a, &mut g).unwrap_err();
        assert!(matches!(error_kind(&e), Some(GraphError::ShapeInference { node, .. }) if node == "cvt"));

        let mut g = Graph::default();
        let a = g.add_parameter("a", &[2]).unwrap();
        g.wire("cvt", OpNode::new("Convert"), &[a]).unwrap();
        let e = ShapeInference::new(&OpRegistry::standard()).infer_all(&mut g).unwrap_err();
        assert!(matches!(
            error_kind(&e),
            Some(GraphError::ShapeInference { reason, .. }) if reason.contains("destination_type")
        ));
    }
}
