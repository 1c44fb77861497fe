use crate::internal::*;
use crate::ops::volume;

/// Output shape of inserting unit axes at `axes`, given in output
/// coordinates. Returns the normalized axes too, in their original order.
pub fn unsqueeze_shape(input: &[i64], axes: &[i64]) -> MoResult<(Shape, TVec<i64>)> {
    let rank = input.len() + axes.len();
    let normalized: TVec<usize> =
        axes.iter().map(|&a| normalize_axis(a, rank)).collect::<MoResult<_>>()?;
    let mut sorted = normalized.clone();
    sorted.sort();
    if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
        bail!("Duplicate axis {} in unsqueeze axes {axes:?}", w[0]);
    }
    let mut shape: Shape = input.into();
    for axis in sorted {
        shape.insert(axis, 1);
    }
    Ok((shape, normalized.iter().map(|&a| a as i64).collect()))
}

pub(super) fn infer(ctx: &mut InferenceContext) -> MoResult<()> {
    let input = ctx.input_shape(0)?;
    let Some(axes) = ctx.input_value(1)? else {
        let axes_shape = ctx.input_shape(1)?;
        if axes_shape.iter().any(|&d| d < 0) {
            return ctx.set_output_unknown(0);
        }
        let n = volume(&axes_shape)? as usize;
        return ctx.set_output_shape(0, &tvec![-1i64; input.len() + n]);
    };
    let values = axes.to_i64s()?;
    let (shape, normalized) = unsqueeze_shape(&input, &values)?;
    if normalized != values && !ctx.input_is_shared(1)? {
        let rewritten = Tensor::from_shape(axes.shape(), &normalized[..])?;
        trace!("{}: axes {values:?} rewritten to {normalized:?}", ctx.name());
        ctx.set_input_value(1, rewritten)?;
    }
    ctx.set_output_shape(0, &shape)?;
    if let Some(value) = ctx.input_value(0)? {
        let dims: TVec<usize> = shape.iter().map(|&d| d as usize).collect();
        ctx.set_output_value(0, value.into_tensor().into_shape(&dims)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(input: &[i64], axes: Tensor) -> (Graph, NodeId, NodeId) {
        let mut g = Graph::default();
        let data = g.add_parameter("data", input).unwrap();
        let axes = g.add_const("axes", axes).unwrap();
        let out = g.wire("unsq", OpNode::new("Unsqueeze"), &[data, axes]).unwrap();
        ShapeInference::new(&OpRegistry::standard()).infer_all(&mut g).unwrap();
        (g, axes, out)
    }

    #[test]
    fn positive_axes() {
        let (g, _, out) = run(&[1, 3, 64, 64], tensor1(&[0i64, 4]));
        assert_eq!(g.data(out).unwrap().shape.as_deref(), Some(&[1i64, 1, 3, 64, 1, 64][..]));
    }

    #[test]
    fn negative_axis_is_rewritten() {
        let (g, axes, out) = run(&[2, 3, 64, 64], tensor1(&[-1i64]));
        assert_eq!(g.data(out).unwrap().shape.as_deref(), Some(&[2i64, 3, 64, 64, 1][..]));
        assert_eq!(&**g.data(axes).unwrap().value.as_ref().unwrap(), &tensor1(&[4i64]));
        let konst = g.get_node("axes").unwrap().as_op().unwrap();
        assert_eq!(konst.attrs["value"], AttrValue::from(tensor1(&[4i64])));
    }

    #[test]
    fn shared_axes_are_kept() {
        let mut g = Graph::default();
        let axes = g.add_const("axes", tensor1(&[-1i64])).unwrap();
        let small = g.add_parameter("small", &[2, 3]).unwrap();
        let large = g.add_parameter("large", &[2, 3, 4]).unwrap();
        let u1 = g.wire("u1", OpNode::new("Unsqueeze"), &[small, axes]).unwrap();
        let u2 = g.wire("u2", OpNode::new("Unsqueeze"), &[large, axes]).unwrap();
        ShapeInference::new(&OpRegistry::standard()).infer_all(&mut g).unwrap();
        assert_eq!(g.data(u1).unwrap().shape.as_deref(), Some(&[2i64, 3, 1][..]));
        assert_eq!(g.data(u2).unwrap().shape.as_deref(), Some(&[2i64, 3, 4, 1][..]));
        assert_eq!(&**g.data(axes).unwrap().value.as_ref().unwrap(), &tensor1(&[-1i64]));
        let konst = g.get_node("axes").unwrap().as_op().unwrap();
        assert_eq!(konst.attrs["value"], AttrValue::from(tensor1(&[-1i64])));
    }

    #[test]
    fn duplicates() {
        assert!(unsqueeze_shape(&[2, 3], &[0, -4]).is_err());
        assert!(unsqueeze_shape(&[2, 3], &[3]).is_err());
    }
}
