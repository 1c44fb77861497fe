use crate::internal::*;
use crate::ops::volume;

/// Resolves a reshape pattern against an input shape.
///
/// With `special_zero`, a `0` copies the input dimension at the same index.
/// A single `-1` takes whatever volume is left. Unknown input dimensions
/// leave the `-1` unresolved.
pub fn compute_shape(input: &[i64], pattern: &[i64], special_zero: bool) -> MoResult<Shape> {
    let mut shape: Shape = tvec!();
    let mut wildcard = None;
    for (ix, &d) in pattern.iter().enumerate() {
        if d == 0 && special_zero {
            let dim = input.get(ix).with_context(|| {
                format!("Pattern {pattern:?} copies axis {ix} of a rank {} input", input.len())
            })?;
            shape.push(*dim);
        } else if d == -1 {
            ensure!(wildcard.is_none(), "Pattern {pattern:?} has more than one -1");
            wildcard = Some(ix);
            shape.push(-1);
        } else {
            ensure!(d >= 0, "Invalid dimension {d} in pattern {pattern:?}");
            shape.push(d);
        }
    }
    if input.iter().any(|&d| d < 0) {
        return Ok(shape);
    }
    let input_volume = volume(input)?;
    let others: Shape =
        shape.iter().enumerate().filter(|(ix, _)| Some(*ix) != wildcard).map(|p| *p.1).collect();
    let known = volume(&others)?;
    if let Some(pos) = wildcard {
        ensure!(
            known != 0 && input_volume % known == 0,
            "Can not reshape {input:?} to {pattern:?}: {input_volume} elements are not divisible by {known}"
        );
        shape[pos] = input_volume / known;
    } else {
        ensure!(
            known == input_volume,
            "Can not reshape {input:?} ({input_volume} elements) to {shape:?} ({known} elements)"
        );
    }
    Ok(shape)
}

pub(super) fn infer(ctx: &mut InferenceContext) -> MoResult<()> {
    let special_zero = ctx.attr_bool("special_zero")?;
    let input = ctx.input_shape(0)?;
    let Some(pattern) = ctx.input_value(1)? else {
        let pattern_shape = ctx.input_shape(1)?;
        return match &*pattern_shape {
            [len] if *len >= 0 => ctx.set_output_shape(0, &tvec![-1i64; *len as usize]),
            _ => ctx.set_output_unknown(0),
        };
    };
    let shape = compute_shape(&input, &pattern.to_i64s()?, special_zero)?;
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
    use proptest::prelude::*;

    #[test]
    fn compute_invalid() {
        assert!(compute_shape(&[3, 4, 5], &[100], true).is_err());
    }

    #[test]
    fn volume_overflow() {
        assert!(compute_shape(&[i64::MAX, 2], &[-1], true).is_err());
        assert!(compute_shape(&[2, 2], &[i64::MAX, 2, -1], true).is_err());
    }

    #[test]
    fn compute_with_leading_zero() {
        assert_eq!(&*compute_shape(&[3, 4, 5], &[0, 0, 5], true).unwrap(), &[3, 4, 5])
    }

    #[test]
    fn compute_with_leading_zero_with_flatten() {
        assert_eq!(&*compute_shape(&[2, 3, 5, 7], &[2, 0, 35], true).unwrap(), &[2, 3, 35])
    }

    #[test]
    fn compute_with_trailing_zero() {
        assert_eq!(&*compute_shape(&[3, 4, 5], &[3, -1, 0], true).unwrap(), &[3, 4, 5])
    }

    #[test]
    fn literal_zero() {
        assert_eq!(&*compute_shape(&[0, 4], &[0, 8], false).unwrap(), &[0, 8]);
        assert!(compute_shape(&[0, 4], &[0, -1], false).is_err());
    }

    #[test]
    fn several_wildcards() {
        assert!(compute_shape(&[3, 4], &[-1, -1], true).is_err());
    }

    #[test]
    fn not_divisible() {
        assert!(compute_shape(&[3, 4], &[5, -1], true).is_err());
    }

    #[test]
    fn unknown_input() {
        assert_eq!(&*compute_shape(&[-1, 4], &[0, 2, -1], true).unwrap(), &[-1, 2, -1]);
    }

    #[test]
    fn folds_value() {
        let mut g = Graph::default();
        let data = g.add_const("data", tensor2(&[[1i64, 2, 3], [4, 5, 6]])).unwrap();
        let pattern = g.add_const("pattern", tensor1(&[-1i64, 2])).unwrap();
        let out = g.wire("reshape", OpNode::new("Reshape"), &[data, pattern]).unwrap();
        ShapeInference::new(&OpRegistry::standard()).infer_all(&mut g).unwrap();
        let out = g.data(out).unwrap();
        assert_eq!(&**out.value.as_ref().unwrap(), &tensor2(&[[1i64, 2], [3, 4], [5, 6]]));
    }

    proptest! {
        #[test]
        fn wildcard_recovers_dim(dims in proptest::collection::vec(1i64..6, 1..5), ix in any::<prop::sample::Index>()) {
            let ix = ix.index(dims.len());
            let mut pattern = dims.clone();
            pattern[ix] = -1;
            let input = [dims.iter().product::<i64>()];
            prop_assert_eq!(compute_shape(&input, &pattern, true).unwrap().to_vec(), dims);
        }
    }
}
