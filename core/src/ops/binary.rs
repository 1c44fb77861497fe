//! Binary element-wise ops with multidirectional broadcasting.
use crate::broadcast::multi_broadcast;
use crate::internal::*;
use ndarray::{IxDyn, Zip};

fn fold_t<T: Datum + Copy>(a: &Tensor, b: &Tensor, shape: &[usize], f: fn(T, T) -> T) -> MoResult<Tensor> {
    let a = a.to_array_view::<T>()?;
    let b = b.to_array_view::<T>()?;
    let a = a.broadcast(IxDyn(shape)).with_context(|| format!("Broadcasting {:?}", a.shape()))?;
    let b = b.broadcast(IxDyn(shape)).with_context(|| format!("Broadcasting {:?}", b.shape()))?;
    Ok(Zip::from(a).and(b).map_collect(|x, y| f(*x, *y)).into_tensor())
}

fn infer_binary(
    ctx: &mut InferenceContext,
    f_i64: fn(i64, i64) -> i64,
    f_f32: fn(f32, f32) -> f32,
) -> MoResult<()> {
    let a = ctx.input_shape(0)?;
    let b = ctx.input_shape(1)?;
    let shape = multi_broadcast(&[&a, &b])?;
    ctx.set_output_shape(0, &shape)?;
    let (Some(a), Some(b)) = (ctx.input_value(0)?, ctx.input_value(1)?) else { return Ok(()) };
    let dims: TVec<usize> = shape.iter().map(|&d| d as usize).collect();
    let folded = match (a.datum_type(), b.datum_type()) {
        (DatumType::I64, DatumType::I64) => fold_t(&a, &b, &dims, f_i64)?,
        (x, y) if x.is_number() && y.is_number() => {
            fold_t(&*a.cast_to::<f32>()?, &*b.cast_to::<f32>()?, &dims, f_f32)?
        }
        _ => return Ok(()),
    };
    ctx.set_output_value(0, folded)
}

/// Integer folds wrap on overflow.
macro_rules! binary {
    ($func:ident, |$a:ident, $b:ident| $int:expr, $float:expr) => {
        fn $func(ctx: &mut InferenceContext) -> MoResult<()> {
            fn int($a: i64, $b: i64) -> i64 {
                $int
            }
            fn float($a: f32, $b: f32) -> f32 {
                $float
            }
            infer_binary(ctx, int, float)
        }
    };
}

binary!(add, |a, b| a.wrapping_add(b), a + b);
binary!(mul, |a, b| a.wrapping_mul(b), a * b);
binary!(maximum, |a, b| a.max(b), if a >= b { a } else { b });
binary!(
    squared_difference,
    |a, b| a.wrapping_sub(b).wrapping_mul(a.wrapping_sub(b)),
    (a - b) * (a - b)
);

/// Ops whose inputs can be swapped.
pub const COMMUTATIVE: &[&str] = &["Add", "Multiply", "Maximum"];

pub(crate) fn register_all_ops(reg: &mut OpRegistry) {
    let ops: [(&str, InferFn); 4] = [
        ("Add", add),
        ("Multiply", mul),
        ("Maximum", maximum),
        ("SquaredDifference", squared_difference),
    ];
    for (op, infer) in ops {
        reg.insert(OpEntry::new(op, infer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(op: &str, a: Tensor, b: Tensor) -> MoResult<DataNode> {
        let mut g = Graph::default();
        let a = g.add_const("a", a)?;
        let b = g.add_const("b", b)?;
        let out = g.wire("op", OpNode::new(op), &[a, b])?;
        ShapeInference::new(&OpRegistry::standard()).infer_all(&mut g)?;
        Ok(g.data(out)?.clone())
    }

    #[test]
    fn add_broadcast() {
        let out = run("Add", tensor2(&[[1i64], [2]]), tensor1(&[10i64, 20, 30])).unwrap();
        assert_eq!(out.shape.as_deref(), Some(&[2i64, 3][..]));
        assert_eq!(&**out.value.as_ref().unwrap(), &tensor2(&[[11i64, 21, 31], [12, 22, 32]]));
    }

    #[test]
    fn mixed_types_fold_as_float() {
        let out = run("Multiply", tensor1(&[2i64, 3]), tensor0(0.5f32)).unwrap();
        assert_eq!(&**out.value.as_ref().unwrap(), &tensor1(&[1f32, 1.5]));
    }

    #[test]
    fn maximum_and_squared_difference() {
        let out = run("Maximum", tensor1(&[1f32, 5.0]), tensor1(&[3f32, 2.0])).unwrap();
        assert_eq!(&**out.value.as_ref().unwrap(), &tensor1(&[3f32, 5.0]));
        let out = run("SquaredDifference", tensor1(&[1i64, 5]), tensor1(&[3i64, 2])).unwrap();
        assert_eq!(&**out.value.as_ref().unwrap(), &tensor1(&[4i64, 9]));
    }

    #[test]
    fn integer_folds_wrap() {
        let out = run("Add", tensor1(&[i64::MAX]), tensor1(&[1i64])).unwrap();
        assert_eq!(&**out.value.as_ref().unwrap(), &tensor1(&[i64::MIN]));
        let out = run("Multiply", tensor1(&[i64::MAX]), tensor1(&[2i64])).unwrap();
        assert_eq!(&**out.value.as_ref().unwrap(), &tensor1(&[-2i64]));
        let out = run("SquaredDifference", tensor1(&[i64::MIN]), tensor1(&[1i64])).unwrap();
        assert_eq!(out.shape.as_deref(), Some(&[1i64][..]));
    }

    #[test]
    fn incompatible() {
        let e = run("Add", tensor1(&[1i64, 2]), tensor1(&[1i64, 2, 3])).unwrap_err();
        assert!(matches!(error_kind(&e), Some(GraphError::ShapeInference { .. })));
    }
}
