use crate::broadcast::multi_broadcast;
use crate::internal::*;
use ndarray::{ArrayD, ArrayViewD, Axis, Dimension, IxDyn};
use num_traits::Zero;

/// Promotes rank-1 operands and applies the transpositions. Returns the
/// rank >= 2 shape.
fn promote(shape: &[i64], transpose: bool, left: bool) -> MoResult<Shape> {
    ensure!(!shape.is_empty(), "MatMul operands must have rank 1 or more");
    let mut shape: Shape = shape.into();
    if shape.len() == 1 {
        shape.insert(if left { 0 } else { 1 }, 1);
    } else if transpose {
        let r = shape.len();
        shape.swap(r - 2, r - 1);
    }
    Ok(shape)
}

/// Output shape of a numpy-style matrix product with optional transposition
/// of either operand.
pub fn mat_mul_shape(a: &[i64], b: &[i64], transpose_a: bool, transpose_b: bool) -> MoResult<Shape> {
    let pa = promote(a, transpose_a, true)?;
    let pb = promote(b, transpose_b, false)?;
    let (ra, rb) = (pa.len(), pb.len());
    let (k_a, k_b) = (pa[ra - 1], pb[rb - 2]);
    if k_a >= 0 && k_b >= 0 {
        ensure!(
            k_a == k_b,
            "Incompatible MatMul operands {a:?} and {b:?} (transpose_a: {transpose_a}, transpose_b: {transpose_b})"
        );
    }
    let mut shape = multi_broadcast(&[&pa[..ra - 2], &pb[..rb - 2]])?;
    if a.len() > 1 {
        shape.push(pa[ra - 2]);
    }
    if b.len() > 1 {
        shape.push(pb[rb - 1]);
    }
    Ok(shape)
}

fn promote_value<'a, T: Datum>(
    view: ArrayViewD<'a, T>,
    transpose: bool,
    left: bool,
) -> ArrayViewD<'a, T> {
    let r = view.ndim();
    if r == 1 {
        view.insert_axis(Axis(if left { 0 } else { 1 }))
    } else if transpose {
        let mut view = view;
        view.swap_axes(r - 2, r - 1);
        view
    } else {
        view
    }
}

/// Multiply-accumulate of the fold kernel. Integers wrap on overflow.
trait MulAcc: Datum + Copy + Zero {
    fn mul_acc(self, a: Self, b: Self) -> Self;
}

impl MulAcc for i64 {
    fn mul_acc(self, a: i64, b: i64) -> i64 {
        self.wrapping_add(a.wrapping_mul(b))
    }
}

impl MulAcc for f32 {
    fn mul_acc(self, a: f32, b: f32) -> f32 {
        self + a * b
    }
}

fn mat_mul_t<T: MulAcc>(
    a: &Tensor,
    b: &Tensor,
    transpose_a: bool,
    transpose_b: bool,
) -> MoResult<Tensor> {
    let a_shape: Shape = a.shape().iter().map(|&d| d as i64).collect();
    let b_shape: Shape = b.shape().iter().map(|&d| d as i64).collect();
    let c_shape = mat_mul_shape(&a_shape, &b_shape, transpose_a, transpose_b)?;
    let a_view = promote_value(a.to_array_view::<T>()?, transpose_a, true);
    let b_view = promote_value(b.to_array_view::<T>()?, transpose_b, false);
    let (ra, rb) = (a_view.ndim(), b_view.ndim());
    let (m, k, n) = (a_view.shape()[ra - 2], a_view.shape()[ra - 1], b_view.shape()[rb - 1]);
    let batch: TVec<usize> = multi_broadcast(&[
        &view_shape(&a_view)[..ra - 2],
        &view_shape(&b_view)[..rb - 2],
    ])?
    .iter()
    .map(|&d| d as usize)
    .collect();
    let full = |rows: usize, cols: usize| -> Vec<usize> {
        batch.iter().copied().chain([rows, cols]).collect()
    };
    let a_view = a_view
        .broadcast(IxDyn(&full(m, k)))
        .with_context(|| format!("Broadcasting {:?} to {:?}", a.shape(), full(m, k)))?;
    let b_view = b_view
        .broadcast(IxDyn(&full(k, n)))
        .with_context(|| format!("Broadcasting {:?} to {:?}", b.shape(), full(k, n)))?;
    let product = ArrayD::from_shape_fn(IxDyn(&full(m, n)), |coords| {
        let r = coords.ndim();
        let mut ac = coords.clone();
        let mut bc = coords.clone();
        (0..k).fold(T::zero(), |acc, kk| {
            ac[r - 1] = kk;
            bc[r - 2] = kk;
            acc.mul_acc(a_view[&ac], b_view[&bc])
        })
    });
    let dims: TVec<usize> = c_shape.iter().map(|&d| d as usize).collect();
    product.into_tensor().into_shape(&dims)
}

fn view_shape<T>(view: &ArrayViewD<T>) -> Shape {
    view.shape().iter().map(|&d| d as i64).collect()
}

/// Folds a matrix product of two constants.
pub fn mat_mul_values(a: &Tensor, b: &Tensor, transpose_a: bool, transpose_b: bool) -> MoResult<Tensor> {
    let dt = if a.datum_type().is_float() || b.datum_type().is_float() {
        DatumType::F32
    } else {
        a.datum_type()
    };
    let a = a.cast_to_dt(dt)?;
    let b = b.cast_to_dt(dt)?;
    dispatch_numbers!(mat_mul_t(dt)(&a, &b, transpose_a, transpose_b))
}

pub(super) fn infer(ctx: &mut InferenceContext) -> MoResult<()> {
    let transpose_a = ctx.attr_bool("transpose_a")?;
    let transpose_b = ctx.attr_bool("transpose_b")?;
    let a = ctx.input_shape(0)?;
    let b = ctx.input_shape(1)?;
    let shape = mat_mul_shape(&a, &b, transpose_a, transpose_b)?;
    ctx.set_output_shape(0, &shape)?;
    if let (Some(a), Some(b)) = (ctx.input_value(0)?, ctx.input_value(1)?) {
        ctx.set_output_value(0, mat_mul_values(&a, &b, transpose_a, transpose_b)?)?;
    }
    Ok(())
}
