use crate::internal::*;
use ndarray::{ArrayD, ArrayViewD};

fn gather_t<T: Datum>(data: &Tensor, indices: &ArrayViewD<i64>, axis: usize) -> MoResult<Tensor> {
    let data = data.to_array_view::<T>()?;
    let dim = data.shape()[axis] as i64;
    if let Some(bad) = indices.iter().find(|&&i| i < -dim || i >= dim) {
        bail!("Index {bad} is out of bounds for axis {axis} of size {dim}");
    }
    let output = ArrayD::<T>::from_shape_fn(indices.shape(), |mut coords| {
        let index = indices[&coords];
        coords[axis] = if index < 0 { index + dim } else { index } as usize;
        data[coords].clone()
    });
    Ok(output.into_tensor())
}

/// `output[i][j][k] = data[i][indices[i][j][k]][k]` for axis 1, and so on.
pub fn gather_elements_values(data: &Tensor, indices: &Tensor, axis: usize) -> MoResult<Tensor> {
    ensure!(
        data.rank() == indices.rank(),
        "data rank {} and indices rank {} differ",
        data.rank(),
        indices.rank()
    );
    let indices = indices.cast_to::<i64>()?;
    let indices = indices.to_array_view::<i64>()?;
    dispatch_datum!(gather_t(data.datum_type())(data, &indices, axis))
}

pub(super) fn infer(ctx: &mut InferenceContext) -> MoResult<()> {
    let data_shape = ctx.input_shape(0)?;
    let indices_shape = ctx.input_shape(1)?;
    ensure!(
        data_shape.len() == indices_shape.len(),
        "data rank {} and indices rank {} differ",
        data_shape.len(),
        indices_shape.len()
    );
    let axis = normalize_axis(ctx.attr_i64("axis")?, data_shape.len())?;
    for (ix, (&d, &i)) in data_shape.iter().zip(indices_shape.iter()).enumerate() {
        if ix != axis && d >= 0 && i >= 0 {
            ensure!(d == i, "data and indices differ on axis {ix} ({d} vs {i})");
        }
    }
    ctx.set_output_shape(0, &indices_shape)?;
    if let (Some(data), Some(indices)) = (ctx.input_value(0)?, ctx.input_value(1)?) {
        ctx.set_output_value(0, gather_elements_values(&data, &indices, axis)?)?;
    }
    Ok(())
}
