use crate::internal::*;
use crate::ops::volume;

/// Resolves the dense shape of a sparse reshape.
pub fn sparse_reshape_shape(input_shape: &[i64], new_shape: &[i64]) -> MoResult<Shape> {
    if let Some(bad) = new_shape.iter().find(|&&d| d < -1) {
        bail!("Invalid dimension {bad} in new shape {new_shape:?}");
    }
    let wildcards = new_shape.iter().filter(|&&d| d == -1).count();
    ensure!(wildcards <= 1, "New shape {new_shape:?} has more than one -1");
    let mut shape: Shape = new_shape.into();
    if input_shape.iter().any(|&d| d < 0) {
        return Ok(shape);
    }
    let known_dims: Shape = new_shape.iter().copied().filter(|&d| d != -1).collect();
    let (total, known) = (volume(input_shape)?, volume(&known_dims)?);
    if let Some(pos) = shape.iter().position(|&d| d == -1) {
        ensure!(
            known != 0 && total % known == 0,
            "Can not sparse-reshape {input_shape:?} to {new_shape:?}"
        );
        shape[pos] = total / known;
    } else {
        ensure!(
            known == total,
            "Can not sparse-reshape {input_shape:?} ({total} elements) to {new_shape:?} ({known} elements)"
        );
    }
    Ok(shape)
}

fn reshape_indices(indices: &Tensor, input_shape: &[i64], output_shape: &[i64]) -> MoResult<Tensor> {
    let indices = indices.cast_to::<i64>()?;
    let indices = indices.to_array_view::<i64>()?;
    let rows = indices.shape()[0];
    let mut output: Vec<i64> = Vec::with_capacity(rows * output_shape.len());
    for row in indices.outer_iter() {
        let mut linear = 0i64;
        for (&i, &d) in row.iter().zip(input_shape.iter()) {
            ensure!(0 <= i && i < d, "Sparse index {i} is out of bounds for dimension {d}");
            linear = linear
                .checked_mul(d)
                .and_then(|l| l.checked_add(i))
                .with_context(|| format!("Linear sparse index overflows for shape {input_shape:?}"))?;
        }
        let mut coords: TVec<i64> = tvec!();
        for &d in output_shape.iter().rev() {
            coords.push(linear % d);
            linear /= d;
        }
        output.extend(coords.iter().rev());
    }
    Tensor::from_shape(&[rows, output_shape.len()], &output[..])
}

/// Outputs are positional: 0 is the reshaped indices, 1 the dense shape.
pub(super) fn infer(ctx: &mut InferenceContext) -> MoResult<()> {
    let indices_shape = ctx.input_shape(0)?;
    ensure!(indices_shape.len() == 2, "Sparse indices must be a matrix, got shape {indices_shape:?}");
    let new_shape_shape = ctx.input_shape(2)?;
    ensure!(new_shape_shape.len() == 1, "New shape must be a vector, got shape {new_shape_shape:?}");
    let out_rank = new_shape_shape[0];
    ctx.set_output_shape(0, &[indices_shape[0], out_rank])?;
    let (Some(input_shape), Some(new_shape)) = (ctx.input_value(1)?, ctx.input_value(2)?) else {
        return ctx.set_output_shape(1, &[out_rank]);
    };
    let input_shape = input_shape.to_i64s()?;
    ensure!(
        indices_shape[1] < 0 || indices_shape[1] == input_shape.len() as i64,
        "Sparse indices have {} columns for a rank {} input",
        indices_shape[1],
        input_shape.len()
    );
    let output_shape = sparse_reshape_shape(&input_shape, &new_shape.to_i64s()?)?;
    ctx.set_output_value(1, tensor1(&output_shape[..]))?;
    if let Some(indices) = ctx.input_value(0)? {
        if output_shape.iter().all(|&d| d > 0) {
            let reshaped = reshape_indices(&indices, &input_shape, &output_shape)?;
            ctx.set_output_value(0, reshaped)?;
        }
    }
    Ok(())
}
