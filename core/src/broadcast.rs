//! N-way shape broadcast
use crate::errors::MoResult;
use crate::model::Shape;
use anyhow::bail;
use moir_data::prelude::*;

fn broadcast_dim(a: i64, b: i64) -> MoResult<i64> {
    Ok(match (a, b) {
        (a, b) if a == b => a,
        (1, b) => b,
        (a, 1) => a,
        (-1, b) => b,
        (a, -1) => a,
        (a, b) => bail!("Can not broadcast dimensions {a} and {b}"),
    })
}

/// Computes a shape, if any, to which all shapes can be broadcasted.
///
/// Unknown dimensions (`-1`) broadcast against anything but resolve to the
/// other side when it is known and not 1.
pub fn multi_broadcast(shapes: &[impl AsRef<[i64]>]) -> MoResult<Shape> {
    let Some(len) = shapes.iter().map(|shape| shape.as_ref().len()).max() else {
        return Ok(tvec!());
    };
    let mut shape: Shape = tvec!();
    for i in 0..len {
        let mut wanted_size = 1;
        for s in shapes {
            let s = s.as_ref();
            let dim = if i < s.len() { s[s.len() - i - 1] } else { 1 };
            wanted_size = broadcast_dim(wanted_size, dim).map_err(|e| {
                e.context(format!(
                    "Broadcasting {:?}",
                    shapes.iter().map(|s| s.as_ref()).collect::<Vec<_>>()
                ))
            })?;
        }
        shape.push(wanted_size)
    }
    shape.reverse();
    Ok(shape)
}
