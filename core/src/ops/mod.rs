//! Ops: inference rules for every op-kind the optimizer understands.
use crate::errors::MoResult;
use anyhow::{ensure, format_err};

pub mod array;
pub mod binary;
pub mod cast;
pub mod element_wise;
pub mod math;
pub mod nms;
pub mod queue;
mod registry;
pub mod source;

pub use self::registry::{OpEntry, OpRegistry};

/// Maps a possibly negative axis to `0..rank`.
pub fn normalize_axis(axis: i64, rank: usize) -> MoResult<usize> {
    let rank = rank as i64;
    ensure!(-rank <= axis && axis < rank, "Axis {axis} is out of range for rank {rank}");
    Ok((if axis < 0 { axis + rank } else { axis }) as usize)
}

/// Number of elements of a fully known shape. Overflow is an error.
pub fn volume(dims: &[i64]) -> MoResult<i64> {
    dims.iter()
        .try_fold(1i64, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| format_err!("Volume of {dims:?} overflows"))
}

pub(crate) fn register_all_ops(reg: &mut OpRegistry) {
    source::register_all_ops(reg);
    array::register_all_ops(reg);
    math::register_all_ops(reg);
    element_wise::register_all_ops(reg);
    binary::register_all_ops(reg);
    cast::register_all_ops(reg);
    nms::register_all_ops(reg);
    queue::register_all_ops(reg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axes() {
        assert_eq!(normalize_axis(-1, 4).unwrap(), 3);
        assert_eq!(normalize_axis(2, 4).unwrap(), 2);
        assert!(normalize_axis(4, 4).is_err());
        assert!(normalize_axis(-5, 4).is_err());
    }
}
