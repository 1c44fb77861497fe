/// # Operators on array and shapes
mod gather_elements;
mod reshape;
mod sparse_reshape;
mod unsqueeze;

pub use self::gather_elements::gather_elements_values;
pub use self::reshape::compute_shape;
pub use self::sparse_reshape::sparse_reshape_shape;
pub use self::unsqueeze::unsqueeze_shape;

use crate::ops::{OpEntry, OpRegistry};

pub(crate) fn register_all_ops(reg: &mut OpRegistry) {
    reg.insert(OpEntry::new("Reshape", reshape::infer).with_default("special_zero", true));
    reg.insert(OpEntry::new("Unsqueeze", unsqueeze::infer));
    reg.insert(OpEntry::new("GatherElements", gather_elements::infer).with_default("axis", 0));
    reg.insert(OpEntry::new("SparseReshape", sparse_reshape::infer).with_fixed_output_ports());
}
