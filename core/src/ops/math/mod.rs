mod mat_mul;

pub use self::mat_mul::{mat_mul_shape, mat_mul_values};

use crate::ops::{OpEntry, OpRegistry};

pub(crate) fn register_all_ops(reg: &mut OpRegistry) {
    reg.insert(
        OpEntry::new("MatMul", mat_mul::infer)
            .with_default("transpose_a", false)
            .with_default("transpose_b", false),
    );
}
