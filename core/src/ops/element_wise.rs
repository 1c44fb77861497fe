//! Unary element-wise ops: output has the input shape, constants are folded
//! for float inputs.
use crate::internal::*;

fn infer_unary(ctx: &mut InferenceContext, f: fn(f32) -> f32) -> MoResult<()> {
    let shape = ctx.input_shape(0)?;
    ctx.set_output_shape(0, &shape)?;
    if let Some(value) = ctx.input_value(0)? {
        if value.datum_type().is_float() {
            let folded = value.to_array_view::<f32>()?.mapv(f);
            ctx.set_output_value(0, folded.into_tensor())?;
        }
    }
    Ok(())
}

macro_rules! element_wise {
    ($func:ident, $f:expr) => {
        fn $func(ctx: &mut InferenceContext) -> MoResult<()> {
            infer_unary(ctx, $f)
        }
    };
}

element_wise!(relu, |x: f32| x.max(0.0));
element_wise!(tan, f32::tan);
element_wise!(atanh, f32::atanh);
element_wise!(erf, libm::erff);
element_wise!(softplus, |x: f32| if x > 20.0 { x } else { x.exp().ln_1p() });
element_wise!(cosh, f32::cosh);
element_wise!(acos, f32::acos);
element_wise!(abs, f32::abs);
element_wise!(exp, f32::exp);

pub(crate) fn register_all_ops(reg: &mut OpRegistry) {
    let ops: [(&str, InferFn); 9] = [
        ("Relu", relu),
        ("Tan", tan),
        ("Atanh", atanh),
        ("Erf", erf),
        ("SoftPlus", softplus),
        ("Cosh", cosh),
        ("Acos", acos),
        ("Abs", abs),
        ("Exp", exp),
    ];
    for (op, infer) in ops {
        reg.insert(OpEntry::new(op, infer));
    }
}
