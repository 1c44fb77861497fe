//! Graph boundaries: `Parameter`, `Const`, `Result`, plus `Identity`.
use crate::internal::*;

pub(crate) fn register_all_ops(reg: &mut OpRegistry) {
    reg.insert(OpEntry::new("Parameter", parameter).with_required(&["shape"]));
    reg.insert(OpEntry::new("Const", konst).with_required(&["value"]));
    reg.insert(OpEntry::new("Result", result));
    reg.insert(OpEntry::new("Identity", identity));
}

fn parameter(ctx: &mut InferenceContext) -> MoResult<()> {
    let shape = ctx.attr_ints("shape")?;
    ctx.set_output_shape(0, &shape)
}

fn konst(ctx: &mut InferenceContext) -> MoResult<()> {
    let value = ctx
        .attr("value")
        .and_then(|v| v.as_tensor())
        .cloned()
        .context("Const value must be a tensor")?;
    ctx.set_output_value(0, value)
}

fn result(_ctx: &mut InferenceContext) -> MoResult<()> {
    Ok(())
}

/// Forwards shape and value.
pub fn identity(ctx: &mut InferenceContext) -> MoResult<()> {
    let shape = ctx.input_shape(0)?;
    ctx.set_output_shape(0, &shape)?;
    if let Some(value) = ctx.input_value(0)? {
        ctx.set_output_value(0, value)?;
    }
    Ok(())
}
