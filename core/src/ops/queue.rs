//! TensorFlow input queues. They carry no shape information: the front
//! stage replaces them with plain parameters.
use crate::internal::*;

fn unknown_outputs(ctx: &mut InferenceContext) -> MoResult<()> {
    for port in ctx.output_ports() {
        ctx.set_output_unknown(port)?;
    }
    Ok(())
}

pub(crate) fn register_all_ops(reg: &mut OpRegistry) {
    reg.insert(OpEntry::new("FIFOQueueV2", unknown_outputs));
    reg.insert(OpEntry::new("QueueDequeueUpToV2", unknown_outputs).with_fixed_output_ports());
}
