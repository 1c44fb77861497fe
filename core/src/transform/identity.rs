use super::*;

/// Removes `Identity` ops, except the ones feeding a `Result`, by merging
/// their input and output data nodes.
#[derive(Clone, Debug, Default)]
pub struct RemoveIdentity;

impl Transformation for RemoveIdentity {
    fn descriptor(&self) -> TransformationDescriptor {
        TransformationDescriptor::pattern("RemoveIdentity", Stage::Middle).to_fixed_point()
    }

    fn find_and_replace_pattern(&self, graph: &mut Graph) -> MoResult<()> {
        for id in graph.op_nodes_of("Identity") {
            let (Some(input), Some(output)) = (graph.input_data(id, 0)?, graph.output_data(id, 0)?)
            else {
                continue;
            };
            let feeds_result = graph
                .consumers(output)?
                .iter()
                .map(|e| graph.node(e.dst).map(|n| n.op_is("Result")))
                .collect::<MoResult<Vec<bool>>>()?
                .into_iter()
                .any(|r| r);
            if feeds_result {
                continue;
            }
            debug!("Removing identity {}", graph.node(id)?.name);
            graph.merge_data_nodes(input, output)?;
            graph.remove_node_by_id(id, true)?;
            graph.mark_for_inference(input)?;
        }
        Ok(())
    }
}
