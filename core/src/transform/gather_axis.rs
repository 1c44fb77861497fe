use super::*;
use crate::model::AttrValue;
use crate::ops::normalize_axis;

/// Rewrites negative `axis` attributes of `GatherElements` to their
/// positive equivalent.
#[derive(Clone, Debug, Default)]
pub struct GatherElementsAxisNormalizer;

impl Transformation for GatherElementsAxisNormalizer {
    fn descriptor(&self) -> TransformationDescriptor {
        TransformationDescriptor::annotation("GatherElementsAxisNormalizer", Stage::Back)
    }

    fn find_and_replace_pattern(&self, graph: &mut Graph) -> MoResult<()> {
        for id in graph.op_nodes_of("GatherElements") {
            let Some(axis) = graph.op(id)?.attrs.get("axis").and_then(|a| a.as_int()) else {
                continue;
            };
            if axis >= 0 {
                continue;
            }
            let Some(data) = graph.input_data(id, 0)? else { continue };
            let Some(rank) = graph.data(data)?.shape.as_ref().map(|s| s.len()) else { continue };
            let axis = normalize_axis(axis, rank)? as i64;
            graph.op_mut(id)?.attrs.insert("axis".to_string(), AttrValue::Int(axis));
        }
        Ok(())
    }
}
