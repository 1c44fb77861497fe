//! Pattern-matching rewrites of the graph.
//!
//! A transformation finds its pattern procedurally, by walking the graph,
//! and edits it in place. It declares where it runs in a
//! [`TransformationDescriptor`]; the [`Pipeline`](crate::optim::Pipeline)
//! takes care of ordering, normalization and re-inference.
use crate::errors::MoResult;
use crate::model::{Graph, NodeId, Stage};
use moir_data::prelude::*;
use std::fmt::Debug;

mod fifo_queue;
mod gather_axis;
mod identity;
mod matmul_reshape;

pub use self::fifo_queue::FifoQueueReplacer;
pub use self::gather_axis::GatherElementsAxisNormalizer;
pub use self::identity::RemoveIdentity;
pub use self::matmul_reshape::HcReshapeMatMulFold;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransformationKind {
    /// Changes the structure: followed by normalization and re-inference.
    PatternReplacement,
    /// Only rewrites attributes.
    Annotation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RunMode {
    Once,
    /// Repeated until the graph stops changing.
    FixedPoint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransformationDescriptor {
    pub id: String,
    pub stage: Stage,
    pub run_after: Vec<String>,
    pub run_before: Vec<String>,
    pub kind: TransformationKind,
    pub mode: RunMode,
}

impl TransformationDescriptor {
    pub fn pattern(id: impl Into<String>, stage: Stage) -> TransformationDescriptor {
        TransformationDescriptor {
            id: id.into(),
            stage,
            run_after: vec![],
            run_before: vec![],
            kind: TransformationKind::PatternReplacement,
            mode: RunMode::Once,
        }
    }

    pub fn annotation(id: impl Into<String>, stage: Stage) -> TransformationDescriptor {
        TransformationDescriptor {
            kind: TransformationKind::Annotation,
            ..TransformationDescriptor::pattern(id, stage)
        }
    }

    pub fn after(mut self, id: impl Into<String>) -> TransformationDescriptor {
        self.run_after.push(id.into());
        self
    }

    pub fn before(mut self, id: impl Into<String>) -> TransformationDescriptor {
        self.run_before.push(id.into());
        self
    }

    pub fn to_fixed_point(mut self) -> TransformationDescriptor {
        self.mode = RunMode::FixedPoint;
        self
    }
}

/// A graph rewrite. Implementations must be idempotent: applying one twice
/// leaves the graph as a single application did.
pub trait Transformation: Debug + Send + Sync + dyn_clone::DynClone {
    fn descriptor(&self) -> TransformationDescriptor;

    fn find_and_replace_pattern(&self, graph: &mut Graph) -> MoResult<()>;
}

dyn_clone::clone_trait_object!(Transformation);

/// The op node producing input `port` of `op`, if any.
pub fn producer_op(graph: &Graph, op: NodeId, port: usize) -> MoResult<Option<NodeId>> {
    match graph.input_data(op, port)? {
        Some(data) => graph.producer(data),
        None => Ok(None),
    }
}

/// `base`, or `base.<i>` with the first free `i`.
pub fn unique_name(graph: &Graph, base: &str) -> String {
    let mut name = base.to_string();
    let mut i = 0;
    while graph.contains(&name) {
        i += 1;
        name = format!("{base}.{i}");
    }
    name
}

/// Flags `op` and the ops consuming its outputs for inference.
pub fn mark_neighbourhood(graph: &mut Graph, op: NodeId) -> MoResult<()> {
    graph.mark_for_inference(op)?;
    for data in graph.outputs(op)? {
        graph.mark_for_inference(data)?;
    }
    Ok(())
}

/// Rewrites the value of a `Const` op and of its output data node.
pub fn set_const_value(graph: &mut Graph, konst: NodeId, value: impl IntoArcTensor) -> MoResult<()> {
    let value = value.into_arc_tensor();
    graph.op_mut(konst)?.attrs.insert("value".to_string(), value.clone().into());
    for data in graph.outputs(konst)? {
        let data = graph.data_mut(data)?;
        data.shape = Some(value.shape().iter().map(|&d| d as i64).collect::<TVec<_>>());
        data.value = Some(value.clone());
    }
    Ok(())
}
