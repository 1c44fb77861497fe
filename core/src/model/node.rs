use super::Attrs;
use moir_data::prelude::*;
use std::fmt;
use std::sync::Arc;

/// Dimensions of a data node. `-1` stands for an unknown dimension.
pub type Shape = TVec<i64>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub(crate) inputs: TVec<EdgeId>,
    pub(crate) outputs: TVec<EdgeId>,
}

impl Node {
    pub fn is_op(&self) -> bool {
        matches!(self.kind, NodeKind::Op(_))
    }

    pub fn is_data(&self) -> bool {
        matches!(self.kind, NodeKind::Data(_))
    }

    pub fn as_op(&self) -> Option<&OpNode> {
        match &self.kind {
            NodeKind::Op(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_op_mut(&mut self) -> Option<&mut OpNode> {
        match &mut self.kind {
            NodeKind::Op(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataNode> {
        match &self.kind {
            NodeKind::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_data_mut(&mut self) -> Option<&mut DataNode> {
        match &mut self.kind {
            NodeKind::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Is this an operation node of the given op-kind ?
    pub fn op_is(&self, op: &str) -> bool {
        self.as_op().is_some_and(|o| o.op == op)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            NodeKind::Op(op) => write!(f, "{} {:?} {}", self.id, self.name, op.op),
            NodeKind::Data(_) => write!(f, "{} {:?} data", self.id, self.name),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Op(OpNode),
    Data(DataNode),
}

impl From<OpNode> for NodeKind {
    fn from(op: OpNode) -> NodeKind {
        NodeKind::Op(op)
    }
}

impl From<DataNode> for NodeKind {
    fn from(data: DataNode) -> NodeKind {
        NodeKind::Data(data)
    }
}

/// An operation. `op` selects the inference rule in the registry, while
/// `type_name` is the name exposed to the emitter.
#[derive(Clone, Debug, PartialEq)]
pub struct OpNode {
    pub op: String,
    pub type_name: Option<String>,
    pub attrs: Attrs,
    pub needs_shape_inference: bool,
}

impl OpNode {
    pub fn new(op: impl Into<String>) -> OpNode {
        let op = op.into();
        OpNode { type_name: Some(op.clone()), op, attrs: Attrs::new(), needs_shape_inference: true }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<super::AttrValue>) -> OpNode {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_attrs(mut self, attrs: Attrs) -> OpNode {
        self.attrs.extend(attrs);
        self
    }

    pub fn with_type(mut self, type_name: Option<&str>) -> OpNode {
        self.type_name = type_name.map(|s| s.to_string());
        self
    }
}

/// A tensor flowing between operations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataNode {
    pub shape: Option<Shape>,
    pub value: Option<Arc<Tensor>>,
}

impl DataNode {
    pub fn new() -> DataNode {
        DataNode::default()
    }

    pub fn with_shape(mut self, shape: &[i64]) -> DataNode {
        self.shape = Some(shape.into());
        self
    }

    /// Sets the value, and the shape to match.
    pub fn with_value(mut self, value: impl IntoArcTensor) -> DataNode {
        let value = value.into_arc_tensor();
        self.shape = Some(value.shape().iter().map(|&d| d as i64).collect());
        self.value = Some(value);
        self
    }
}

/// A connection between an op and a data node. `out` is the port on the
/// source side, `inp` the port on the destination side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    pub id: EdgeId,
    pub src: NodeId,
    pub dst: NodeId,
    pub out: usize,
    pub inp: usize,
}
