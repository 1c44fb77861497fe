//! Shape and value propagation.
use crate::errors::{GraphError, MoResult};
use crate::model::{AttrValue, Attrs, DataNode, Graph, NodeId, Shape};
use anyhow::format_err;
use moir_data::prelude::*;
use std::sync::Arc;

mod analyser;

pub use self::analyser::ShapeInference;

/// Inference rule of an op-kind.
pub type InferFn = fn(&mut InferenceContext) -> MoResult<()>;

/// The view an inference rule gets of the node it is working on.
///
/// Attributes are the node's, merged over the registry defaults. Every
/// write to a data node is recorded so that the engine can revisit the
/// consumers.
pub struct InferenceContext<'g> {
    graph: &'g mut Graph,
    node: NodeId,
    name: String,
    attrs: Attrs,
    changed: TVec<NodeId>,
}

impl<'g> InferenceContext<'g> {
    pub(crate) fn new(graph: &'g mut Graph, node: NodeId, attrs: Attrs) -> MoResult<Self> {
        let name = graph.node(node)?.name.clone();
        Ok(InferenceContext { graph, node, name, attrs, changed: tvec!() })
    }

    pub(crate) fn into_changed(self) -> TVec<NodeId> {
        self.changed
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn graph(&self) -> &Graph {
        self.graph
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    fn typed_attr<T>(&self, name: &str, what: &str, f: impl Fn(&AttrValue) -> Option<T>) -> MoResult<T> {
        let attr = self.attr(name).ok_or_else(|| format_err!("Missing attribute {name}"))?;
        f(attr).ok_or_else(|| format_err!("Attribute {name} is not {what} (got {attr:?})"))
    }

    pub fn attr_i64(&self, name: &str) -> MoResult<i64> {
        self.typed_attr(name, "an integer", AttrValue::as_int)
    }

    pub fn attr_bool(&self, name: &str) -> MoResult<bool> {
        self.typed_attr(name, "a boolean", AttrValue::as_bool)
    }

    pub fn attr_ints(&self, name: &str) -> MoResult<TVec<i64>> {
        self.typed_attr(name, "an integer list", AttrValue::as_ints)
    }

    pub fn attr_str(&self, name: &str) -> MoResult<&str> {
        let attr = self.attr(name).ok_or_else(|| format_err!("Missing attribute {name}"))?;
        attr.as_str().ok_or_else(|| format_err!("Attribute {name} is not a string (got {attr:?})"))
    }

    /// Sets an attribute, on the node itself too.
    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) -> MoResult<()> {
        let value = value.into();
        let op = self.graph.op(self.node)?;
        if op.attrs.get(name) != Some(&value) {
            self.graph.op_mut(self.node)?.attrs.insert(name.to_string(), value.clone());
        }
        self.attrs.insert(name.to_string(), value);
        Ok(())
    }

    /// Number of connected inputs.
    pub fn input_count(&self) -> usize {
        self.graph.in_edges(self.node).map(|e| e.len()).unwrap_or(0)
    }

    fn input_id(&self, port: usize) -> MoResult<NodeId> {
        self.graph
            .input_data(self.node, port)?
            .ok_or_else(|| format_err!("Input {port} is not connected"))
    }

    pub fn input_data(&self, port: usize) -> MoResult<&DataNode> {
        self.graph.data(self.input_id(port)?)
    }

    pub fn input_shape(&self, port: usize) -> MoResult<Shape> {
        self.input_data(port)?
            .shape
            .clone()
            .ok_or_else(|| format_err!("Shape of input {port} is unknown"))
    }

    pub fn input_value(&self, port: usize) -> MoResult<Option<Arc<Tensor>>> {
        Ok(self.input_data(port)?.value.clone())
    }

    /// Does input `port` feed other nodes too ?
    pub fn input_is_shared(&self, port: usize) -> MoResult<bool> {
        Ok(self.graph.consumers(self.input_id(port)?)?.len() > 1)
    }

    /// Rewrites the value of an input, and the `value` of the `Const` that
    /// produces it. Inputs shared with other consumers are left untouched.
    pub fn set_input_value(&mut self, port: usize, value: impl IntoArcTensor) -> MoResult<()> {
        if self.input_is_shared(port)? {
            debug!("{}: input {port} is shared, not rewriting it", self.name);
            return Ok(());
        }
        let id = self.input_id(port)?;
        let value = value.into_arc_tensor();
        if let Some(producer) = self.graph.producer(id)? {
            if self.graph.op(producer)?.op == "Const" {
                let attr = AttrValue::Tensor(value.clone());
                if self.graph.op(producer)?.attrs.get("value") != Some(&attr) {
                    self.graph.op_mut(producer)?.attrs.insert("value".to_string(), attr);
                }
            }
        }
        self.write(id, DataNode::new().with_value(value))
    }

    /// Connected output ports.
    pub fn output_ports(&self) -> TVec<usize> {
        self.graph
            .out_edges(self.node)
            .map(|es| es.iter().map(|e| e.out).collect())
            .unwrap_or_default()
    }

    fn write(&mut self, id: NodeId, data: DataNode) -> MoResult<()> {
        if *self.graph.data(id)? != data {
            *self.graph.data_mut(id)? = data;
            if !self.changed.contains(&id) {
                self.changed.push(id);
            }
        }
        Ok(())
    }

    fn output(&mut self, port: usize, data: DataNode) -> MoResult<()> {
        match self.graph.output_data(self.node, port)? {
            Some(id) => self.write(id, data),
            None => Ok(()),
        }
    }

    /// Sets the shape of an output, clearing its value. Unconnected outputs
    /// are ignored.
    pub fn set_output_shape(&mut self, port: usize, shape: &[i64]) -> MoResult<()> {
        if let Some(&bad) = shape.iter().find(|&&d| d < -1) {
            return Err(GraphError::ShapeInference {
                node: self.name.clone(),
                reason: format!("invalid dimension {bad} in output shape {shape:?}"),
            }
            .into());
        }
        self.output(port, DataNode::new().with_shape(shape))
    }

    /// Sets the value of an output, and its shape to match.
    pub fn set_output_value(&mut self, port: usize, value: impl IntoArcTensor) -> MoResult<()> {
        self.output(port, DataNode::new().with_value(value))
    }

    pub fn set_output_unknown(&mut self, port: usize) -> MoResult<()> {
        self.output(port, DataNode::new())
    }
}
