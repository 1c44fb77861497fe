use super::*;
use crate::errors::{GraphError, MoResult};
use anyhow::Context;
use moir_data::prelude::*;

/// Extensions on Graph to build models more easily.
pub trait GraphDsl {
    fn add_op(&mut self, name: impl Into<String>, op: OpNode) -> MoResult<NodeId>;

    fn add_data(&mut self, name: impl Into<String>, data: DataNode) -> MoResult<NodeId>;

    /// Adds op `name` and its output data node `name_d`, returning both.
    fn add_op_with_data(&mut self, name: &str, op: OpNode) -> MoResult<(NodeId, NodeId)>;

    /// Adds a `Parameter` of the given shape, returning its output data node.
    fn add_parameter(&mut self, name: &str, shape: &[i64]) -> MoResult<NodeId>;

    /// Adds a `Const`, returning its valued output data node.
    fn add_const(&mut self, name: &str, value: impl IntoArcTensor) -> MoResult<NodeId>;

    fn add_result(&mut self, name: &str, input: NodeId) -> MoResult<NodeId>;

    /// Adds `op`, feeds it `inputs` in port order, and returns its output
    /// data node.
    fn wire(&mut self, name: &str, op: OpNode, inputs: &[NodeId]) -> MoResult<NodeId>;

    /// Connects two nodes by name: `"src:out"` to `"in:dst"`, ports being
    /// optional and defaulting to 0. When `src` is an op, its output data
    /// node for that port is used, or created.
    fn connect(&mut self, src: &str, dst: &str) -> MoResult<()>;
}

impl GraphDsl for Graph {
    fn add_op(&mut self, name: impl Into<String>, op: OpNode) -> MoResult<NodeId> {
        self.add_node(name, op)
    }

    fn add_data(&mut self, name: impl Into<String>, data: DataNode) -> MoResult<NodeId> {
        self.add_node(name, data)
    }

    fn add_op_with_data(&mut self, name: &str, op: OpNode) -> MoResult<(NodeId, NodeId)> {
        let op = self.add_op(name, op)?;
        let data = self.add_data(format!("{name}_d"), DataNode::new())?;
        self.add_edge(op, data, 0, 0)?;
        Ok((op, data))
    }

    fn add_parameter(&mut self, name: &str, shape: &[i64]) -> MoResult<NodeId> {
        let (_, data) =
            self.add_op_with_data(name, OpNode::new("Parameter").with_attr("shape", shape))?;
        self.data_mut(data)?.shape = Some(shape.into());
        Ok(data)
    }

    fn add_const(&mut self, name: &str, value: impl IntoArcTensor) -> MoResult<NodeId> {
        let value = value.into_arc_tensor();
        let (_, data) =
            self.add_op_with_data(name, OpNode::new("Const").with_attr("value", value.clone()))?;
        *self.data_mut(data)? = DataNode::new().with_value(value);
        Ok(data)
    }

    fn add_result(&mut self, name: &str, input: NodeId) -> MoResult<NodeId> {
        let op = self.add_op(name, OpNode::new("Result"))?;
        self.add_edge(input, op, 0, 0)?;
        Ok(op)
    }

    fn wire(&mut self, name: &str, op: OpNode, inputs: &[NodeId]) -> MoResult<NodeId> {
        let (op, data) = self.add_op_with_data(name, op)?;
        for (port, input) in inputs.iter().enumerate() {
            self.add_edge(*input, op, 0, port)
                .with_context(|| format!("Wiring input {port} of {name}"))?;
        }
        Ok(data)
    }

    fn connect(&mut self, src: &str, dst: &str) -> MoResult<()> {
        let (src, out) = parse_port(src, false)?;
        let (dst, inp) = parse_port(dst, true)?;
        let src_id = self.node_id(src)?;
        let dst_id = self.node_id(dst)?;
        if self.node(dst_id)?.is_data() {
            self.add_edge(src_id, dst_id, out, 0)?;
            return Ok(());
        }
        let data = if self.node(src_id)?.is_data() {
            src_id
        } else if let Some(data) = self.output_data(src_id, out)? {
            data
        } else {
            let name = if out == 0 { format!("{src}_d") } else { format!("{src}_{out}_d") };
            let data = self.add_data(name, DataNode::new())?;
            self.add_edge(src_id, data, out, 0)?;
            data
        };
        self.add_edge(data, dst_id, 0, inp)?;
        Ok(())
    }
}

fn parse_port(spec: &str, port_first: bool) -> MoResult<(&str, usize)> {
    let parts: Vec<&str> = spec.split(':').collect();
    match parts.as_slice() {
        [name] => Ok((*name, 0)),
        [port, name] if port_first => Ok((*name, port.parse()?)),
        [name, port] => Ok((*name, port.parse()?)),
        _ => Err(GraphError::Lookup(format!("port spec {spec:?}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_creates_data() {
        let mut g = Graph::default();
        g.add_op("p", OpNode::new("Parameter")).unwrap();
        g.add_op("q", OpNode::new("QueueDequeueUpToV2")).unwrap();
        g.add_op("r", OpNode::new("Result")).unwrap();
        g.connect("p", "q").unwrap();
        g.connect("q:1", "r").unwrap();
        assert!(g.contains("p_d"));
        let q_1 = g.get_node("q_1_d").unwrap().id;
        assert_eq!(g.output_data(g.node_id("q").unwrap(), 1).unwrap(), Some(q_1));
        assert_eq!(g.input_data(g.node_id("r").unwrap(), 0).unwrap(), Some(q_1));
    }

    #[test]
    fn connect_ports() {
        let mut g = Graph::default();
        let a = g.add_parameter("a", &[1]).unwrap();
        g.add_op("add", OpNode::new("Add")).unwrap();
        g.connect("a_d", "1:add").unwrap();
        assert_eq!(g.input_data(g.node_id("add").unwrap(), 1).unwrap(), Some(a));
    }

    #[test]
    fn const_holds_value() {
        let mut g = Graph::default();
        let c = g.add_const("c", tensor1(&[3i64, 4])).unwrap();
        let data = g.data(c).unwrap();
        assert_eq!(data.shape.as_deref(), Some(&[2i64][..]));
        assert_eq!(**data.value.as_ref().unwrap(), tensor1(&[3i64, 4]));
    }
}
