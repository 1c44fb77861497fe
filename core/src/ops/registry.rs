use crate::errors::{GraphError, MoResult};
use crate::infer::InferFn;
use crate::model::{AttrValue, Attrs};
use std::collections::BTreeMap;

/// Everything the optimizer knows about an op-kind.
#[derive(Clone, Debug)]
pub struct OpEntry {
    pub op: String,
    pub infer: InferFn,
    pub required_attrs: Vec<String>,
    /// Merged under the node attributes before inference.
    pub defaults: Attrs,
    /// Outputs are positional: the normalizer must not renumber them.
    pub fixed_output_ports: bool,
}

impl OpEntry {
    pub fn new(op: impl Into<String>, infer: InferFn) -> OpEntry {
        OpEntry {
            op: op.into(),
            infer,
            required_attrs: vec![],
            defaults: Attrs::new(),
            fixed_output_ports: false,
        }
    }

    pub fn with_required(mut self, attrs: &[&str]) -> OpEntry {
        self.required_attrs.extend(attrs.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_default(mut self, name: &str, value: impl Into<AttrValue>) -> OpEntry {
        self.defaults.insert(name.to_string(), value.into());
        self
    }

    pub fn with_fixed_output_ports(mut self) -> OpEntry {
        self.fixed_output_ports = true;
        self
    }
}

/// Op-kind to entry mapping. Dispatch of inference goes through here, and
/// nowhere else.
#[derive(Clone, Debug, Default)]
pub struct OpRegistry {
    entries: BTreeMap<String, OpEntry>,
}

impl OpRegistry {
    /// A registry holding every built-in op.
    pub fn standard() -> OpRegistry {
        let mut reg = OpRegistry::default();
        super::register_all_ops(&mut reg);
        reg
    }

    pub fn register(
        &mut self,
        op: &str,
        infer: InferFn,
        required: &[&str],
        defaults: Attrs,
    ) -> MoResult<()> {
        let mut entry = OpEntry::new(op, infer).with_required(required);
        entry.defaults = defaults;
        self.register_entry(entry)
    }

    pub fn register_entry(&mut self, entry: OpEntry) -> MoResult<()> {
        if self.entries.contains_key(&entry.op) {
            return Err(GraphError::DuplicateOp(entry.op).into());
        }
        self.insert(entry);
        Ok(())
    }

    /// Registers an entry, replacing the previous one for the same op-kind.
    pub fn register_with_override(&mut self, entry: OpEntry) {
        if self.entries.contains_key(&entry.op) {
            debug!("Overriding inference rule of {}", entry.op);
        }
        self.insert(entry);
    }

    pub(crate) fn insert(&mut self, entry: OpEntry) {
        self.entries.insert(entry.op.clone(), entry);
    }

    pub fn get(&self, op: &str) -> Option<&OpEntry> {
        self.entries.get(op)
    }

    pub fn lookup(&self, op: &str) -> MoResult<&OpEntry> {
        self.get(op)
            .ok_or_else(|| GraphError::UnknownOp { op: op.to_string(), node: None }.into())
    }

    pub fn contains(&self, op: &str) -> bool {
        self.entries.contains_key(op)
    }

    /// Registered op-kinds, sorted.
    pub fn ops(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::error_kind;
    use crate::infer::InferenceContext;

    fn noop(_: &mut InferenceContext) -> MoResult<()> {
        Ok(())
    }

    #[test]
    fn duplicate() {
        let mut reg = OpRegistry::standard();
        let e = reg.register("Relu", noop, &[], Attrs::new()).unwrap_err();
        assert_eq!(error_kind(&e), Some(&GraphError::DuplicateOp("Relu".into())));
        reg.register_with_override(OpEntry::new("Relu", noop));
        assert!(std::ptr::fn_addr_eq(reg.lookup("Relu").unwrap().infer, noop as InferFn));
    }

    #[test]
    fn extension() {
        let mut reg = OpRegistry::standard();
        assert!(matches!(
            error_kind(&reg.lookup("Frob").unwrap_err()),
            Some(GraphError::UnknownOp { node: None, .. })
        ));
        reg.register("Frob", noop, &["level"], crate::attrs!("mode" => "fast")).unwrap();
        let entry = reg.lookup("Frob").unwrap();
        assert_eq!(entry.required_attrs, vec!["level".to_string()]);
        assert_eq!(entry.defaults["mode"], AttrValue::from("fast"));
    }

    #[test]
    fn standard_ops() {
        let reg = OpRegistry::standard();
        for op in [
            "Parameter", "Const", "Result", "Identity", "Reshape", "Unsqueeze", "GatherElements",
            "SparseReshape", "MatMul", "Relu", "Tan", "Atanh", "Erf", "SoftPlus", "Cosh", "Acos",
            "Abs", "Exp", "Add", "Multiply", "Maximum", "SquaredDifference", "Convert",
            "SimplerNMS", "FIFOQueueV2", "QueueDequeueUpToV2",
        ] {
            assert!(reg.contains(op), "{op}");
        }
        assert!(reg.lookup("QueueDequeueUpToV2").unwrap().fixed_output_ports);
    }
}
