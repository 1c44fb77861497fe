//! Structural equivalence of two graphs, walking back from an output.
use crate::errors::MoResult;
use crate::model::{DataNode, Edge, Graph, NodeKind, OpNode};
use crate::ops::binary::COMMUTATIVE;
use moir_data::prelude::*;
use std::collections::{HashSet, VecDeque};

/// Compares `a` and `b` from the node called `last_node` backwards.
///
/// Returns whether they match, and a report of every difference found.
pub fn compare_graphs(
    a: &Graph,
    b: &Graph,
    last_node: &str,
    check_op_attrs: bool,
) -> MoResult<(bool, String)> {
    let mut queue = VecDeque::from([(a.node_id(last_node)?, b.node_id(last_node)?)]);
    let mut seen = HashSet::new();
    let mut errors = vec![];
    while let Some((na, nb)) = queue.pop_front() {
        if !seen.insert((na, nb)) {
            continue;
        }
        let (node_a, node_b) = (a.node(na)?, b.node(nb)?);
        let before = errors.len();
        match (&node_a.kind, &node_b.kind) {
            (NodeKind::Op(x), NodeKind::Op(y)) => compare_ops(x, y, check_op_attrs, &mut errors),
            (NodeKind::Data(x), NodeKind::Data(y)) => compare_data(x, y, &mut errors),
            _ => errors.push("node kinds differ".to_string()),
        }
        let (ins_a, ins_b) = (a.in_edges(na)?, b.in_edges(nb)?);
        if ins_a.len() != ins_b.len() {
            errors.push(format!("{} inputs against {}", ins_a.len(), ins_b.len()));
        } else {
            let commutative = COMMUTATIVE.iter().any(|op| node_a.op_is(op));
            let pairs = if commutative {
                match_unordered(a, &ins_a, b, &ins_b)?
            } else {
                ins_a.iter().copied().zip(ins_b.iter().copied()).collect()
            };
            for (ea, eb) in pairs {
                if ea.out != eb.out || (!commutative && ea.inp != eb.inp) {
                    errors.push(format!(
                        "edge ports differ: {}->{} against {}->{}",
                        ea.out, ea.inp, eb.out, eb.inp
                    ));
                }
                queue.push_back((ea.src, eb.src));
            }
        }
        for e in &mut errors[before..] {
            *e = format!("{} / {}: {e}", node_a.name, node_b.name);
        }
    }
    for e in &errors {
        debug!("{e}");
    }
    Ok((errors.is_empty(), errors.join("\n")))
}

fn compare_ops(a: &OpNode, b: &OpNode, check_attrs: bool, errors: &mut Vec<String>) {
    if a.op != b.op {
        errors.push(format!("op {} against {}", a.op, b.op));
    }
    if a.type_name != b.type_name {
        errors.push(format!("type {:?} against {:?}", a.type_name, b.type_name));
    }
    if check_attrs {
        for key in a.attrs.keys().chain(b.attrs.keys()).collect::<std::collections::BTreeSet<_>>() {
            match (a.attrs.get(key), b.attrs.get(key)) {
                (Some(x), Some(y)) if x == y => (),
                (x, y) => errors.push(format!("attribute {key}: {x:?} against {y:?}")),
            }
        }
    }
}

fn compare_data(a: &DataNode, b: &DataNode, errors: &mut Vec<String>) {
    if a.shape != b.shape {
        errors.push(format!("shape {:?} against {:?}", a.shape, b.shape));
    }
    match (&a.value, &b.value) {
        (None, None) => (),
        (Some(x), Some(y)) if values_match(x, y) => (),
        (x, y) => errors.push(format!("value {x:?} against {y:?}")),
    }
}

fn values_match(a: &Tensor, b: &Tensor) -> bool {
    if a.shape() != b.shape() {
        return false;
    }
    if a.datum_type().is_float() || b.datum_type().is_float() {
        let (Ok(a), Ok(b)) = (a.cast_to::<f32>(), b.cast_to::<f32>()) else { return false };
        let (Ok(a), Ok(b)) = (a.as_slice::<f32>(), b.as_slice::<f32>()) else { return false };
        a.iter().zip(b).all(|(x, y)| (x - y).abs() <= 1e-5 + 1e-5 * y.abs())
    } else {
        a == b
    }
}

/// Pairs the inputs of a commutative op by the kind of their producers,
/// falling back to positional order.
fn match_unordered(
    a: &Graph,
    ins_a: &[Edge],
    b: &Graph,
    ins_b: &[Edge],
) -> MoResult<Vec<(Edge, Edge)>> {
    let signature = |g: &Graph, e: &Edge| -> MoResult<Option<(String, Option<TVec<i64>>)>> {
        let shape = g.data(e.src)?.shape.clone();
        Ok(match g.producer(e.src)? {
            Some(p) => Some((g.op(p)?.op.clone(), shape)),
            None => None,
        })
    };
    let mut free: Vec<Option<Edge>> = ins_b.iter().copied().map(Some).collect();
    let mut pairs = vec![];
    let mut unmatched = vec![];
    for ea in ins_a {
        let sig = signature(a, ea)?;
        let mut found = None;
        for (ix, slot) in free.iter().enumerate() {
            if let Some(eb) = slot {
                if signature(b, eb)? == sig {
                    found = Some(ix);
                    break;
                }
            }
        }
        match found.and_then(|ix| free[ix].take()) {
            Some(eb) => pairs.push((*ea, eb)),
            None => unmatched.push(*ea),
        }
    }
    pairs.extend(unmatched.into_iter().zip(free.into_iter().flatten()));
    Ok(pairs)
}
