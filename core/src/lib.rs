//! # moir core
//!
//! Graph intermediate representation and transformation pipeline of the
//! moir model optimizer.
//!
//! A model, once extracted by a framework front-end into `(op, attributes)`
//! nodes, lives in a [`model::Graph`] made of alternating operation and data
//! nodes. Data nodes carry the propagated shape and, when foldable, the
//! constant value of the tensor they stand for.
//!
//! ## Example
//!
//! ```
//! use moir_core::prelude::*;
//!
//! let mut graph = Graph::default();
//! let input = graph.add_parameter("input", &[1, 20, 30]).unwrap();
//! let pattern = graph.add_const("pattern", tensor1(&[20i64, -1])).unwrap();
//! let reshaped = graph.wire("reshape", OpNode::new("Reshape"), &[input, pattern]).unwrap();
//! graph.add_result("output", reshaped).unwrap();
//!
//! Pipeline::standard().optimize(&mut graph).unwrap();
//! assert_eq!(graph.data(reshaped).unwrap().shape.as_deref(), Some(&[20i64, 30][..]));
//! ```

#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate log;

#[macro_use]
pub mod macros;
pub mod broadcast;
pub mod compare;
pub mod errors;
pub mod infer;
pub mod model;
pub mod ops;
pub mod optim;
pub mod transform;

pub use moir_data;

pub mod prelude {
    pub use crate::attrs;
    pub use crate::compare::compare_graphs;
    pub use crate::errors::{GraphError, MoResult, error_kind};
    pub use crate::infer::ShapeInference;
    pub use crate::model::{
        AttrValue, Attrs, DataNode, Graph, GraphDsl, Node, NodeId, NodeKind, OpNode, Shape, Stage,
    };
    pub use crate::ops::OpRegistry;
    pub use crate::optim::{Pipeline, PipelineOptions};
    pub use moir_data::prelude::*;
}

pub mod internal {
    pub use crate::infer::{InferFn, InferenceContext};
    pub use crate::model::cleanup::clean_up;
    pub use crate::model::{Edge, EdgeId, eval_order};
    pub use crate::ops::{OpEntry, normalize_axis};
    pub use crate::prelude::*;
    pub use crate::transform::*;
    pub use anyhow::{Context, bail, ensure, format_err};
    pub use moir_data::internal::*;
    pub use std::borrow::Cow;
    pub use std::collections::{HashMap, HashSet};
    pub use std::sync::Arc;
}

#[cfg(test)]
#[allow(dead_code)]
fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("MOIR_LOG").try_init();
}
