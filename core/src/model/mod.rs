//! The two-tier graph IR: operation nodes and data nodes.
use std::fmt;

mod attr;
pub mod cleanup;
pub mod dsl;
mod graph;
mod node;
mod order;

pub use self::attr::{AttrValue, Attrs};
pub use self::dsl::GraphDsl;
pub use self::graph::Graph;
pub use self::node::*;
pub use self::order::{eval_order, eval_order_for_nodes};

/// Optimization stage a graph is currently going through.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    #[default]
    Front,
    Middle,
    Back,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Front, Stage::Middle, Stage::Back];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Stage::Front => "front",
            Stage::Middle => "middle",
            Stage::Back => "back",
        };
        write!(f, "{s}")
    }
}
