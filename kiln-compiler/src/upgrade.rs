//! Translation of version 0 nodes to version 1.
//!
//! Attributes of version 0 ops become i64 constant inputs of version 1 ops,
//! appended after the data input.

use crate::pass::{rewrite_nodes, Pass, PassResult};
use kiln_core::{Constant, Graph, KilnError, NodeId, Op};

/// Rewrites Broadcast, Sum, All, Any and Reshape of version 0 to version 1
#[derive(Debug, Default, Clone, Copy)]
pub struct OpsetUpgrade;

impl Pass for OpsetUpgrade {
    fn name(&self) -> &'static str {
        "OpsetUpgrade"
    }

    fn run_on_graph(&mut self, graph: &mut Graph) -> Result<PassResult, KilnError> {
        rewrite_nodes(graph, upgrade_node).map(PassResult::rewrote)
    }
}

fn upgrade_node(graph: &mut Graph, id: NodeId) -> Result<Option<NodeId>, KilnError> {
    let node = graph.node(id)?;
    let op = node.op().clone();
    let Some(&arg) = node.inputs().first() else {
        return Ok(None);
    };
    let new = match op {
        Op::Broadcast { shape, axes } => {
            let mapping = axes.complement(shape.rank());
            let target = graph.constant(Constant::i64_vector(&shape.to_i64_vec()))?;
            let mapping = graph.constant(Constant::i64_vector(&mapping.to_i64_vec()))?;
            graph.broadcast_v1(arg, target, Some(mapping.into()))?
        }
        Op::Reduce { op, axes } => {
            let axes = graph.constant(Constant::i64_vector(&axes.to_i64_vec()))?;
            graph.reduce_v1(op, arg, axes, false)?
        }
        Op::Reshape { shape } => {
            let pattern = graph.constant(Constant::i64_vector(&shape.to_i64_vec()))?;
            graph.reshape_v1(arg, pattern)?
        }
        _ => return Ok(None),
    };
    Ok(Some(new))
}
