//! Translation of version 1 nodes back to version 0.
//!
//! Version 0 carries shapes and axes as attributes, so the inputs holding
//! them must be constants and the translated outputs must have static shapes.

use crate::pass::{rewrite_nodes, Pass, PassResult};
use kiln_core::{infer, AutoBroadcast, AxisSet, Graph, KilnError, Node, NodeId, Op, Output, Shape};

/// Rewrites Broadcast, ReduceSum, ReduceLogicalAnd, ReduceLogicalOr and Reshape
/// of version 1 to version 0
#[derive(Debug, Default, Clone, Copy)]
pub struct OpsetDowngrade;

impl Pass for OpsetDowngrade {
    fn name(&self) -> &'static str {
        "OpsetDowngrade"
    }

    fn run_on_graph(&mut self, graph: &mut Graph) -> Result<PassResult, KilnError> {
        rewrite_nodes(graph, downgrade_node).map(PassResult::rewrote)
    }
}

fn constant_input(graph: &Graph, node: &Node, slot: usize, what: &str) -> Result<Vec<i64>, KilnError> {
    graph
        .constant_value(node.inputs()[slot])
        .map(kiln_core::Constant::to_i64_vec)
        .ok_or_else(|| KilnError::migration(node.name(), format!("{what} is not a constant")))
}

fn static_output(node: &Node) -> Result<Shape, KilnError> {
    node.outputs()[0]
        .shape()
        .cloned()
        .map_err(|e| KilnError::migration(node.name(), format!("output shape is not static, {e}")))
}

fn static_arg(graph: &Graph, node: &Node) -> Result<Shape, KilnError> {
    graph
        .shape(node.inputs()[0])
        .cloned()
        .map_err(|e| KilnError::migration(node.name(), format!("argument shape is not static, {e}")))
}

fn downgrade_node(graph: &mut Graph, id: NodeId) -> Result<Option<NodeId>, KilnError> {
    let node = graph.node(id)?;
    if node.op().version() != 1 {
        return Ok(None);
    }
    let arg = node.inputs()[0];
    let new = match node.op().clone() {
        Op::BroadcastV1 {
            spec: AutoBroadcast::Explicit,
        } => {
            let shape = static_output(node)?;
            let mapping = constant_input(graph, node, 2, "axes mapping")?;
            let axes = infer::broadcast_axes_from_mapping(node.name(), &mapping, shape.rank())?;
            graph.broadcast(arg, shape, axes)?
        }
        Op::BroadcastV1 {
            spec: AutoBroadcast::Numpy,
        } => {
            let shape = static_output(node)?;
            let arg_shape = static_arg(graph, node)?;
            let leading = infer::numpy_leading_axes(&arg_shape, &shape);
            let stretched = infer::numpy_stretched_axes(&arg_shape, &shape);
            let offset = leading.len();
            let squeezed: Output = if stretched.is_empty() {
                arg
            } else {
                // Unit dimensions that stretch must not be present in the version 0 argument
                let arg_axes: AxisSet = stretched.iter().map(|a| a - offset).collect();
                graph.reshape(arg, arg_shape.remove_axes(&arg_axes))?.into()
            };
            let axes: AxisSet = leading.iter().chain(stretched.iter()).collect();
            graph.broadcast(squeezed, shape, axes)?
        }
        Op::ReduceV1 { op, keep_dims } => {
            let axes = constant_input(graph, node, 1, "reduction axes")?;
            let axes: AxisSet = axes
                .into_iter()
                .map(|a| {
                    usize::try_from(a)
                        .map_err(|_| KilnError::migration(node.name(), format!("negative axis {a}")))
                })
                .collect::<Result<_, _>>()?;
            if keep_dims {
                let shape = static_output(node)?;
                let reduced = graph.reduce(op, arg, axes)?;
                graph.reshape(reduced, shape)?
            } else {
                graph.reduce(op, arg, axes)?
            }
        }
        Op::ReshapeV1 => {
            // Pattern may contain -1, the inferred output shape is the attribute
            constant_input(graph, node, 1, "reshape pattern")?;
            let shape = static_output(node)?;
            graph.reshape(arg, shape)?
        }
        _ => return Ok(None),
    };
    Ok(Some(new))
}
