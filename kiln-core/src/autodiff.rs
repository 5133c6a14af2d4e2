//! Reverse mode automatic differentiation.
//!
//! Gradients are ordinary graph nodes appended to the same graph,
//! built from the same op vocabulary as the forward graph.

use crate::axes::AxisSet;
use crate::constant::Constant;
use crate::error::KilnError;
use crate::graph::Graph;
use crate::node::{NodeId, Output};
use crate::op::{AutoBroadcast, BinaryOp, Op, ReduceOp, UnaryOp};
use crate::shape::Shape;
use std::collections::BTreeMap;

/// Accumulated gradients, keyed by the output they are the gradient of
#[derive(Debug, Default)]
pub struct Adjoints {
    deltas: BTreeMap<Output, Output>,
}

// Constant `value` with type of `like`, broadcast to `shape`
fn splat(graph: &mut Graph, like: Output, value: f64, shape: &Shape) -> Result<NodeId, KilnError> {
    let element_type = graph.descriptor(like)?.element_type()?;
    let scalar = graph.constant(Constant::scalar(element_type, value)?)?;
    if shape.rank() == 0 {
        return Ok(scalar);
    }
    let axes: AxisSet = (0..shape.rank()).collect();
    graph.broadcast(scalar, shape.clone(), axes)
}

fn static_shape(graph: &Graph, output: Output) -> Result<Shape, KilnError> {
    Ok(graph.descriptor(output)?.shape()?.clone())
}

impl Adjoints {
    /// Backpropagate `root_deltas` from `roots` through the graph.
    /// With no deltas, every root gets a unit delta of its own shape.
    pub fn new(graph: &mut Graph, roots: &[Output], root_deltas: &[Output]) -> Result<Self, KilnError> {
        let mut adjoints = Self::default();
        if root_deltas.is_empty() {
            for root in roots {
                let shape = static_shape(graph, *root)?;
                let one = splat(graph, *root, 1., &shape)?;
                adjoints.add_delta(graph, *root, one.into())?;
            }
        } else {
            if root_deltas.len() != roots.len() {
                return Err(KilnError::node_validation(
                    "autodiff",
                    format!("{} roots, but {} deltas", roots.len(), root_deltas.len()),
                ));
            }
            for (root, delta) in roots.iter().zip(root_deltas) {
                adjoints.add_delta(graph, *root, *delta)?;
            }
        }
        let root_nodes: Vec<NodeId> = roots.iter().map(|r| r.node).collect();
        // Reversed execution order, every consumer is visited before its inputs,
        // so the deltas are complete when a node is visited.
        for id in graph.subgraph_order(&root_nodes).into_iter().rev() {
            let outputs = graph.node(id)?.outputs().len();
            let deltas: Vec<Option<Output>> = (0..outputs)
                .map(|i| adjoints.deltas.get(&Output::new(id, i)).copied())
                .collect();
            if deltas.iter().all(Option::is_none) {
                continue;
            }
            let mut full = Vec::with_capacity(outputs);
            for (i, delta) in deltas.into_iter().enumerate() {
                full.push(match delta {
                    Some(delta) => delta,
                    None => adjoints.delta(graph, Output::new(id, i))?,
                });
            }
            adjoints.generate_adjoints(graph, id, &full)?;
        }
        Ok(adjoints)
    }

    /// Add contribution to gradient of output. A second contribution is summed with an Add node.
    pub fn add_delta(&mut self, graph: &mut Graph, output: Output, delta: Output) -> Result<(), KilnError> {
        let expected = graph.descriptor(output)?.partial_shape()?;
        let found = graph.descriptor(delta)?.partial_shape()?;
        if !expected.compatible(found) {
            return Err(KilnError::IncompatibleShapes {
                context: format!("delta of {}", graph.node(output.node)?.name()),
                lhs: expected.to_string(),
                rhs: found.to_string(),
            });
        }
        let sum = match self.deltas.get(&output) {
            Some(prev) => graph.binary(BinaryOp::Add, *prev, delta)?.into(),
            None => delta,
        };
        if graph.config().debug_types() {
            log::trace!("delta of {output} is {sum}");
        }
        self.deltas.insert(output, sum);
        Ok(())
    }

    /// Gradient of output, zeros of its shape if it received no contribution
    pub fn delta(&mut self, graph: &mut Graph, output: Output) -> Result<Output, KilnError> {
        if let Some(delta) = self.deltas.get(&output) {
            return Ok(*delta);
        }
        let shape = static_shape(graph, output)?;
        let zero: Output = splat(graph, output, 0., &shape)?.into();
        self.deltas.insert(output, zero);
        Ok(zero)
    }

    /// Contribute deltas of the inputs of node, given deltas of its outputs
    fn generate_adjoints(&mut self, graph: &mut Graph, id: NodeId, deltas: &[Output]) -> Result<(), KilnError> {
        let node = graph.node(id)?;
        let op = node.op().clone();
        let inputs = node.inputs().to_vec();
        let name = node.name().to_string();
        let d = deltas[0];
        let y = Output::new(id, 0);
        match op {
            Op::Parameter { .. } | Op::Constant(..) | Op::Compare(..) => {}
            Op::Reduce {
                op: ReduceOp::All | ReduceOp::Any,
                ..
            }
            | Op::ReduceV1 {
                op: ReduceOp::All | ReduceOp::Any,
                ..
            } => {}
            Op::Result => self.add_delta(graph, inputs[0], d)?,
            Op::Unary(uop) => {
                let x = inputs[0];
                let dx: Output = match uop {
                    UnaryOp::Negative => graph.unary(UnaryOp::Negative, d)?.into(),
                    UnaryOp::Acos => {
                        // -d / sqrt(1 - x*x)
                        let shape = static_shape(graph, x)?;
                        let one = splat(graph, x, 1., &shape)?;
                        let xx = graph.binary(BinaryOp::Multiply, x, x)?;
                        let t = graph.binary(BinaryOp::Subtract, one, xx)?;
                        let s = graph.unary(UnaryOp::Sqrt, t)?;
                        let q = graph.binary(BinaryOp::Divide, d, s)?;
                        graph.unary(UnaryOp::Negative, q)?.into()
                    }
                    UnaryOp::Sqrt => {
                        // d / (2 * y)
                        let shape = static_shape(graph, y)?;
                        let two = splat(graph, y, 2., &shape)?;
                        let t = graph.binary(BinaryOp::Multiply, two, y)?;
                        graph.binary(BinaryOp::Divide, d, t)?.into()
                    }
                    UnaryOp::Exp => graph.binary(BinaryOp::Multiply, d, y)?.into(),
                    UnaryOp::Log => graph.binary(BinaryOp::Divide, d, x)?.into(),
                    UnaryOp::Round => return Err(KilnError::NotDifferentiable { node: name }),
                };
                self.add_delta(graph, x, dx)?;
            }
            Op::Binary(bop) => {
                let (x, y) = (inputs[0], inputs[1]);
                match bop {
                    BinaryOp::Add => {
                        self.add_delta(graph, x, d)?;
                        self.add_delta(graph, y, d)?;
                    }
                    BinaryOp::Subtract => {
                        self.add_delta(graph, x, d)?;
                        let dy = graph.unary(UnaryOp::Negative, d)?;
                        self.add_delta(graph, y, dy.into())?;
                    }
                    BinaryOp::Multiply => {
                        let dx = graph.binary(BinaryOp::Multiply, d, y)?;
                        self.add_delta(graph, x, dx.into())?;
                        let dy = graph.binary(BinaryOp::Multiply, d, x)?;
                        self.add_delta(graph, y, dy.into())?;
                    }
                    BinaryOp::Divide => {
                        let dx = graph.binary(BinaryOp::Divide, d, y)?;
                        self.add_delta(graph, x, dx.into())?;
                        // -d * (x / y) / y
                        let q = graph.binary(BinaryOp::Divide, x, y)?;
                        let t = graph.binary(BinaryOp::Multiply, d, q)?;
                        let t = graph.binary(BinaryOp::Divide, t, y)?;
                        let dy = graph.unary(UnaryOp::Negative, t)?;
                        self.add_delta(graph, y, dy.into())?;
                    }
                }
            }
            Op::Reduce {
                op: ReduceOp::Sum,
                axes,
            } => {
                let x = inputs[0];
                let shape = static_shape(graph, x)?;
                let dx = graph.broadcast(d, shape, axes)?;
                self.add_delta(graph, x, dx.into())?;
            }
            Op::ReduceV1 {
                op: ReduceOp::Sum,
                keep_dims,
            } => {
                let x = inputs[0];
                let Some(axes) = graph.constant_value(inputs[1]) else {
                    return Err(KilnError::node_validation(
                        &name,
                        "reduction axes must be constant to generate adjoints",
                    ));
                };
                let axes = axes.axis_set_value()?;
                let shape = static_shape(graph, x)?;
                let d = if keep_dims {
                    graph.reshape(d, shape.remove_axes(&axes))?.into()
                } else {
                    d
                };
                let dx = graph.broadcast(d, shape, axes)?;
                self.add_delta(graph, x, dx.into())?;
            }
            Op::Broadcast { .. } | Op::BroadcastV1 { .. } => {
                let x = inputs[0];
                let Some(axes) = graph.broadcast_axes(id)? else {
                    return Err(KilnError::node_validation(
                        &name,
                        "broadcast axes must be known to generate adjoints",
                    ));
                };
                let shape = static_shape(graph, x)?;
                let mut dx: Output = graph.reduce(ReduceOp::Sum, d, axes)?.into();
                if matches!(op, Op::BroadcastV1 { spec: AutoBroadcast::Numpy }) && *graph.shape(dx)? != shape {
                    dx = graph.reshape(dx, shape)?.into();
                }
                self.add_delta(graph, x, dx)?;
            }
            Op::Reshape { .. } | Op::ReshapeV1 => {
                let x = inputs[0];
                let shape = static_shape(graph, x)?;
                let dx = graph.reshape(d, shape)?;
                self.add_delta(graph, x, dx.into())?;
            }
        }
        Ok(())
    }
}

/// Gradients of `root` with respect to each of `wrt`
pub fn backprop(graph: &mut Graph, root: impl Into<Output>, wrt: &[Output]) -> Result<Vec<Output>, KilnError> {
    let mut adjoints = Adjoints::new(graph, &[root.into()], &[])?;
    wrt.iter().map(|x| adjoints.delta(graph, *x)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dtype::ElementType;

    #[test]
    fn round_is_not_differentiable() {
        let mut g = Graph::with_config(Config::default());
        let x = g.parameter(ElementType::F32, [3]).unwrap();
        let r = g.unary(UnaryOp::Round, x).unwrap();
        assert!(matches!(
            backprop(&mut g, r, &[x.into()]),
            Err(KilnError::NotDifferentiable { .. })
        ));
    }

    #[test]
    fn unused_input_gets_zeros() {
        let mut g = Graph::with_config(Config::default());
        let x = g.parameter(ElementType::F32, [2, 2]).unwrap();
        let z = g.parameter(ElementType::F32, [3]).unwrap();
        let e = g.unary(UnaryOp::Exp, x).unwrap();
        let grads = backprop(&mut g, e, &[x.into(), z.into()]).unwrap();
        assert_eq!(g.shape(grads[0]).unwrap(), &Shape::from([2, 2]));
        assert_eq!(g.shape(grads[1]).unwrap(), &Shape::from([3]));
        assert_eq!(g.node(grads[0].node).unwrap().op(), &Op::Binary(BinaryOp::Multiply));
    }

    #[test]
    fn comparisons_contribute_nothing() {
        let mut g = Graph::with_config(Config::default());
        let x = g.parameter(ElementType::F32, [3]).unwrap();
        let y = g.parameter(ElementType::F32, [3]).unwrap();
        let c = g.compare(crate::op::CompareOp::LessEq, x, y).unwrap();
        let mut adjoints = Adjoints::new(&mut g, &[c.into()], &[]).unwrap();
        let dx = adjoints.delta(&mut g, x.into()).unwrap();
        // zero constant broadcast to the shape of x
        assert!(matches!(g.node(dx.node).unwrap().op(), Op::Broadcast { .. }));
    }
}
