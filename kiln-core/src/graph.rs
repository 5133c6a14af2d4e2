use crate::axes::AxisSet;
use crate::config::Config;
use crate::constant::Constant;
use crate::dtype::ElementType;
use crate::error::KilnError;
use crate::infer::{self, Inferred, InputView};
use crate::layout::TensorLayout;
use crate::node::{Node, NodeId, Output};
use crate::op::{AutoBroadcast, BinaryOp, CompareOp, Op, ReduceOp, UnaryOp};
use crate::shape::{PartialShape, Shape};
use crate::tensor::TensorDescriptor;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use std::sync::Arc;

/// Graph of nodes.
///
/// Nodes are stored in an arena keyed by [NodeId] together with a reference
/// count. The count is the number of input slots that read the node plus
/// holds, parameters and results are held by the graph itself. A node whose
/// count drops to zero while it is being released is removed, releasing its
/// inputs in turn. Nodes that nobody reads or holds yet stay in the arena
/// until [`collect_garbage`](Graph::collect_garbage).
#[derive(Debug, Clone)]
pub struct Graph {
    // First value is reference count, second is node
    nodes: BTreeMap<NodeId, (u32, Node)>,
    holds: BTreeMap<NodeId, u32>,
    parameters: Vec<NodeId>,
    results: Vec<NodeId>,
    // Owner of layouts that descriptors reference weakly
    layouts: Vec<Arc<dyn TensorLayout>>,
    next_id: usize,
    config: Config,
}

impl Default for Graph {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl Graph {
    /// Empty graph with configuration loaded from environment
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::load())
    }

    /// Empty graph with given configuration
    #[must_use]
    pub const fn with_config(config: Config) -> Self {
        Self {
            nodes: BTreeMap::new(),
            holds: BTreeMap::new(),
            parameters: Vec::new(),
            results: Vec::new(),
            layouts: Vec::new(),
            next_id: 0,
            config,
        }
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Are there no nodes?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parameters in order of creation
    #[must_use]
    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    /// Results in order of creation
    #[must_use]
    pub fn results(&self) -> &[NodeId] {
        &self.results
    }

    /// Iterate over live nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values().map(|(_, node)| node)
    }

    /// Ids of live nodes in id order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Does the graph contain node?
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get node
    pub fn node(&self, id: NodeId) -> Result<&Node, KilnError> {
        self.nodes
            .get(&id)
            .map(|(_, node)| node)
            .ok_or(KilnError::NodeNotFound { id })
    }

    /// Reference count of node
    pub fn rc(&self, id: NodeId) -> Result<u32, KilnError> {
        self.nodes
            .get(&id)
            .map(|(rc, _)| *rc)
            .ok_or(KilnError::NodeNotFound { id })
    }

    /// Number of holds of node, parameters and results hold themselves
    #[must_use]
    pub fn holds(&self, id: NodeId) -> u32 {
        self.holds.get(&id).copied().unwrap_or(0)
    }

    /// Descriptor of output
    pub fn descriptor(&self, output: Output) -> Result<&TensorDescriptor, KilnError> {
        let node = self.node(output.node)?;
        node.output(output.index).ok_or_else(|| {
            KilnError::node_validation(
                node.name(),
                format!("has no output {}", output.index),
            )
        })
    }

    fn descriptor_mut(&mut self, output: Output) -> Result<&mut TensorDescriptor, KilnError> {
        let (_, node) = self
            .nodes
            .get_mut(&output.node)
            .ok_or(KilnError::NodeNotFound { id: output.node })?;
        let name = node.name.clone();
        node.outputs.get_mut(output.index).ok_or_else(|| {
            KilnError::node_validation(&name, format!("has no output {}", output.index))
        })
    }

    /// Value of output, if it is produced by a constant
    #[must_use]
    pub fn constant_value(&self, output: Output) -> Option<&Constant> {
        match self.node(output.node).map(Node::op) {
            Ok(Op::Constant(c)) => Some(c),
            _ => None,
        }
    }

    /// Static shape of output
    pub fn shape(&self, output: impl Into<Output>) -> Result<&Shape, KilnError> {
        self.descriptor(output.into())?.shape()
    }

    /// Element type of output
    pub fn element_type(&self, output: impl Into<Output>) -> Result<ElementType, KilnError> {
        self.descriptor(output.into())?.element_type()
    }

    /// Increase hold count of node x
    pub fn retain(&mut self, x: NodeId) -> Result<(), KilnError> {
        let (rc, _) = self
            .nodes
            .get_mut(&x)
            .ok_or(KilnError::NodeNotFound { id: x })?;
        *rc += 1;
        *self.holds.entry(x).or_insert(0) += 1;
        Ok(())
    }

    /// Decrease hold count of x. If x's reference count reaches zero, x is
    /// removed and all of it's inputs are released.
    pub fn release(&mut self, x: NodeId) -> Result<(), KilnError> {
        let Some(holds) = self.holds.get_mut(&x).filter(|h| **h > 0) else {
            return Err(KilnError::GraphValidation {
                message: format!("release of {x}, which is not held"),
            });
        };
        *holds -= 1;
        if *holds == 0 {
            self.holds.remove(&x);
        }
        if let Some((rc, _)) = self.nodes.get_mut(&x) {
            *rc -= 1;
        }
        self.remove_dead(x);
        Ok(())
    }

    // Remove x if nothing references it, then cascade through its inputs
    fn remove_dead(&mut self, x: NodeId) {
        let mut params = vec![x];
        while let Some(p) = params.pop() {
            if !self.nodes.get(&p).is_some_and(|(rc, _)| *rc == 0) {
                continue;
            }
            let Some((_, node)) = self.nodes.remove(&p) else {
                continue;
            };
            if self.config.debug_types() {
                log::debug!("Removing {node}");
            }
            self.parameters.retain(|id| *id != p);
            self.results.retain(|id| *id != p);
            for param in node.parameters() {
                if let Some((rc, _)) = self.nodes.get_mut(&param) {
                    *rc -= 1;
                    if *rc == 0 {
                        params.push(param);
                    }
                }
            }
        }
    }

    /// Remove all nodes that are neither read nor held, returns number of removed nodes
    pub fn collect_garbage(&mut self) -> usize {
        let before = self.nodes.len();
        let dead: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, (rc, _))| *rc == 0)
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            self.remove_dead(id);
        }
        before - self.nodes.len()
    }

    fn input_views(&self, inputs: &[Output]) -> Result<Vec<InputView<'_>>, KilnError> {
        inputs
            .iter()
            .map(|output| {
                Ok(InputView {
                    output: *output,
                    desc: self.descriptor(*output)?,
                    constant: self.constant_value(*output),
                })
            })
            .collect()
    }

    // Byte size of static outputs must fit in usize
    fn commit(name: &str, desc: &mut TensorDescriptor, inferred: Inferred) -> Result<(), KilnError> {
        match inferred {
            Inferred::Valid(element_type, shape) => {
                if let Ok(dims) = shape.to_shape() {
                    if dims
                        .checked_numel()
                        .and_then(|n| n.checked_mul(element_type.byte_size()))
                        .is_none()
                    {
                        return Err(KilnError::node_validation(
                            name,
                            format!("{dims} of {element_type} does not fit in memory"),
                        ));
                    }
                }
                desc.set_tensor_type(element_type, shape, true, "")
            }
            Inferred::Invalid(explanation) => desc.set_tensor_type(
                ElementType::Dynamic,
                PartialShape::dynamic(),
                false,
                &explanation,
            ),
        }
    }

    /// Add node with op and inputs to the graph, running type inference.
    /// Nothing is added if inference fails.
    pub fn push(&mut self, op: Op, inputs: &[Output]) -> Result<NodeId, KilnError> {
        let id = NodeId(self.next_id);
        let name: Arc<str> = format!("{}_{}", op.kind(), id.0).into();
        let inferred = infer::infer(&name, &op, &self.input_views(inputs)?)?;
        let mut outputs = Vec::with_capacity(inferred.len());
        for (index, inferred) in inferred.into_iter().enumerate() {
            let mut desc = TensorDescriptor::uninferred(&name, index);
            Self::commit(&name, &mut desc, inferred).map_err(|e| e.in_context(&name))?;
            outputs.push(desc);
        }
        for input in inputs {
            if let Some((rc, _)) = self.nodes.get_mut(&input.node) {
                *rc += 1;
            }
        }
        let node = Node {
            id,
            name,
            op,
            inputs: inputs.into(),
            outputs,
        };
        if self.config.debug_types() {
            log::debug!("{node} -> {}", describe_outputs(&node));
        }
        let held = matches!(node.op, Op::Parameter { .. } | Op::Result);
        match node.op {
            Op::Parameter { .. } => self.parameters.push(id),
            Op::Result => self.results.push(id),
            _ => {}
        }
        self.nodes.insert(id, (0, node));
        self.next_id += 1;
        if held {
            self.retain(id)?;
        }
        Ok(id)
    }

    /// Graph input
    pub fn parameter(
        &mut self,
        element_type: ElementType,
        shape: impl Into<PartialShape>,
    ) -> Result<NodeId, KilnError> {
        self.push_parameter(element_type, shape.into(), false)
    }

    /// Graph input whose value does not change between executions,
    /// so backends may cache anything derived from it
    pub fn cacheable_parameter(
        &mut self,
        element_type: ElementType,
        shape: impl Into<PartialShape>,
    ) -> Result<NodeId, KilnError> {
        self.push_parameter(element_type, shape.into(), true)
    }

    fn push_parameter(
        &mut self,
        element_type: ElementType,
        shape: PartialShape,
        cacheable: bool,
    ) -> Result<NodeId, KilnError> {
        self.push(
            Op::Parameter {
                element_type,
                shape,
                cacheable,
            },
            &[],
        )
    }

    /// Constant
    pub fn constant(&mut self, value: Constant) -> Result<NodeId, KilnError> {
        self.push(Op::Constant(value), &[])
    }

    /// Graph output reading x
    pub fn result(&mut self, x: impl Into<Output>) -> Result<NodeId, KilnError> {
        self.push(Op::Result, &[x.into()])
    }

    /// Unary elementwise arithmetic
    pub fn unary(&mut self, op: UnaryOp, x: impl Into<Output>) -> Result<NodeId, KilnError> {
        self.push(Op::Unary(op), &[x.into()])
    }

    /// Binary elementwise arithmetic
    pub fn binary(
        &mut self,
        op: BinaryOp,
        x: impl Into<Output>,
        y: impl Into<Output>,
    ) -> Result<NodeId, KilnError> {
        self.push(Op::Binary(op), &[x.into(), y.into()])
    }

    /// Binary elementwise comparison
    pub fn compare(
        &mut self,
        op: CompareOp,
        x: impl Into<Output>,
        y: impl Into<Output>,
    ) -> Result<NodeId, KilnError> {
        self.push(Op::Compare(op), &[x.into(), y.into()])
    }

    /// Version 0 reduction with axes attribute
    pub fn reduce(
        &mut self,
        op: ReduceOp,
        x: impl Into<Output>,
        axes: impl Into<AxisSet>,
    ) -> Result<NodeId, KilnError> {
        self.push(Op::Reduce { op, axes: axes.into() }, &[x.into()])
    }

    /// Version 1 reduction with axes input
    pub fn reduce_v1(
        &mut self,
        op: ReduceOp,
        x: impl Into<Output>,
        axes: impl Into<Output>,
        keep_dims: bool,
    ) -> Result<NodeId, KilnError> {
        self.push(Op::ReduceV1 { op, keep_dims }, &[x.into(), axes.into()])
    }

    /// Version 0 broadcast of x to shape, adding broadcast axes
    pub fn broadcast(
        &mut self,
        x: impl Into<Output>,
        shape: impl Into<Shape>,
        axes: impl Into<AxisSet>,
    ) -> Result<NodeId, KilnError> {
        self.push(
            Op::Broadcast {
                shape: shape.into(),
                axes: axes.into(),
            },
            &[x.into()],
        )
    }

    /// Version 1 broadcast of x to target shape.
    /// With axes mapping the broadcast is explicit, otherwise numpy style.
    pub fn broadcast_v1(
        &mut self,
        x: impl Into<Output>,
        target_shape: impl Into<Output>,
        axes_mapping: Option<Output>,
    ) -> Result<NodeId, KilnError> {
        match axes_mapping {
            Some(mapping) => self.push(
                Op::BroadcastV1 {
                    spec: AutoBroadcast::Explicit,
                },
                &[x.into(), target_shape.into(), mapping],
            ),
            None => self.push(
                Op::BroadcastV1 {
                    spec: AutoBroadcast::Numpy,
                },
                &[x.into(), target_shape.into()],
            ),
        }
    }

    /// Version 0 reshape
    pub fn reshape(&mut self, x: impl Into<Output>, shape: impl Into<Shape>) -> Result<NodeId, KilnError> {
        self.push(Op::Reshape { shape: shape.into() }, &[x.into()])
    }

    /// Version 1 reshape with pattern input
    pub fn reshape_v1(
        &mut self,
        x: impl Into<Output>,
        pattern: impl Into<Output>,
    ) -> Result<NodeId, KilnError> {
        self.push(Op::ReshapeV1, &[x.into(), pattern.into()])
    }

    /// Rerun type inference of node and commit the result to its outputs.
    /// Returns true if any output changed.
    pub fn revalidate(&mut self, id: NodeId) -> Result<bool, KilnError> {
        let node = self.node(id)?;
        let name = node.name.clone();
        let inferred = infer::infer(&name, &node.op, &self.input_views(&node.inputs)?)?;
        let (_, node) = self
            .nodes
            .get_mut(&id)
            .ok_or(KilnError::NodeNotFound { id })?;
        let mut changed = false;
        for (desc, inferred) in node.outputs.iter_mut().zip(inferred) {
            let before = (desc.state(), desc.element_type().ok(), desc.partial_shape().ok().cloned());
            Self::commit(&name, desc, inferred).map_err(|e| e.in_context(&name))?;
            changed |= before != (desc.state(), desc.element_type().ok(), desc.partial_shape().ok().cloned());
        }
        if changed && self.config.debug_types() {
            log::debug!("Revalidated {node} -> {}", describe_outputs(node));
        }
        Ok(changed)
    }

    /// Mark output as invalid and propagate the invalidity to everything downstream.
    /// The next revalidation of the producer itself makes the output valid again.
    pub fn invalidate(&mut self, output: Output, explanation: &str) -> Result<(), KilnError> {
        self.descriptor_mut(output)?.set_tensor_type(
            ElementType::Dynamic,
            PartialShape::dynamic(),
            false,
            explanation,
        )?;
        let consumers = self.consumers(output.node).into_iter().map(|(c, _)| c).collect();
        self.revalidate_downstream(&consumers)
    }

    /// Create node with the same op as `id`, reading `new_inputs`
    pub fn copy_with_new_inputs(&mut self, id: NodeId, new_inputs: &[Output]) -> Result<NodeId, KilnError> {
        let node = self.node(id)?;
        if new_inputs.len() != node.op.input_arity() {
            return Err(KilnError::ArityMismatch {
                node: node.name().into(),
                expected: node.op.input_arity(),
                found: new_inputs.len(),
            });
        }
        let op = node.op.clone();
        self.push(op, new_inputs)
    }

    /// All (consumer, input slot) pairs reading any output of node
    #[must_use]
    pub fn consumers(&self, id: NodeId) -> Vec<(NodeId, usize)> {
        self.nodes
            .iter()
            .flat_map(|(cid, (_, node))| {
                node.inputs
                    .iter()
                    .enumerate()
                    .filter(move |(_, input)| input.node == id)
                    .map(move |(slot, _)| (*cid, slot))
            })
            .collect()
    }

    /// Is `ancestor` reachable from `x` through inputs?
    #[must_use]
    pub fn depends_on(&self, x: NodeId, ancestor: NodeId) -> bool {
        let mut params = vec![x];
        let mut visited = BTreeSet::new();
        while let Some(p) = params.pop() {
            if p == ancestor {
                return true;
            }
            if visited.insert(p) {
                if let Some((_, node)) = self.nodes.get(&p) {
                    params.extend(node.parameters());
                }
            }
        }
        false
    }

    /// Rewire every consumer of `old` to read the same output index of `new`,
    /// then remove `old` if nothing references it anymore and rerun type
    /// inference downstream. Consumers that are inputs of `new` are not rewired.
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<(), KilnError> {
        if old == new {
            return Ok(());
        }
        let old_outputs = self.node(old)?.outputs.len();
        let new_node = self.node(new)?;
        if new_node.outputs.len() < old_outputs {
            return Err(KilnError::node_validation(
                new_node.name(),
                format!("can not replace node with {old_outputs} outputs"),
            ));
        }
        let consumers: Vec<(NodeId, usize)> = self
            .consumers(old)
            .into_iter()
            .filter(|(c, _)| !self.depends_on(new, *c))
            .collect();
        let mut rewired = BTreeSet::new();
        for (consumer, slot) in &consumers {
            if let Some((_, node)) = self.nodes.get_mut(consumer) {
                node.inputs[*slot].node = new;
                rewired.insert(*consumer);
            }
        }
        let n = consumers.len() as u32;
        if let Some((rc, _)) = self.nodes.get_mut(&new) {
            *rc += n;
        }
        if let Some((rc, _)) = self.nodes.get_mut(&old) {
            *rc -= n;
        }
        if self.config.debug_types() {
            log::debug!("Replaced {old} with {new} in {} consumers", consumers.len());
        }
        self.remove_dead(old);
        self.revalidate_downstream(&rewired)
    }

    /// Rerun inference of nodes and everything that reads them
    pub fn revalidate_downstream(&mut self, ids: &BTreeSet<NodeId>) -> Result<(), KilnError> {
        let mut dirty = ids.clone();
        for id in self.topological_order()? {
            if dirty.contains(&id) && self.revalidate(id)? {
                dirty.extend(self.consumers(id).into_iter().map(|(c, _)| c));
            }
        }
        Ok(())
    }

    /// Order of all live nodes such that every node comes after its inputs.
    /// Fails if the graph contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, KilnError> {
        let mut in_degree: BTreeMap<NodeId, usize> = BTreeMap::new();
        let mut consumers: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (id, (_, node)) in &self.nodes {
            in_degree.entry(*id).or_insert(0);
            for p in node.parameters() {
                if self.nodes.contains_key(&p) {
                    *in_degree.entry(*id).or_insert(0) += 1;
                    consumers.entry(p).or_default().push(*id);
                }
            }
        }
        let mut ready: Vec<NodeId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .rev()
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop() {
            order.push(id);
            for c in consumers.get(&id).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(c) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(*c);
                    }
                }
            }
        }
        if order.len() != self.nodes.len() {
            return Err(KilnError::GraphValidation {
                message: format!(
                    "graph contains a cycle, {} of {} nodes could be ordered",
                    order.len(),
                    self.nodes.len()
                ),
            });
        }
        Ok(order)
    }

    /// Execution order of the subgraph that `roots` depend on, inputs first
    #[must_use]
    pub fn subgraph_order(&self, roots: &[NodeId]) -> Vec<NodeId> {
        // Make a list of visited nodes and their reference counts.
        let mut params: Vec<NodeId> = roots.into();
        let mut rcs: BTreeMap<NodeId, u32> = BTreeMap::new();
        while let Some(nid) = params.pop() {
            rcs.entry(nid).and_modify(|rc| *rc += 1).or_insert_with(|| {
                if let Some((_, node)) = self.nodes.get(&nid) {
                    params.extend(node.parameters());
                }
                1
            });
        }
        // Order them using rcs reference counts
        let mut order = Vec::new();
        let mut internal_rcs: BTreeMap<NodeId, u32> = BTreeMap::new();
        let mut params: Vec<NodeId> = roots.into();
        while let Some(nid) = params.pop() {
            if let Some(rc) = rcs.get(&nid) {
                if *rc == *internal_rcs.entry(nid).and_modify(|rc| *rc += 1).or_insert(1) {
                    if let Some((_, node)) = self.nodes.get(&nid) {
                        order.push(nid);
                        params.extend(node.parameters());
                    }
                }
            }
        }
        order.reverse();
        order
    }

    /// Broadcast axes of a broadcast node: the output axes that the argument
    /// does not have or that are stretched from unit dimensions.
    /// None if they can not be determined before execution.
    pub fn broadcast_axes(&self, id: NodeId) -> Result<Option<AxisSet>, KilnError> {
        let node = self.node(id)?;
        match &node.op {
            Op::Broadcast { axes, .. } => Ok(Some(axes.clone())),
            Op::BroadcastV1 { spec } => {
                let Ok(out) = node.outputs[0].shape() else {
                    return Ok(None);
                };
                match spec {
                    AutoBroadcast::Explicit => match self.constant_value(node.inputs[2]) {
                        Some(mapping) => infer::broadcast_axes_from_mapping(
                            node.name(),
                            &mapping.to_i64_vec(),
                            out.rank(),
                        )
                        .map(Some),
                        None => Ok(None),
                    },
                    AutoBroadcast::Numpy => {
                        let Ok(arg) = self.descriptor(node.inputs[0])?.shape() else {
                            return Ok(None);
                        };
                        let mut axes = infer::numpy_leading_axes(arg, out);
                        for a in &infer::numpy_stretched_axes(arg, out) {
                            axes.insert(a);
                        }
                        Ok(Some(axes))
                    }
                }
            }
            _ => Err(KilnError::node_validation(node.name(), "is not a broadcast")),
        }
    }

    /// Attach layout to output. The graph owns the layout.
    pub fn attach_layout(&mut self, output: Output, layout: Arc<dyn TensorLayout>) -> Result<(), KilnError> {
        self.descriptor_mut(output)?.set_tensor_layout(&layout)?;
        self.layouts.push(layout);
        Ok(())
    }

    /// Set pool offset of output
    pub fn set_pool_offset(&mut self, output: Output, offset: usize) -> Result<(), KilnError> {
        self.descriptor_mut(output)?.set_pool_offset(offset);
        Ok(())
    }

    /// Drop layouts that are no longer referenced by any live descriptor
    pub fn prune_layouts(&mut self) {
        let live: Vec<Arc<dyn TensorLayout>> = self
            .nodes
            .values()
            .flat_map(|(_, node)| node.outputs.iter().filter_map(TensorDescriptor::tensor_layout))
            .collect();
        self.layouts
            .retain(|l| live.iter().any(|x| Arc::ptr_eq(x, l)));
    }

    /// Graph in dot format for visualization
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut res = String::from("strict digraph {\n  ordering=in\n  rank=source\n");
        let mut edges = String::new();
        for (id, (rc, node)) in &self.nodes {
            let fillcolor = if self.holds(*id) > 0 { "lightblue" } else { "grey" };
            let shape = if node.op.is_source() { "box" } else { "oval" };
            let _ = writeln!(
                res,
                "  {}[label=\"{} x {rc}\\n{}\\n{}\", shape={shape}, fillcolor=\"{fillcolor}\", style=filled]",
                id.i(),
                node.name(),
                node.op,
                describe_outputs(node),
            );
            for input in &node.inputs {
                let _ = writeln!(edges, "  {} -> {}", input.node.i(), id.i());
            }
        }
        let _ = write!(res, "{edges}}}");
        res
    }
}

fn describe_outputs(node: &Node) -> String {
    let mut res = String::new();
    for (i, desc) in node.outputs.iter().enumerate() {
        if i > 0 {
            res.push_str(", ");
        }
        match (desc.element_type(), desc.partial_shape()) {
            (Ok(et), Ok(shape)) => {
                let _ = write!(res, "{shape} {et}");
            }
            _ => res.push_str("invalid"),
        }
    }
    res
}
