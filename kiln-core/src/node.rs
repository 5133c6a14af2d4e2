use crate::op::Op;
use crate::tensor::TensorDescriptor;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Stable id of a node in a [Graph](crate::Graph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Get id as usize
    #[must_use]
    pub const fn i(self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Reference to one output of a node, the edge of the graph as seen by its consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Output {
    /// Producing node
    pub node: NodeId,
    /// Index into producer's outputs
    pub index: usize,
}

impl Output {
    /// Output `index` of `node`
    #[must_use]
    pub const fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

impl From<NodeId> for Output {
    fn from(node: NodeId) -> Self {
        Self { node, index: 0 }
    }
}

impl Display for Output {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.node, self.index)
    }
}

/// Node of the graph. Owns its output descriptors.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    // Shared with output descriptors, which keep only a weak reference
    pub(crate) name: Arc<str>,
    pub(crate) op: Op,
    pub(crate) inputs: Vec<Output>,
    pub(crate) outputs: Vec<TensorDescriptor>,
}

impl Node {
    /// Id of this node
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Unique name, `<Kind>_<id>`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Op with attributes
    #[must_use]
    pub const fn op(&self) -> &Op {
        &self.op
    }

    /// Inputs
    #[must_use]
    pub fn inputs(&self) -> &[Output] {
        &self.inputs
    }

    /// Output descriptors
    #[must_use]
    pub fn outputs(&self) -> &[TensorDescriptor] {
        &self.outputs
    }

    /// Output descriptor at index
    #[must_use]
    pub fn output(&self, index: usize) -> Option<&TensorDescriptor> {
        self.outputs.get(index)
    }

    /// Nodes this node reads from, duplicates are kept
    pub fn parameters(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs.iter().map(|o| o.node)
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}(", self.name, self.op)?;
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{input}")?;
        }
        f.write_str(")")
    }
}
